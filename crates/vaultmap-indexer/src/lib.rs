//! vaultmap indexer: markdown extraction, classification and graph building

pub mod builder;
pub mod centrality;
pub mod classifier;
pub mod coordinator;
pub mod extractor;
pub mod frontmatter;
pub mod hashtags;
pub mod links;
pub mod markdown;
pub mod resolve;


pub use builder::{ClassifiedDocument, GraphBuilder};
pub use centrality::weighted_pagerank;
pub use classifier::{Classifier, DocumentFacts};
pub use coordinator::{Coordinator, ParseOutput};
pub use extractor::{MarkdownExtractor, ParsedDocument};
pub use links::RawReference;
pub use resolve::Resolver;
