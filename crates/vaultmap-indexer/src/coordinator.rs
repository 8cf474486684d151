//! Bounded parallel parsing of a vault file set

use std::collections::HashSet;
use std::path::PathBuf;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use vaultmap_core::{Diagnostics, DocumentParseError, ParseConfig, Result, SourceFile, VaultError};

use crate::builder::ClassifiedDocument;
use crate::classifier::Classifier;
use crate::extractor::MarkdownExtractor;

/// Documents that parsed, plus the diagnostics gathered while parsing.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub documents: Vec<ClassifiedDocument>,
    pub diagnostics: Diagnostics,
}

/// Fans extraction and classification out over a fixed-size rayon pool, one
/// batch at a time. Results are merged back in input order by the caller's
/// thread only.
pub struct Coordinator {
    extractor: MarkdownExtractor,
    classifier: Classifier,
    batch_size: usize,
    pool: rayon::ThreadPool,
}

impl Coordinator {
    pub fn new(extractor: MarkdownExtractor, classifier: Classifier, config: &ParseConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency.max(1))
            .thread_name(|i| format!("vaultmap-parse-{i}"))
            .build()
            .map_err(|e| VaultError::Config(format!("failed to start parse pool: {e}")))?;
        Ok(Self {
            extractor,
            classifier,
            batch_size: config.batch_size.max(1),
            pool,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Parse and classify every file. `changed` limits which files count as
    /// changed in diagnostics; `None` counts all of them. Cancellation is
    /// checked between documents and between batches. `on_progress` receives
    /// the number of documents processed so far after each batch.
    pub fn parse_all(
        &self,
        files: &[SourceFile],
        changed: Option<&HashSet<PathBuf>>,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(usize),
    ) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();
        output.diagnostics.documents_total = files.len();
        let is_changed = |file: &SourceFile| changed.is_none_or(|set| set.contains(&file.path));

        let mut processed = 0;
        for batch in files.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(VaultError::Canceled);
            }

            let results: Vec<Option<std::result::Result<ClassifiedDocument, DocumentParseError>>> =
                self.pool.install(|| {
                    batch
                        .par_iter()
                        .map(|file| {
                            if cancel.is_cancelled() {
                                return None;
                            }
                            Some(self.parse_one(file))
                        })
                        .collect()
                });

            for (file, result) in batch.iter().zip(results) {
                match result {
                    None => return Err(VaultError::Canceled),
                    Some(Ok(doc)) => {
                        output.diagnostics.documents_parsed += 1;
                        if is_changed(file) {
                            output.diagnostics.changed_parsed += 1;
                        }
                        output.documents.push(doc);
                    }
                    Some(Err(err)) => {
                        tracing::debug!(path = %file.path.display(), error = %err, "document excluded");
                        output
                            .diagnostics
                            .record_excluded(file.path.clone(), &err, is_changed(file));
                    }
                }
            }

            processed += batch.len();
            on_progress(processed);
        }

        if !output.diagnostics.excluded.is_empty() {
            tracing::info!(
                excluded = output.diagnostics.excluded.len(),
                missing_id_with_frontmatter = output.diagnostics.missing_id_with_frontmatter,
                "documents excluded from the graph"
            );
        }
        Ok(output)
    }

    fn parse_one(&self, file: &SourceFile) -> std::result::Result<ClassifiedDocument, DocumentParseError> {
        let document = self.extractor.extract(&file.path, &file.content)?;
        let node_type = self.classifier.classify_document(&document);
        Ok(ClassifiedDocument { document, node_type })
    }
}
