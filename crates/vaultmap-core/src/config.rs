//! Configuration: classification rules, layout, cache, parse and watcher settings
//!
//! Loaded from `vaultmap.toml` or `vaultmap.yaml` in the vault root (or an
//! explicit path). Every field has a default, so an absent file is valid.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::model::{ClassificationRule, MatcherKind, NodeType};

/// File names looked up in the vault root, in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["vaultmap.toml", "vaultmap.yaml", "vaultmap.yml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub vault: VaultSettings,
    pub classification: ClassificationConfig,
    pub layout: LayoutConfig,
    pub centrality: CentralityConfig,
    pub cache: CacheConfig,
    pub parse: ParseConfig,
    pub watcher: WatcherConfig,
}

/// Which files in the vault are documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the vault root.
    pub exclude: Vec<String>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        VaultSettings {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            exclude: vec!["templates/**".to_string()],
        }
    }
}

/// A rule as written in the config file; `node_type` is validated on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    pub matcher_kind: MatcherKind,
    pub pattern: String,
    pub node_type: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size_multiplier: Option<f32>,
}

impl RuleConfig {
    fn new(name: &str, priority: i32, matcher_kind: MatcherKind, pattern: &str, node_type: NodeType, color: &str) -> Self {
        RuleConfig {
            name: name.to_string(),
            priority,
            matcher_kind,
            pattern: pattern.to_string(),
            node_type: node_type.as_str().to_string(),
            color: Some(color.to_string()),
            size_multiplier: None,
        }
    }
}

impl TryFrom<&RuleConfig> for ClassificationRule {
    type Error = VaultError;

    fn try_from(raw: &RuleConfig) -> Result<Self> {
        Ok(ClassificationRule {
            name: raw.name.clone(),
            priority: raw.priority,
            matcher_kind: raw.matcher_kind,
            pattern: raw.pattern.clone(),
            node_type: NodeType::from_str(&raw.node_type)?,
            color: raw.color.clone(),
            size_multiplier: raw.size_multiplier,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Type assigned when no rule matches.
    pub default_type: String,
    pub rules: Vec<RuleConfig>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        use MatcherKind::*;
        ClassificationConfig {
            default_type: NodeType::Note.as_str().to_string(),
            rules: vec![
                RuleConfig::new("index-tag", 0, Tag, "index", NodeType::Index, "#f5a623"),
                RuleConfig::new("moc-tag", 0, Tag, "moc", NodeType::Index, "#f5a623"),
                RuleConfig::new("hub-tag", 10, Tag, "hub", NodeType::Hub, "#bd10e0"),
                RuleConfig::new("hub-prefix", 10, FilenamePrefix, "~", NodeType::Hub, "#bd10e0"),
                RuleConfig::new("journal-dir", 20, PathContains, "journal/", NodeType::Journal, "#7ed321"),
                RuleConfig::new("daily-dir", 20, PathContains, "daily/", NodeType::Journal, "#7ed321"),
                RuleConfig::new("source-tag", 30, Tag, "source", NodeType::Source, "#4a90e2"),
                RuleConfig::new("project-dir", 30, PathContains, "projects/", NodeType::Project, "#d0021b"),
                RuleConfig::new("person-tag", 40, Tag, "person", NodeType::Person, "#50e3c2"),
                RuleConfig::new("concept-tag", 50, Tag, "concept", NodeType::Concept, "#9b9b9b"),
            ],
        }
    }
}

impl ClassificationConfig {
    pub fn default_node_type(&self) -> Result<NodeType> {
        NodeType::from_str(&self.default_type)
    }

    /// Validated rules in declaration order.
    pub fn rules(&self) -> Result<Vec<ClassificationRule>> {
        self.rules.iter().map(ClassificationRule::try_from).collect()
    }
}

/// Force-directed layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub iterations: usize,
    pub initial_temperature: f64,
    /// Geometric decay applied after every pass.
    pub cooling_rate: f64,
    pub optimal_distance: f64,
    pub seed: u64,
    /// Distances are clamped to this before computing forces.
    pub min_distance: f64,
    /// Ignore repulsion beyond this distance. `None` means all pairs.
    ///
    /// Setting a cutoff changes the force model: distant pairs stop pushing
    /// each other apart, so positions differ from an all-pairs run.
    pub repulsion_cutoff: Option<f64>,
    /// Use grid binning to find repulsion candidates.
    ///
    /// Only valid together with `repulsion_cutoff`. Binning visits exactly
    /// the pairs within the cutoff, so for a given cutoff it produces the
    /// same positions as the brute-force scan and only changes speed.
    pub grid_binning: bool,
    /// Node count at which force computation is spread over threads.
    pub parallel_threshold: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            iterations: 300,
            initial_temperature: 100.0,
            cooling_rate: 0.95,
            optimal_distance: 80.0,
            seed: 42,
            min_distance: 0.01,
            repulsion_cutoff: None,
            grid_binning: false,
            parallel_threshold: 512,
        }
    }
}

/// Weighted PageRank parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// Stop when the L1 delta between iterations drops below this.
    pub tolerance: f64,
    /// Lower bound applied after normalization.
    pub floor: f64,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        CentralityConfig {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
            floor: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Approximate byte budget across current snapshot and history.
    pub max_bytes: u64,
    pub history_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 3600,
            max_bytes: 256 * 1024 * 1024,
            history_limit: 4,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Maximum documents parsed concurrently.
    pub concurrency: usize,
    /// Documents handed to the worker pool per batch.
    pub batch_size: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            concurrency: 4,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig { debounce_ms: 500 }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl VaultConfig {
    /// Parse a config file; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| VaultError::io(path, e))?;
        let config: VaultConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&text).map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?
            }
            _ => toml::from_str(&text).map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?,
        };
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// First config file found in the vault root, if any.
    pub fn find(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Load the vault's config file, or defaults when there is none.
    pub fn discover(root: &Path) -> Result<Self> {
        match Self::find(root) {
            Some(path) => Self::load(&path),
            None => {
                tracing::debug!("No config file in {}, using defaults", root.display());
                Ok(Self::default())
            }
        }
    }

    /// Apply `VAULTMAP_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parsed<T: FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| VaultError::Config(format!("{key}: cannot parse '{value}'")))
        }

        if let Some(v) = lookup("VAULTMAP_PARSE_CONCURRENCY") {
            self.parse.concurrency = parsed("VAULTMAP_PARSE_CONCURRENCY", v)?;
        }
        if let Some(v) = lookup("VAULTMAP_LAYOUT_ITERATIONS") {
            self.layout.iterations = parsed("VAULTMAP_LAYOUT_ITERATIONS", v)?;
        }
        if let Some(v) = lookup("VAULTMAP_LAYOUT_SEED") {
            self.layout.seed = parsed("VAULTMAP_LAYOUT_SEED", v)?;
        }
        if let Some(v) = lookup("VAULTMAP_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parsed("VAULTMAP_CACHE_TTL_SECS", v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(VaultError::Config(msg.to_string()));

        if self.parse.concurrency == 0 {
            return invalid("parse.concurrency must be at least 1");
        }
        if self.parse.batch_size == 0 {
            return invalid("parse.batch_size must be at least 1");
        }
        let layout = &self.layout;
        if !(layout.cooling_rate > 0.0 && layout.cooling_rate <= 1.0) {
            return invalid("layout.cooling_rate must be in (0, 1]");
        }
        if !(layout.optimal_distance > 0.0) {
            return invalid("layout.optimal_distance must be positive");
        }
        if !(layout.initial_temperature > 0.0) {
            return invalid("layout.initial_temperature must be positive");
        }
        if !(layout.min_distance > 0.0) {
            return invalid("layout.min_distance must be positive");
        }
        match layout.repulsion_cutoff {
            Some(cutoff) if !(cutoff > 0.0) => return invalid("layout.repulsion_cutoff must be positive"),
            None if layout.grid_binning => return invalid("layout.grid_binning requires layout.repulsion_cutoff"),
            _ => {}
        }
        let centrality = &self.centrality;
        if !(0.0..1.0).contains(&centrality.damping) {
            return invalid("centrality.damping must be in [0, 1)");
        }
        if !(0.0..=1.0).contains(&centrality.floor) {
            return invalid("centrality.floor must be in [0, 1]");
        }

        self.classification.default_node_type()?;
        self.classification.rules()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = VaultConfig::default();
        config.validate().unwrap();
        assert_eq!(config.classification.default_node_type().unwrap(), NodeType::Note);
        assert_eq!(config.classification.rules().unwrap().len(), 10);
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vaultmap.toml");
        std::fs::write(
            &path,
            r#"
[layout]
iterations = 50
seed = 7

[classification]
default_type = "concept"

[[classification.rules]]
name = "people"
priority = 1
matcher_kind = "path_contains"
pattern = "people/"
node_type = "person"
size_multiplier = 1.5
"#,
        )
        .unwrap();

        let config = VaultConfig::discover(dir.path()).unwrap();
        assert_eq!(config.layout.iterations, 50);
        assert_eq!(config.layout.seed, 7);
        assert_eq!(config.layout.cooling_rate, 0.95);
        assert_eq!(config.cache, CacheConfig::default());

        let rules = config.classification.rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].node_type, NodeType::Person);
        assert_eq!(rules[0].matcher_kind, MatcherKind::PathContains);
        assert_eq!(rules[0].size_multiplier, Some(1.5));
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("vaultmap.yaml"),
            "parse:\n  concurrency: 2\n  batch_size: 8\ncache:\n  ttl_secs: 10\n",
        )
        .unwrap();

        let config = VaultConfig::discover(dir.path()).unwrap();
        assert_eq!(config.parse.concurrency, 2);
        assert_eq!(config.parse.batch_size, 8);
        assert_eq!(config.cache.ttl(), Duration::from_secs(10));
    }

    #[test]
    fn unknown_node_type_fails_validation() {
        let mut config = VaultConfig::default();
        config.classification.rules[0].node_type = "galaxy".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, VaultError::InvalidNodeType(t) if t == "galaxy"));
    }

    #[test]
    fn grid_binning_needs_cutoff() {
        let mut config = VaultConfig::default();
        config.layout.grid_binning = true;
        assert!(config.validate().is_err());
        config.layout.repulsion_cutoff = Some(200.0);
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VAULTMAP_PARSE_CONCURRENCY", "8"),
            ("VAULTMAP_LAYOUT_SEED", "99"),
        ]);
        let config = VaultConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.parse.concurrency, 8);
        assert_eq!(config.layout.seed, 99);

        let bad = VaultConfig::default().with_overrides(|k| {
            (k == "VAULTMAP_LAYOUT_ITERATIONS").then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }
}
