use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which query sites get an annotation record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SiteSelection {
    /// Every site that maps to a genomic coordinate.
    #[default]
    All,
    /// Only sites flagged by contrast-FEL at the p-value threshold.
    Significant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_p_value")]
    pub p_value: f64,
    #[serde(default = "default_tag")]
    pub default_tag: String,
    /// Regex selecting the query record in each alignment file.
    #[serde(default = "default_reference_pattern")]
    pub reference_pattern: String,
    #[serde(default = "default_ebf_threshold")]
    pub ebf_threshold: f64,
    #[serde(default = "default_min_identity")]
    pub min_identity: f64,
    #[serde(default)]
    pub site_selection: SiteSelection,
    /// JSON gene table; the built-in H3N2 table when unset.
    #[serde(default)]
    pub gene_table: Option<PathBuf>,
    /// Resolve genes only on the segment the query aligned to.
    #[serde(default)]
    pub segment_genes: bool,
}

fn default_p_value() -> f64 {
    0.05
}

fn default_tag() -> String {
    "Reference".to_string()
}

fn default_reference_pattern() -> String {
    "MN908947".to_string()
}

fn default_ebf_threshold() -> f64 {
    100.0
}

fn default_min_identity() -> f64 {
    0.6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            p_value: default_p_value(),
            default_tag: default_tag(),
            reference_pattern: default_reference_pattern(),
            ebf_threshold: default_ebf_threshold(),
            min_identity: default_min_identity(),
            site_selection: SiteSelection::default(),
            gene_table: None,
            segment_genes: false,
        }
    }
}

impl Config {
    /// Load `config.toml` from the platform config directory, or defaults.
    pub fn load() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("org", "selection-report", "selection-report") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                return Self::from_path(&config_path);
            }
        }
        Config::default()
    }

    /// Load a specific config file; unreadable or invalid files yield defaults.
    pub fn from_path(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Cannot read config {}: {}; using defaults", path.display(), e);
                return Config::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid config {}: {}; using defaults", path.display(), e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "p_value = 0.1\nsite_selection = \"significant\"\n").unwrap();
        let config = Config::from_path(&path);
        assert_eq!(config.p_value, 0.1);
        assert_eq!(config.site_selection, SiteSelection::Significant);
        assert_eq!(config.default_tag, "Reference");
        assert_eq!(config.ebf_threshold, 100.0);
        assert!(!config.segment_genes);
    }

    #[test]
    fn test_invalid_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "p_value = \"high\"").unwrap();
        assert_eq!(Config::from_path(&path), Config::default());
        assert_eq!(Config::from_path(&dir.path().join("absent.toml")), Config::default());
    }
}
