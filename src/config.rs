//! Processor configuration
//!
//! Settings for a batch job. Loaded from a JSON file or built in code;
//! every field has a default so partial files are accepted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::AudioFormat;
use crate::error::{FxError, Result};

/// Default number of variants rendered per source file
pub const DEFAULT_VARIANTS_PER_FILE: usize = 5;

/// Longest source accepted, in seconds (2 hours)
pub const DEFAULT_MAX_DURATION_SECS: f64 = 2.0 * 60.0 * 60.0;

/// Upload extensions accepted by default
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "zip"];

/// Configuration for a [`BatchProcessor`](crate::batch::BatchProcessor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Randomized variants rendered per source file (at least 1)
    pub variants_per_file: usize,
    /// Container for normalized sources and rendered variants
    pub output_format: AudioFormat,
    /// Worker threads for variant rendering; 0 uses rayon's default
    pub workers: usize,
    /// Seed for reproducible runs; `None` draws from system entropy
    pub seed: Option<u64>,
    /// Sources longer than this are skipped; `None` disables the check
    pub max_duration_secs: Option<f64>,
    /// Run the fixed compressor after every random chain
    pub master_compression: bool,
    /// Upload extensions accepted by [`filter_uploads`](crate::batch::filter_uploads)
    pub allowed_extensions: Vec<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            variants_per_file: DEFAULT_VARIANTS_PER_FILE,
            output_format: AudioFormat::Wav,
            workers: 0,
            seed: None,
            max_duration_secs: Some(DEFAULT_MAX_DURATION_SECS),
            master_compression: false,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ProcessorConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path)?;
        let config: ProcessorConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_variants(mut self, variants_per_file: usize) -> Self {
        self.variants_per_file = variants_per_file;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Check the configuration for values a job cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.variants_per_file == 0 {
            return Err(FxError::InvalidConfig {
                reason: "variants_per_file must be at least 1".to_string(),
            });
        }
        if !self.output_format.can_encode() {
            return Err(FxError::InvalidConfig {
                reason: format!("cannot encode output format '{}'", self.output_format),
            });
        }
        if let Some(max) = self.max_duration_secs {
            if !(max > 0.0) {
                return Err(FxError::InvalidConfig {
                    reason: format!("max_duration_secs must be positive, got {}", max),
                });
            }
        }
        if self.allowed_extensions.is_empty() {
            return Err(FxError::InvalidConfig {
                reason: "allowed_extensions must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Whether an upload with this extension is accepted
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}
