//! CLI Command Implementations

use std::path::{Path, PathBuf};

use tracing::info;

use crate::batch::{finalize_outputs, package_outputs, BatchProcessor, CancelToken};
use crate::config::ProcessorConfig;
use crate::dsp::Catalog;
use crate::engine::AudioFormat;
use crate::error::Result;

/// Flag overrides for `process`
#[derive(Debug, Default, Clone)]
pub struct ProcessOverrides {
    pub variants: Option<usize>,
    pub format: Option<AudioFormat>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
}

/// Build the effective configuration: file (or defaults), then flags
pub fn resolve_config(
    config_path: Option<&Path>,
    overrides: &ProcessOverrides,
) -> Result<ProcessorConfig> {
    let mut config = match config_path {
        Some(path) => ProcessorConfig::load(path)?,
        None => ProcessorConfig::default(),
    };
    if let Some(variants) = overrides.variants {
        config.variants_per_file = variants;
    }
    if let Some(format) = overrides.format {
        config.output_format = format;
    }
    if let Some(seed) = overrides.seed {
        config.seed = Some(seed);
    }
    if let Some(workers) = overrides.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

/// Render variants for every input into `output`.
pub fn process(
    inputs: &[PathBuf],
    output: &Path,
    config: ProcessorConfig,
    package: bool,
    json: bool,
) -> Result<()> {
    info!("Processing {} inputs into {}", inputs.len(), output.display());

    let processor = BatchProcessor::new(config)?;
    let report = processor.process_inputs(inputs, output, &CancelToken::new())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Job {}", report.job_id);
        for variant in &report.variants {
            println!("  {}  {}", variant.file, variant.chain);
        }
        for upload in &report.rejected {
            println!("  rejected {}: {}", upload.name, upload.reason);
        }
        for item in &report.skipped {
            match item.variant {
                Some(v) => println!("  skipped {} variant {}: {}", item.source, v, item.reason),
                None => println!("  skipped {}: {}", item.source, item.reason),
            }
        }
        println!(
            "{} variants written, {} rejected, {} skipped",
            report.variants.len(),
            report.rejected.len(),
            report.skipped.len()
        );
    }

    if package {
        package_dir(output)?;
    }
    Ok(())
}

/// Package an output directory.
pub fn package_dir(dir: &Path) -> Result<()> {
    let summary = package_outputs(dir)?;
    for member in &summary.members {
        println!("  {}  {} bytes  {}", member.name, member.size_bytes, member.sha256);
    }
    println!(
        "Packaged {} files into {}",
        summary.members.len(),
        summary.archive_path.display()
    );
    Ok(())
}

/// Remove all outputs from a directory.
pub fn finalize(dir: &Path) -> Result<()> {
    let removed = finalize_outputs(dir)?;
    println!("Removed {} files from {}", removed.len(), dir.display());
    Ok(())
}

/// Print the effect catalog.
pub fn show_catalog() -> Result<()> {
    println!("Effect catalog:");
    println!("{:-<60}", "");
    for kind in Catalog::standard().kinds() {
        let ranges: Vec<String> = kind
            .param_ranges()
            .iter()
            .map(|r| format!("{} {:.2}..={:.2}", r.name, r.min, r.max))
            .collect();
        println!("  {:<12} {}", kind.name(), ranges.join(", "));
    }
    Ok(())
}
