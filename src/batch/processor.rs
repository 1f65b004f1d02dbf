//! Batch Processor
//!
//! Runs one job end to end:
//! 1. Screen upload names against the allowed extensions
//! 2. Acquire inputs (copy single files, extract archives) into the workspace
//! 3. Normalize every source into the output format
//! 4. Render `variants_per_file` randomized variants per source
//! 5. Remove the workspace, whatever happened in steps 1-4
//!
//! Rejected uploads and undecodable files are reported and skipped. A DSP or
//! encoding failure skips only that variant. Archive errors, any I/O error
//! (staging, converting or writing a variant) and cancellation abort the job.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::archive::{extract_archive, is_archive};
use super::job::{BatchJob, CancelToken};
use super::outputs::{screen_upload, RejectedUpload};
use crate::config::ProcessorConfig;
use crate::dsp::{
    apply_chain, compose_random_chain, Catalog, Compressor, CompressorParams, Effect, EffectChain,
};
use crate::engine::{decode_file_limited, encode, transcode_in_place, AudioBuffer, AudioFormat};
use crate::error::{FxError, Result};

/// Spreads per-variant seeds apart (golden-ratio increment)
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Output file name for one variant: `{stem}_variant{index}.{ext}`
pub fn variant_file_name(stem: &str, index: usize, format: AudioFormat) -> String {
    format!("{}_variant{}.{}", stem, index, format.extension())
}

// ============================================================================
// Report types
// ============================================================================

/// One variant written to the output directory
#[derive(Debug, Clone, Serialize)]
pub struct VariantRecord {
    pub file: String,
    pub source: String,
    pub variant: usize,
    pub chain: EffectChain,
}

/// A file or variant that was skipped, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub source: String,
    /// `None` when the whole source was skipped
    pub variant: Option<usize>,
    pub error_code: String,
    pub reason: String,
}

impl SkippedItem {
    fn from_error(source: &str, variant: Option<usize>, err: &FxError) -> Self {
        Self {
            source: source.to_string(),
            variant,
            error_code: err.error_code().to_string(),
            reason: err.to_string(),
        }
    }

    /// `path` lost to another source already claiming the name of `taken`
    fn duplicate(path: &Path, taken: &Path) -> Self {
        let stem = taken
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: display_name(path),
            variant: None,
            error_code: "DUPLICATE_SOURCE".to_string(),
            reason: format!("duplicate source name '{}'", stem),
        }
    }
}

/// Summary of a finished job
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Written variants, sorted by file name
    pub variants: Vec<VariantRecord>,
    /// Uploads refused before staging
    pub rejected: Vec<RejectedUpload>,
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    /// Names of the files actually written, sorted
    pub fn outputs(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.file.as_str()).collect()
    }
}

/// A decoded source ready for rendering
struct Source {
    name: String,
    buffer: AudioBuffer,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// BatchProcessor
// ============================================================================

/// Renders randomized effect variants for batches of audio files
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: ProcessorConfig,
    catalog: Catalog,
    temp_root: Option<PathBuf>,
}

impl BatchProcessor {
    /// Create a processor; the configuration is validated up front
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            catalog: Catalog::standard(),
            temp_root: None,
        })
    }

    /// Draw chains from a restricted catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Place job workspaces under `root` instead of the system temp directory
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process a single audio file or archive into `output_dir`
    pub fn process(&self, input: &Path, output_dir: &Path) -> Result<BatchReport> {
        self.process_inputs(&[input.to_path_buf()], output_dir, &CancelToken::new())
    }

    /// Process several uploads as one job
    ///
    /// The job workspace is removed before this returns, on success and on
    /// every error path.
    pub fn process_inputs(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let job = BatchJob::create(output_dir, self.temp_root.as_deref())?;
        let outcome = self.run(&job, inputs, cancel);
        let cleanup = job.close();

        match (outcome, cleanup) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Workspace cleanup failed after job error: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    fn run(&self, job: &BatchJob, inputs: &[PathBuf], cancel: &CancelToken) -> Result<BatchReport> {
        let pool = self.build_pool()?;
        let mut skipped = Vec::new();

        let (accepted, rejected) = self.screen_inputs(inputs);
        let staged = self.acquire_inputs(job, &accepted)?;
        job.check_cancelled(cancel)?;

        let normalized = self.normalize_formats(staged, &mut skipped)?;
        job.check_cancelled(cancel)?;

        let sources = self.load_sources(&pool, normalized, &mut skipped)?;
        let variants = self.generate_variants(&pool, job, &sources, cancel, &mut skipped)?;

        info!(
            "Job {} finished: {} variants written, {} uploads rejected, {} items skipped",
            job.id(),
            variants.len(),
            rejected.len(),
            skipped.len()
        );

        Ok(BatchReport {
            job_id: job.id().to_string(),
            started_at: job.created_at(),
            finished_at: Utc::now(),
            variants,
            rejected,
            skipped,
        })
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("fxvariants-worker-{}", i))
            .build()
            .map_err(|e| FxError::InvalidConfig {
                reason: format!("cannot start worker pool: {}", e),
            })
    }

    /// Step 1: drop uploads whose extension is not allowed
    fn screen_inputs(&self, inputs: &[PathBuf]) -> (Vec<PathBuf>, Vec<RejectedUpload>) {
        let mut accepted = Vec::with_capacity(inputs.len());
        let mut rejected = Vec::new();
        for input in inputs {
            match screen_upload(&display_name(input), &self.config) {
                Some(rejection) => rejected.push(rejection),
                None => accepted.push(input.clone()),
            }
        }
        (accepted, rejected)
    }

    /// Step 2: copy or extract every input into its own staging directory
    fn acquire_inputs(&self, job: &BatchJob, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            if !input.is_file() {
                return Err(FxError::FileNotFound {
                    path: input.clone(),
                });
            }
            let staging = job.staging_dir(index)?;

            if is_archive(input) {
                files.extend(extract_archive(input, &staging)?);
            } else {
                let target = staging.join(display_name(input));
                fs::copy(input, &target)?;
                files.push(target);
            }
        }
        info!("Job {} acquired {} source files", job.id(), files.len());
        Ok(files)
    }

    /// Step 3: re-encode sources that are not already in the output format
    ///
    /// A source whose converted name is already taken by another staged file
    /// is skipped as a duplicate; the existing file is never overwritten.
    fn normalize_formats(
        &self,
        files: Vec<PathBuf>,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<PathBuf>> {
        let format = self.config.output_format;
        let mut normalized = Vec::with_capacity(files.len());

        for path in files {
            let name = display_name(&path);
            let target = path.with_extension(format.extension());
            if AudioFormat::from_path(&path) != Some(format) && target.exists() {
                warn!("Skipping {}: {} already exists", name, display_name(&target));
                skipped.push(SkippedItem::duplicate(&path, &target));
                continue;
            }
            match transcode_in_place(&path, format, self.config.max_duration_secs) {
                Ok(converted) => {
                    if converted != path {
                        info!("Converted {} to {}", name, format);
                    }
                    normalized.push(converted);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Error converting {}: {}", name, e);
                    skipped.push(SkippedItem::from_error(&name, None, &e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(normalized)
    }

    /// Decode normalized sources, dropping duplicates and undecodable files
    fn load_sources(
        &self,
        pool: &rayon::ThreadPool,
        files: Vec<PathBuf>,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<Source>> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(files.len());
        for path in files {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if seen.insert(stem.clone()) {
                unique.push((stem, path));
            } else {
                warn!("Skipping {}: another source is already named '{}'", path.display(), stem);
                skipped.push(SkippedItem::duplicate(&path, &path));
            }
        }

        let max_duration = self.config.max_duration_secs;
        let decoded: Vec<(String, PathBuf, Result<AudioBuffer>)> = pool.install(|| {
            unique
                .into_par_iter()
                .map(|(stem, path)| {
                    let result = decode_file_limited(&path, max_duration);
                    (stem, path, result)
                })
                .collect()
        });

        let mut sources = Vec::with_capacity(decoded.len());
        for (stem, path, result) in decoded {
            match result {
                Ok(buffer) => {
                    debug!(
                        "Loaded {} ({} samples at {} Hz)",
                        stem,
                        buffer.len(),
                        buffer.sample_rate()
                    );
                    sources.push(Source { name: stem, buffer });
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Error processing {}: {}", path.display(), e);
                    skipped.push(SkippedItem::from_error(&display_name(&path), None, &e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sources)
    }

    /// Step 4: render every (source, variant) pair on the worker pool
    fn generate_variants(
        &self,
        pool: &rayon::ThreadPool,
        job: &BatchJob,
        sources: &[Source],
        cancel: &CancelToken,
        skipped: &mut Vec<SkippedItem>,
    ) -> Result<Vec<VariantRecord>> {
        let per_file = self.config.variants_per_file;
        let tasks: Vec<(usize, usize)> = (0..sources.len())
            .flat_map(|s| (0..per_file).map(move |v| (s, v)))
            .collect();

        // Every write has completed once install returns
        let results: Vec<(usize, usize, Result<VariantRecord>)> = pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(task_index, &(s, v))| {
                    let result = self.render_variant(job, &sources[s], v, task_index, cancel);
                    (s, v, result)
                })
                .collect()
        });

        let mut records = Vec::with_capacity(results.len());
        for (s, v, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e @ (FxError::Cancelled { .. } | FxError::Io(_))) => return Err(e),
                // DSP and encoding failures only cost this variant
                Err(e) => {
                    warn!("Error processing variant {} of {}: {}", v, sources[s].name, e);
                    skipped.push(SkippedItem::from_error(&sources[s].name, Some(v), &e));
                }
            }
        }
        records.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(records)
    }

    fn variant_rng(&self, task_index: usize) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(
                seed.wrapping_add((task_index as u64).wrapping_mul(SEED_STRIDE)),
            ),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn render_variant(
        &self,
        job: &BatchJob,
        source: &Source,
        variant: usize,
        task_index: usize,
        cancel: &CancelToken,
    ) -> Result<VariantRecord> {
        job.check_cancelled(cancel)?;

        let mut rng = self.variant_rng(task_index);
        let chain = compose_random_chain(&self.catalog, &mut rng);
        let mut rendered = apply_chain(&source.buffer, &chain)?;
        if self.config.master_compression {
            rendered = compress(&rendered)?;
        }

        let format = self.config.output_format;
        let file = variant_file_name(&source.name, variant, format);
        let bytes = encode(&rendered, format)?;
        fs::write(job.output_dir().join(&file), bytes)?;
        info!("Processed and saved {} [{}]", file, chain);

        Ok(VariantRecord {
            file,
            source: source.name.clone(),
            variant,
            chain,
        })
    }
}

/// Fixed master compression stage
fn compress(buffer: &AudioBuffer) -> Result<AudioBuffer> {
    let mut samples = buffer.samples().to_vec();
    Compressor::new(CompressorParams::default(), buffer.sample_rate()).process(&mut samples);
    buffer.with_samples(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::write_audio;
    use tempfile::tempdir;

    fn write_tone(path: &Path, seconds: f32) {
        let buffer = AudioBuffer::sine_wave(330.0, seconds, 8000).unwrap();
        write_audio(&buffer, path, AudioFormat::Wav).unwrap();
    }

    fn processor(root: &Path, variants: usize) -> BatchProcessor {
        let config = ProcessorConfig::default()
            .with_variants(variants)
            .with_seed(11)
            .with_workers(2);
        BatchProcessor::new(config)
            .unwrap()
            .with_temp_root(root.join("tmp"))
    }

    #[test]
    fn test_variant_file_name() {
        assert_eq!(variant_file_name("song", 3, AudioFormat::Wav), "song_variant3.wav");
    }

    #[test]
    fn test_single_file_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("voice.wav");
        write_tone(&input, 0.2);

        let out = dir.path().join("out");
        let report = processor(dir.path(), 3).process(&input, &out).unwrap();

        assert_eq!(
            report.outputs(),
            vec!["voice_variant0.wav", "voice_variant1.wav", "voice_variant2.wav"]
        );
        assert!(report.skipped.is_empty());
        for name in report.outputs() {
            assert!(out.join(name).is_file());
        }
        // Input untouched, workspace gone
        assert!(input.is_file());
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_input_is_fatal_and_cleans_up() {
        let dir = tempdir().unwrap();
        let err = processor(dir.path(), 1)
            .process(&dir.path().join("nope.wav"), &dir.path().join("out"))
            .unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_seeded_runs_choose_same_chains() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.wav");
        write_tone(&input, 0.1);

        let p = processor(dir.path(), 4);
        let first = p.process(&input, &dir.path().join("one")).unwrap();
        let second = p.process(&input, &dir.path().join("two")).unwrap();

        let chains = |r: &BatchReport| r.variants.iter().map(|v| v.chain.clone()).collect::<Vec<_>>();
        assert_eq!(chains(&first), chains(&second));
        assert_ne!(first.job_id, second.job_id);
    }

    #[test]
    fn test_cancelled_job_reports_cancelled() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.wav");
        write_tone(&input, 0.1);

        let token = CancelToken::new();
        token.cancel();
        let err = processor(dir.path(), 2)
            .process_inputs(&[input], &dir.path().join("out"), &token)
            .unwrap_err();

        assert_eq!(err.error_code(), "CANCELLED");
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
    }

    #[test]
    fn test_disallowed_extension_is_rejected_not_rendered() {
        let dir = tempdir().unwrap();
        let disguised = dir.path().join("clip.flac");
        let plain = dir.path().join("keep.wav");
        write_tone(&disguised, 0.1);
        write_tone(&plain, 0.1);

        let report = processor(dir.path(), 1)
            .process_inputs(&[disguised, plain], &dir.path().join("out"), &CancelToken::new())
            .unwrap();

        assert_eq!(report.outputs(), vec!["keep_variant0.wav"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "clip.flac");
        assert!(report.skipped.is_empty());
        assert!(report.started_at <= report.finished_at);
    }

    #[test]
    fn test_variant_write_failure_aborts_job() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.wav");
        write_tone(&input, 0.1);

        // A directory squatting on the variant name makes the write fail
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("a_variant0.wav")).unwrap();

        let err = processor(dir.path(), 1).process(&input, &out).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_master_compression_keeps_length() {
        let buffer = AudioBuffer::new(vec![0.9; 4000], 8000).unwrap();
        let out = compress(&buffer).unwrap();
        assert_eq!(out.len(), buffer.len());
        assert!(out.peak() < 0.9);
    }
}
