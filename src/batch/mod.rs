//! Batch Module
//!
//! Job lifecycle, archive handling, variant rendering and output management.

mod archive;
mod job;
mod outputs;
mod processor;

pub use archive::{
    extract_archive, is_archive, list_output_files, package_outputs, PackageSummary,
    PackagedFile, ARCHIVE_NAME,
};
pub use job::{BatchJob, CancelToken};
pub use outputs::{
    filter_uploads, finalize_outputs, read_output, screen_upload, RejectedUpload, UploadIntake,
};
pub use processor::{
    variant_file_name, BatchProcessor, BatchReport, SkippedItem, VariantRecord,
};
