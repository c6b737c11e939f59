///! Card export module
///!
///! Single-card PNG export and whole-directory zip export, guarded by a
///! shared busy flag.

pub mod archive;
pub mod busy;
pub mod orchestrator;

pub use archive::CardArchive;
pub use busy::{BusyFlag, BusyGuard, ExportProgress, ExportStatus};
pub use orchestrator::{
    EXPORT_FAILED_MESSAGE, ExportArtifact, ExportError, ExportOptions, ExportOrchestrator,
};
