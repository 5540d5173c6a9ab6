//! End-to-end per-folder state machines (§4.9–§4.11).

pub mod archive;
pub mod delete;
pub mod reset;
pub mod restore;

pub use archive::{archive_folder, ArchiveOptions, ArchiveOutcome};
pub use delete::{delete_folder, DeleteOutcome};
pub use reset::reset_folder;
pub use restore::{restore_folder, RestoreOptions, RestoreOutcome};
