//! Froster error taxonomy.
//!
//! Every orchestrator step returns either `Ok` or one of these variants,
//! carrying the local folder / remote URI context a user needs to retry.
//! No variant is retried automatically and no step rolls back a prior one.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid path {path:?}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("recursive collision between {a:?} and {b:?}")]
    RecursiveCollision { a: PathBuf, b: PathBuf },

    #[error("permission denied on {path:?}: {reason}")]
    PermissionDenied { path: PathBuf, reason: String },

    #[error("{folder:?} is already archived under {archive_folder}")]
    AlreadyArchived {
        folder: PathBuf,
        archive_folder: String,
    },

    #[error("{folder:?} already has a manifest from a prior attempt; pass force to continue")]
    AlreadyPrepared { folder: PathBuf },

    #[error("failed to pack small files in {folder:?}: {reason}")]
    PackFailed { folder: PathBuf, reason: String },

    #[error("failed to write manifest for {folder:?}: {reason}")]
    ManifestFailed { folder: PathBuf, reason: String },

    #[error("upload of {folder:?} to {archive_folder} failed: {reason}")]
    UploadFailed {
        folder: PathBuf,
        archive_folder: String,
        reason: String,
    },

    #[error("verification of {folder:?} against {archive_folder} failed: {mismatches} mismatch(es)")]
    VerificationFailed {
        folder: PathBuf,
        archive_folder: String,
        mismatches: usize,
    },

    #[error("failed to unpack small files into {folder:?}: {reason}")]
    UnpackFailed { folder: PathBuf, reason: String },

    #[error("reverse verification before delete failed for {folder:?}: {reason}")]
    DeleteVerificationFailed { folder: PathBuf, reason: String },

    #[error("{folder:?} is not archived")]
    NotArchived { folder: PathBuf },

    #[error("{folder:?} is covered by a Single archive at {parent:?}; only Recursive parents can serve sub-trees")]
    ParentNotRecursive { folder: PathBuf, parent: PathBuf },

    #[error("the archive registry at {path:?} is corrupt: {reason}")]
    RegistryCorrupt { path: PathBuf, reason: String },

    #[error("glacier restore for {folder:?} is pending: {pending} object(s) not yet ready")]
    GlacierPending { folder: PathBuf, pending: usize },

    #[error("object store operation failed: {reason}")]
    CopierFailed { reason: String },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
