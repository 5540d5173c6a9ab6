//! Narrow interface over an external copy/verify tool (§4.6).
//!
//! `S3Copier` bridges the synchronous core into `aws-sdk-s3`'s async API
//! the same way `conserve::transport::s3::S3Transport` does: a private,
//! single-thread `tokio::runtime::Runtime` and `runtime.block_on(...)` at
//! each call site, so the rest of the crate never has to be `async`.

use std::path::Path;

use crate::errors::{Error, Result};
use crate::model::StorageClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    One,
    Recursive,
}

impl Default for Depth {
    fn default() -> Self {
        Depth::One
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub depth: Depth,
    pub follow_symlinks: bool,
    pub excludes: Vec<String>,
    /// Overrides the copier's configured storage class for this call only
    /// (used to upload the all-files CSV as `IntelligentTiering`
    /// regardless of the folder's target class, §4.6).
    pub storage_class_override: Option<StorageClass>,
}

#[derive(Debug, Clone)]
pub struct CopyReport {
    pub files_transferred: usize,
    pub errors: usize,
}

impl CopyReport {
    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub checked: usize,
    pub mismatches: usize,
}

/// Object-store copier/verifier contract. Implementations may shell out to
/// an external tool or speak to the object store directly; the orchestrators
/// only depend on this trait.
pub trait Copier: Send + Sync {
    fn copy(&self, src: &Path, dst: &str, options: &CopyOptions) -> Result<CopyReport>;

    /// The restore-side mirror of `copy`: pull objects under `src` (a
    /// remote URI) down into the local directory `dst` (§4.10).
    fn copy_down(&self, src: &str, dst: &Path, options: &CopyOptions) -> Result<CopyReport>;

    fn verify_checksum(
        &self,
        manifest_path: &Path,
        dst: &str,
        options: &CopyOptions,
    ) -> Result<VerifyReport>;

    fn mount(&self, uri: &str, mountpoint: &Path) -> Result<()>;

    fn unmount(&self, mountpoint: &Path) -> Result<()>;
}

/// A filesystem-backed stand-in used by tests, grounded on
/// `conserve::transport::local`: "uploads" are plain file copies into a
/// root directory mirroring the remote URI's path component.
pub struct LocalCopier {
    root: std::path::PathBuf,
}

impl LocalCopier {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        LocalCopier { root: root.into() }
    }

    fn dst_path(&self, dst: &str) -> std::path::PathBuf {
        let relative = dst.trim_start_matches(":s3:").replace(':', "_");
        self.root.join(relative)
    }
}

impl Copier for LocalCopier {
    fn copy(&self, src: &Path, dst: &str, options: &CopyOptions) -> Result<CopyReport> {
        let dst_dir = self.dst_path(dst);
        std::fs::create_dir_all(&dst_dir).map_err(|e| Error::io(&dst_dir, e))?;
        let mut files_transferred = 0;
        let mut errors = 0;
        let entries = std::fs::read_dir(src).map_err(|e| Error::io(src, e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if options.excludes.iter().any(|ex| ex == name_str.as_ref()) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => {
                    errors += 1;
                    continue;
                }
            };
            if options.depth == Depth::One && file_type.is_dir() {
                continue;
            }
            if file_type.is_file() || file_type.is_symlink() {
                match std::fs::copy(entry.path(), dst_dir.join(&name)) {
                    Ok(_) => files_transferred += 1,
                    Err(_) => errors += 1,
                }
            }
        }
        Ok(CopyReport {
            files_transferred,
            errors,
        })
    }

    fn copy_down(&self, src: &str, dst: &Path, options: &CopyOptions) -> Result<CopyReport> {
        let src_dir = self.dst_path(src);
        std::fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;
        let mut files_transferred = 0;
        let mut errors = 0;
        let entries = std::fs::read_dir(&src_dir).map_err(|e| Error::io(&src_dir, e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if options.excludes.iter().any(|ex| ex == name_str.as_ref()) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => {
                    errors += 1;
                    continue;
                }
            };
            if options.depth == Depth::One && file_type.is_dir() {
                continue;
            }
            if file_type.is_file() || file_type.is_symlink() {
                match std::fs::copy(entry.path(), dst.join(&name)) {
                    Ok(_) => files_transferred += 1,
                    Err(_) => errors += 1,
                }
            }
        }
        Ok(CopyReport {
            files_transferred,
            errors,
        })
    }

    fn verify_checksum(
        &self,
        manifest_path: &Path,
        dst: &str,
        _options: &CopyOptions,
    ) -> Result<VerifyReport> {
        let entries = crate::checksum::read_manifest(manifest_path)?;
        let dst_dir = self.dst_path(dst);
        let mut mismatches = 0;
        for entry in &entries {
            let remote_path = dst_dir.join(&entry.basename);
            let actual = crate::checksum::hash_file(&remote_path).unwrap_or_default();
            if actual != entry.digest {
                mismatches += 1;
            }
        }
        Ok(VerifyReport {
            checked: entries.len(),
            mismatches,
        })
    }

    fn mount(&self, _uri: &str, _mountpoint: &Path) -> Result<()> {
        Ok(())
    }

    fn unmount(&self, _mountpoint: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "s3")]
pub mod s3 {
    use std::path::Path;

    use aws_sdk_s3::types::StorageClass as SdkStorageClass;
    use tokio::runtime::Runtime;

    use super::*;

    /// Bridges `aws-sdk-s3`'s async API into the synchronous `Copier`
    /// contract, mirroring `conserve::transport::s3::S3Transport::new`.
    pub struct S3Copier {
        runtime: Runtime,
        client: aws_sdk_s3::Client,
        bucket: String,
        default_storage_class: StorageClass,
    }

    impl S3Copier {
        pub fn new(bucket: impl Into<String>, default_storage_class: StorageClass) -> Result<Self> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::CopierFailed {
                    reason: e.to_string(),
                })?;
            let config = runtime.block_on(aws_config::load_from_env());
            let client = aws_sdk_s3::Client::new(&config);
            Ok(S3Copier {
                runtime,
                client,
                bucket: bucket.into(),
                default_storage_class,
            })
        }

        fn storage_class_for(&self, options: &CopyOptions) -> StorageClass {
            options.storage_class_override.unwrap_or(self.default_storage_class)
        }

        pub(crate) fn sdk_client(&self) -> &aws_sdk_s3::Client {
            &self.client
        }

        pub(crate) fn bucket(&self) -> &str {
            &self.bucket
        }
    }

    fn to_sdk_storage_class(class: StorageClass) -> SdkStorageClass {
        match class {
            StorageClass::DeepArchive => SdkStorageClass::DeepArchive,
            StorageClass::Glacier => SdkStorageClass::Glacier,
            StorageClass::IntelligentTiering => SdkStorageClass::IntelligentTiering,
        }
    }

    impl Copier for S3Copier {
        fn copy(&self, src: &Path, dst: &str, options: &CopyOptions) -> Result<CopyReport> {
            let storage_class = to_sdk_storage_class(self.storage_class_for(options));
            let key_prefix = dst.trim_start_matches(":s3:").splitn(2, '/').nth(1).unwrap_or("").trim_end_matches('/');
            let mut files_transferred = 0;
            let mut errors = 0;

            let entries = std::fs::read_dir(src).map_err(|e| Error::io(src, e))?;
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name_str = name.to_string_lossy().into_owned();
                if options.excludes.iter().any(|ex| ex == &name_str) {
                    continue;
                }
                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(_) => {
                        errors += 1;
                        continue;
                    }
                };
                if options.depth == Depth::One && file_type.is_dir() {
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let key = format!("{key_prefix}/{name_str}");
                let body = match self
                    .runtime
                    .block_on(aws_sdk_s3::primitives::ByteStream::from_path(entry.path()))
                {
                    Ok(b) => b,
                    Err(_) => {
                        errors += 1;
                        continue;
                    }
                };
                let result = self.runtime.block_on(
                    self.client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(&key)
                        .storage_class(storage_class.clone())
                        .body(body)
                        .send(),
                );
                match result {
                    Ok(_) => files_transferred += 1,
                    Err(_) => errors += 1,
                }
            }
            Ok(CopyReport {
                files_transferred,
                errors,
            })
        }

        fn copy_down(&self, src: &str, dst: &Path, options: &CopyOptions) -> Result<CopyReport> {
            let key_prefix = src.trim_start_matches(":s3:").splitn(2, '/').nth(1).unwrap_or("").trim_end_matches('/');
            std::fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;

            let listing = self.runtime.block_on(
                self.client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(key_prefix)
                    .send(),
            );
            let objects = match listing {
                Ok(out) => out.contents().to_vec(),
                Err(e) => {
                    return Err(Error::CopierFailed {
                        reason: e.to_string(),
                    })
                }
            };

            let mut files_transferred = 0;
            let mut errors = 0;
            for object in objects {
                let Some(key) = object.key() else {
                    errors += 1;
                    continue;
                };
                let rest = key.strip_prefix(key_prefix).unwrap_or(key).trim_start_matches('/');
                if rest.is_empty() || (options.depth == Depth::One && rest.contains('/')) {
                    continue;
                }
                let name = std::path::Path::new(rest).file_name().unwrap_or_default();
                if options.excludes.iter().any(|ex| ex.as_str() == name.to_string_lossy()) {
                    continue;
                }
                let result = self.runtime.block_on(
                    self.client.get_object().bucket(&self.bucket).key(key).send(),
                );
                match result {
                    Ok(output) => {
                        let bytes = self.runtime.block_on(output.body.collect());
                        match bytes {
                            Ok(bytes) => {
                                match std::fs::write(dst.join(name), bytes.into_bytes()) {
                                    Ok(_) => files_transferred += 1,
                                    Err(_) => errors += 1,
                                }
                            }
                            Err(_) => errors += 1,
                        }
                    }
                    Err(_) => errors += 1,
                }
            }
            Ok(CopyReport {
                files_transferred,
                errors,
            })
        }

        fn verify_checksum(
            &self,
            manifest_path: &Path,
            dst: &str,
            _options: &CopyOptions,
        ) -> Result<VerifyReport> {
            let entries = crate::checksum::read_manifest(manifest_path)?;
            let key_prefix = dst.trim_start_matches(":s3:").splitn(2, '/').nth(1).unwrap_or("").trim_end_matches('/');
            let mut mismatches = 0;
            for entry in &entries {
                let key = format!("{key_prefix}/{}", entry.basename);
                let head = self.runtime.block_on(
                    self.client.head_object().bucket(&self.bucket).key(&key).send(),
                );
                let matches = head
                    .ok()
                    .and_then(|o| o.e_tag().map(|t| t.trim_matches('"') == entry.digest))
                    .unwrap_or(false);
                if !matches {
                    mismatches += 1;
                }
            }
            Ok(VerifyReport {
                checked: entries.len(),
                mismatches,
            })
        }

        fn mount(&self, _uri: &str, _mountpoint: &Path) -> Result<()> {
            Err(Error::CopierFailed {
                reason: "mount is not implemented for the S3 copier".to_string(),
            })
        }

        fn unmount(&self, _mountpoint: &Path) -> Result<()> {
            Ok(())
        }
    }
}
