//! Command-line entry point for froster.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info, warn};

use froster::copier::Copier;
use froster::glacier::GlacierBackend;
use froster::model::{RetrievalTier, StorageClass};
use froster::orchestrator::archive::{archive_folder, ArchiveOptions, ArchiveOutcome};
use froster::orchestrator::delete::delete_folder;
use froster::orchestrator::reset::reset_folder;
use froster::orchestrator::restore::{restore_folder, RestoreOptions, RestoreOutcome};
use froster::pathutil;
use froster::pwalk::PwalkWalker;
use froster::{indexer, logging, FrosterConfig, Registry};

#[derive(Debug, Parser)]
#[clap(
    name = "froster",
    about = "Archive and restore very large HPC directory trees to cold object storage.",
    author,
    version
)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// S3 bucket to archive into. Overrides --config.
    #[clap(long, global = true)]
    bucket: Option<String>,

    /// Key prefix under the bucket. Overrides --config.
    #[clap(long, global = true)]
    prefix: Option<String>,

    /// AWS profile name. Overrides --config.
    #[clap(long, global = true)]
    profile: Option<String>,

    /// Load a `FrosterConfig` from this JSON file before applying overrides.
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the persistent archive registry (default: ~/.froster/froster-archives.json).
    #[clap(long, global = true)]
    registry: Option<PathBuf>,

    /// Archive into a local directory instead of S3 (for testing without a bucket).
    #[clap(long, global = true)]
    local_archive_root: Option<PathBuf>,

    #[clap(long, global = true, value_enum, default_value_t = logging::LogFormat::Pretty)]
    log_format: logging::LogFormat,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Move one or more folders' content to cold storage, leaving checksummed manifests behind.
    Archive {
        #[clap(required = true)]
        folders: Vec<PathBuf>,
        /// Archive every directory in the tree, not just `folders`.
        #[clap(long)]
        recursive: bool,
        /// Archive again even if a manifest from a prior attempt exists.
        #[clap(long)]
        force: bool,
        #[clap(long)]
        storage_class: Option<StorageClass>,
    },

    /// Pull one or more archived folders' content back down, requesting glacier retrieval if needed.
    Restore {
        #[clap(required = true)]
        folders: Vec<PathBuf>,
        #[clap(long)]
        recursive: bool,
        #[clap(long, default_value_t = RetrievalTier::Standard)]
        tier: RetrievalTier,
        #[clap(long, default_value_t = 30)]
        retention_days: u32,
        /// Only trigger the glacier restore request; don't download.
        #[clap(long)]
        no_download: bool,
    },

    /// Verify one or more folders against their archive, then delete the local copies.
    Delete {
        #[clap(required = true)]
        folders: Vec<PathBuf>,
    },

    /// Remove froster's bookkeeping files and re-expand any packed tar.
    Reset { folder: PathBuf },

    /// Crawl a tree with `pwalk` and write a hotspots CSV of the largest folders.
    Index {
        folder: PathBuf,
        #[clap(long, default_value_t = 1.0)]
        min_folder_gib: f64,
        #[clap(long, default_value_t = 0.0)]
        min_avg_mib: f64,
        #[clap(long)]
        force: bool,
        #[clap(long, default_value = "pwalk")]
        pwalk_binary: String,
        /// Copy the written hotspots CSV into this directory too.
        #[clap(long)]
        copy_to: Option<PathBuf>,
    },
}

/// Run `op` over every folder in `folders`, logging and continuing past a
/// single folder's failure instead of aborting the whole batch (§7).
fn run_batch(
    folders: &[PathBuf],
    mut op: impl FnMut(&Path) -> froster::errors::Result<()>,
) -> CommandExitCode {
    let mut any_failed = false;
    for folder in folders {
        if let Err(e) = op(folder) {
            error!(folder = %folder.display(), "{e}");
            any_failed = true;
        }
    }
    if any_failed {
        CommandExitCode::Failed
    } else {
        CommandExitCode::Ok
    }
}

fn check_collisions(folders: &[PathBuf]) -> Result<(), Box<dyn StdError + Send + Sync>> {
    let canonical: Vec<PathBuf> = folders
        .iter()
        .map(|f| pathutil::canonicalize(f).unwrap_or_else(|_| f.clone()))
        .collect();
    if let Some((a, b)) = pathutil::detect_recursive_collision(&canonical) {
        return Err(format!(
            "{} and {} collide: one is an ancestor of the other, and folders in a batch must not overlap",
            a.display(),
            b.display()
        )
        .into());
    }
    Ok(())
}

#[repr(u8)]
enum CommandExitCode {
    Ok = 0,
    Failed = 1,
}

fn load_config(args: &Args) -> Result<FrosterConfig, Box<dyn StdError + Send + Sync>> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => FrosterConfig::default(),
    };
    if let Some(bucket) = &args.bucket {
        config.bucket = bucket.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(profile) = &args.profile {
        config.profile = profile.clone();
    }
    Ok(config)
}

fn registry_path(args: &Args) -> PathBuf {
    args.registry.clone().unwrap_or_else(|| {
        dirs_home().join(".froster").join("froster-archives.json")
    })
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(feature = "s3")]
fn build_copier(config: &FrosterConfig, args: &Args) -> Result<Box<dyn Copier>, Box<dyn StdError + Send + Sync>> {
    if let Some(root) = &args.local_archive_root {
        return Ok(Box::new(froster::copier::LocalCopier::new(root)));
    }
    Ok(Box::new(froster::copier::s3::S3Copier::new(
        config.bucket.clone(),
        config.default_storage_class,
    )?))
}

#[cfg(not(feature = "s3"))]
fn build_copier(_config: &FrosterConfig, args: &Args) -> Result<Box<dyn Copier>, Box<dyn StdError + Send + Sync>> {
    let root = args.local_archive_root.clone().ok_or(
        "this build has no S3 support; pass --local-archive-root",
    )?;
    Ok(Box::new(froster::copier::LocalCopier::new(root)))
}

fn build_glacier_backend(_config: &FrosterConfig, _args: &Args) -> Option<Box<dyn GlacierBackend>> {
    // A real glacier backend requires talking to S3's HeadObject/RestoreObject
    // APIs directly; wiring that up is future work (the copier trait alone
    // doesn't expose object metadata). Without one, restore_folder treats
    // every object as already outside glacier tier.
    None
}

impl Command {
    fn run(&self, args: &Args) -> Result<CommandExitCode, Box<dyn StdError + Send + Sync>> {
        let config = load_config(args)?;
        let registry = Registry::new(registry_path(args));

        let code = match self {
            Command::Archive {
                folders,
                recursive,
                force,
                storage_class,
            } => {
                check_collisions(folders)?;
                let copier = build_copier(&config, args)?;
                let options = ArchiveOptions {
                    storage_class: storage_class.unwrap_or(config.default_storage_class),
                    recursive: *recursive,
                    force: *force,
                    user: whoami::username(),
                    now: OffsetDateTime::now_utc(),
                };
                run_batch(folders, |folder| {
                    match archive_folder(folder, &config, &options, &registry, copier.as_ref())? {
                        ArchiveOutcome::Archived { archive_folder } => {
                            info!(folder = %folder.display(), %archive_folder, "archived");
                        }
                        ArchiveOutcome::SkippedEmpty => {
                            info!(folder = %folder.display(), "folder is empty, nothing to archive");
                        }
                    }
                    Ok(())
                })
            }
            Command::Restore {
                folders,
                recursive,
                tier,
                retention_days,
                no_download,
            } => {
                check_collisions(folders)?;
                let copier = build_copier(&config, args)?;
                let glacier_backend = build_glacier_backend(&config, args);
                let options = RestoreOptions {
                    recursive: *recursive,
                    retrieval_tier: *tier,
                    retention_days: *retention_days,
                    suppress_download: *no_download,
                };
                run_batch(folders, |folder| {
                    match restore_folder(
                        folder,
                        &config,
                        &options,
                        &registry,
                        copier.as_ref(),
                        glacier_backend.as_deref(),
                        None,
                    )? {
                        RestoreOutcome::Restored => info!(folder = %folder.display(), "restore complete"),
                        RestoreOutcome::GlacierPending { count } => {
                            warn!(folder = %folder.display(), pending = count, "glacier retrieval pending, try again later");
                        }
                    }
                    Ok(())
                })
            }
            Command::Delete { folders } => {
                check_collisions(folders)?;
                let copier = build_copier(&config, args)?;
                run_batch(folders, |folder| {
                    let outcome =
                        delete_folder(folder, &config, &registry, copier.as_ref(), OffsetDateTime::now_utc())?;
                    info!(folder = %folder.display(), deleted = outcome.deleted_files.len(), "deleted");
                    Ok(())
                })
            }
            Command::Reset { folder } => {
                reset_folder(folder)?;
                info!("reset complete");
                CommandExitCode::Ok
            }
            Command::Index {
                folder,
                min_folder_gib,
                min_avg_mib,
                force,
                pwalk_binary,
                copy_to,
            } => {
                let walker = PwalkWalker::new(pwalk_binary.clone());
                let sink = copy_to.as_ref().map(|dest_dir| indexer::CopyToDirSink {
                    dest_dir: dest_dir.clone(),
                });
                match indexer::run(
                    &walker,
                    folder,
                    &config,
                    *min_folder_gib,
                    *min_avg_mib,
                    *force,
                    OffsetDateTime::now_utc(),
                    sink.as_ref().map(|s| s as &dyn indexer::HotspotsSink),
                )? {
                    Some(path) => info!(path = %path.display(), "hotspots written"),
                    None => info!("hotspots file already exists, skipping"),
                }
                CommandExitCode::Ok
            }
        };
        Ok(code)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.log_format);

    let result = args.command.run(&args);
    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!("{e}");
            let mut cause: &dyn StdError = e.as_ref();
            while let Some(c) = cause.source() {
                error!("  caused by: {c}");
                cause = c;
            }
            ExitCode::from(CommandExitCode::Failed as u8)
        }
    }
}
