use anyhow::Context;
use tracing::instrument;

use common::progress;
use remote::{Programs, Request, Runner, Strategy, TransferOutcome};

use crate::walk;

/// Error type for uploads that preserves the summary of what completed before the failure.
///
/// The Display implementation shows the full error chain, so `{}` and `{:#}` print the same.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }

    /// The transfer failure kind, when the error came from a single-file transfer.
    pub fn kind(&self) -> Option<&remote::Error> {
        self.source.downcast_ref::<remote::Error>()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub overwrite: bool,
    pub resume: bool,
    /// 0 = silent, 1 = one record per call, 2+ = also one record per file of a directory
    pub verbosity: u8,
    /// Maximum number of files uploaded concurrently
    pub threads: usize,
    pub strategy: Strategy,
    pub programs: Programs,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overwrite: false,
            resume: false,
            verbosity: 1,
            threads: 1,
            strategy: Strategy::default(),
            programs: Programs::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_transferred: u64,
    pub files_transferred: usize,
    pub bytes_skipped: u64,
    pub files_skipped: usize,
}

impl Summary {
    fn from_outcome(outcome: TransferOutcome) -> Self {
        if outcome.skipped {
            Summary {
                bytes_skipped: outcome.bytes_transferred,
                files_skipped: 1,
                ..Default::default()
            }
        } else {
            Summary {
                bytes_transferred: outcome.bytes_transferred,
                files_transferred: 1,
                ..Default::default()
            }
        }
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
            files_transferred: self.files_transferred + other.files_transferred,
            bytes_skipped: self.bytes_skipped + other.bytes_skipped,
            files_skipped: self.files_skipped + other.files_skipped,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bytes transferred: {}\n\
            files transferred: {}\n\
            bytes skipped: {}\n\
            files skipped: {}\n",
            bytesize::ByteSize(self.bytes_transferred),
            self.files_transferred,
            bytesize::ByteSize(self.bytes_skipped),
            self.files_skipped,
        )
    }
}

/// Uploads a single file with the configured strategy.
#[instrument(skip(prog_track, runner, settings))]
pub async fn transfer_file<R: Runner>(
    prog_track: &'static progress::Progress,
    runner: &R,
    source: &std::path::Path,
    target: &str,
    settings: &Settings,
) -> Result<Summary, Error> {
    let _ops_guard = prog_track.ops.guard();
    let request = Request {
        source,
        target,
        overwrite: settings.overwrite,
        resume: settings.resume,
        verbosity: settings.verbosity,
        programs: &settings.programs,
    };
    let outcome = settings
        .strategy
        .transfer_file(runner, &request)
        .await
        .with_context(|| format!("failed uploading {source:?} to {target}"))
        .map_err(|err| Error::new(err, Default::default()))?;
    if outcome.skipped {
        prog_track.files_skipped.inc();
    } else {
        prog_track.bytes_transferred.add(outcome.bytes_transferred);
        prog_track.files_transferred.inc();
    }
    Ok(Summary::from_outcome(outcome))
}

/// Uploads every file below `source` to the matching path below `target`.
///
/// At most `settings.threads` files are in flight. After the first failure no new files are
/// started; transfers already running finish and their results are kept in the error summary.
#[instrument(skip(prog_track, runner, settings))]
pub async fn transfer_folder<R: Runner>(
    prog_track: &'static progress::Progress,
    runner: std::sync::Arc<R>,
    source: &std::path::Path,
    target: &str,
    settings: &Settings,
) -> Result<Summary, Error> {
    remote::Target::parse(target).map_err(|err| Error::new(err.into(), Default::default()))?;
    let files = walk::list_files(source)
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    if settings.verbosity > 0 {
        let total: u64 = files.iter().map(|file| file.size).sum();
        tracing::info!(
            "Uploading {} to {} ({} files, {})",
            source.display(),
            target,
            files.len(),
            bytesize::ByteSize(total)
        );
    }
    let file_settings = std::sync::Arc::new(Settings {
        verbosity: settings.verbosity.saturating_sub(1),
        ..settings.clone()
    });
    let max_width = settings.threads.max(1);
    let mut pending = files.into_iter();
    let mut join_set = tokio::task::JoinSet::new();
    let mut summary = Summary::default();
    let mut first_error: Option<anyhow::Error> = None;
    loop {
        while first_error.is_none() && join_set.len() < max_width {
            let Some(file) = pending.next() else {
                break;
            };
            let relative = file.path.strip_prefix(source).unwrap_or(&file.path);
            let file_target = match remote::target::join_target(target, relative) {
                Ok(file_target) => file_target,
                Err(error) => {
                    let error = anyhow::Error::from(error)
                        .context(format!("failed uploading {:?}", file.path));
                    tracing::error!("{:#}", &error);
                    first_error = Some(error);
                    break;
                }
            };
            let runner = runner.clone();
            let settings = file_settings.clone();
            join_set.spawn(async move {
                transfer_file(prog_track, &*runner, &file.path, &file_target, &settings).await
            });
        }
        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok(Ok(file_summary)) => summary = summary + file_summary,
            Ok(Err(error)) => {
                tracing::error!("{:#}", &error);
                summary = summary + error.summary;
                if first_error.is_none() {
                    first_error = Some(error.source);
                }
            }
            Err(join_error) => {
                tracing::error!("upload task failed: {join_error}");
                if first_error.is_none() {
                    first_error = Some(join_error.into());
                }
            }
        }
    }
    match first_error {
        Some(source) => Err(Error::new(source, summary)),
        None => Ok(summary),
    }
}

/// Uploads `source` to `target`: directories file by file, anything else as one file.
#[instrument(skip(prog_track, runner, settings))]
pub async fn upload<R: Runner>(
    prog_track: &'static progress::Progress,
    runner: std::sync::Arc<R>,
    source: &std::path::Path,
    target: &str,
    settings: &Settings,
) -> Result<Summary, Error> {
    let is_dir = tokio::fs::metadata(source)
        .await
        .is_ok_and(|metadata| metadata.is_dir());
    if is_dir {
        transfer_folder(prog_track, runner, source, target, settings).await
    } else {
        transfer_file(prog_track, &*runner, source, target, settings).await
    }
}
