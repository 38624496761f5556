//! Shared plumbing for the `rup` upload tools
//!
//! This crate owns everything that is not specific to how files travel to the remote host:
//!
//! - [`run`] builds the tokio runtime, configures `tracing` output, starts the spawn throttle and
//!   the progress printer, runs the tool's async entry point and reports its outcome.
//! - [`progress`] holds the process-wide counters that concurrent transfers update.
//! - [`config`] holds the plain configuration structs passed to [`run`].
//!
//! # Logging
//!
//! Log verbosity follows the `-v` count of the binaries: none = ERROR, `-v` = INFO, `-vv` =
//! DEBUG, `-vvv` = TRACE. `RUST_LOG` directives are honoured on top of that default, and
//! `--quiet` turns logging off entirely. All log output goes to stderr so that stdout only
//! carries the final summary.

use std::io::IsTerminal;

pub mod config;
pub mod progress;

pub use config::{OutputConfig, RuntimeConfig, ThrottleConfig};

static PROGRESS: std::sync::LazyLock<progress::Progress> =
    std::sync::LazyLock::new(progress::Progress::new);

/// Process-wide progress counters, shared by every transfer and read by the progress printer.
pub fn get_progress() -> &'static progress::Progress {
    &PROGRESS
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ProgressType {
    /// Progress bar when stderr is a terminal, text updates otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    /// Animated progress display
    #[value(alias = "ProgressBar")]
    ProgressBar,
    /// Periodic text blocks, suitable for log files
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    /// Human readable delay between updates, e.g. "200ms" or "10s"
    pub progress_delay: Option<String>,
}

impl ProgressSettings {
    fn resolved_type(&self) -> ProgressType {
        match self.progress_type {
            ProgressType::Auto => {
                if std::io::stderr().is_terminal() {
                    ProgressType::ProgressBar
                } else {
                    ProgressType::TextUpdates
                }
            }
            other => other,
        }
    }

    fn delay(&self, progress_type: ProgressType) -> anyhow::Result<std::time::Duration> {
        match &self.progress_delay {
            Some(delay) => humantime::parse_duration(delay)
                .map_err(|err| anyhow::anyhow!("invalid progress delay {delay:?}: {err}")),
            None => Ok(match progress_type {
                ProgressType::ProgressBar => std::time::Duration::from_millis(200),
                _ => std::time::Duration::from_secs(10),
            }),
        }
    }
}

struct ProgressTracker {
    done: std::sync::mpsc::Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

impl ProgressTracker {
    fn start(settings: &ProgressSettings) -> anyhow::Result<Self> {
        let progress_type = settings.resolved_type();
        let delay = settings.delay(progress_type)?;
        let (done, done_rx) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let mut printer = progress::ProgressPrinter::new(get_progress());
            let bar = match progress_type {
                ProgressType::ProgressBar => {
                    let bar = indicatif::ProgressBar::new_spinner();
                    bar.enable_steady_tick(std::time::Duration::from_millis(100));
                    Some(bar)
                }
                _ => None,
            };
            loop {
                let finished = !matches!(
                    done_rx.recv_timeout(delay),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout)
                );
                let text = printer.print();
                match &bar {
                    Some(bar) => bar.set_message(text),
                    None if !finished => eprintln!("{text}"),
                    None => {}
                }
                if finished {
                    break;
                }
            }
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
        });
        Ok(Self { done, handle })
    }

    fn stop(self) {
        let _ = self.done.send(());
        if self.handle.join().is_err() {
            tracing::error!("progress printer thread panicked");
        }
    }
}

fn setup_tracing(output: &OutputConfig) {
    let Some(level) = output.log_level() else {
        return;
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::from_level(level).into())
        .from_env_lossy();
    // a subscriber may already be installed, e.g. by a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    Ok(builder.build()?)
}

/// Runs `func` on a freshly built runtime and reports the outcome.
///
/// Returns `None` if the tool failed (the error has already been printed unless `quiet`),
/// otherwise the summary produced by `func`.
pub fn run<Fut, Summary, Error>(
    progress: Option<ProgressSettings>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    throttle: ThrottleConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Error: std::fmt::Display,
    Fut: std::future::Future<Output = Result<Summary, Error>>,
{
    setup_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            if !output.quiet {
                eprintln!("failed to start the runtime: {error:#}");
            }
            return None;
        }
    };
    let tracker = match progress.as_ref().map(ProgressTracker::start).transpose() {
        Ok(tracker) => tracker,
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            return None;
        }
    };
    let start_time = std::time::Instant::now();
    let res = runtime.block_on(async move {
        if throttle.ops_throttle > 0 {
            let (tokens, interval) = throttle::replenish_schedule(throttle.ops_throttle);
            throttle::init_spawn_tokens(tokens);
            tokio::spawn(throttle::run_spawn_replenish_thread(tokens, interval));
        }
        func().await
    });
    if let Some(tracker) = tracker {
        tracker.stop();
    }
    match res {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
                println!("walltime: {:.2?}", start_time.elapsed());
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}
