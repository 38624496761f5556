use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rup",
    version,
    about = "Upload files and directory trees to remote hosts over rsync or ssh",
    long_about = "`rup` uploads a local file or directory tree to a remote host using the system's rsync, ssh and scp.

Targets have the form ssh://HOST:PATH. Several hosts sharing the same storage can be given as
ssh://HOST1+HOST2:PATH, each file then goes through a randomly chosen one of them.

EXAMPLE:
    # Upload a directory with 8 concurrent transfers, skipping files already present
    rup /data/run-42 ssh://backup-host:/srv/runs/run-42 -j 8 --resume --progress --summary

Authentication is left entirely to ssh: configure keys or an agent beforehand."
)]
struct Args {
    // Upload options
    /// Replace files that already exist on the remote host
    #[arg(short = 'o', long = "overwrite", help_heading = "Upload options")]
    overwrite: bool,

    /// Skip files that already exist on the remote host with the same size
    ///
    /// Only the ssh strategy checks the remote side; the rsync strategy relies on rsync's own
    /// --partial handling.
    #[arg(long, help_heading = "Upload options")]
    resume: bool,

    /// Number of files uploaded concurrently when the source is a directory
    #[arg(
        short = 'j',
        long,
        default_value = "1",
        value_name = "N",
        help_heading = "Upload options"
    )]
    threads: usize,

    /// Transfer strategy: rsync (single rsync call per file) or ssh (stat probe, then scp)
    #[arg(
        long,
        default_value = "rsync",
        value_name = "STRATEGY",
        help_heading = "Upload options"
    )]
    strategy: remote::Strategy,

    // External programs
    /// rsync binary to run
    #[arg(
        long,
        default_value = "rsync",
        value_name = "PATH",
        help_heading = "External programs"
    )]
    rsync_bin: String,

    /// ssh binary to run
    #[arg(
        long,
        default_value = "ssh",
        value_name = "PATH",
        help_heading = "External programs"
    )]
    ssh_bin: String,

    /// scp binary to run
    #[arg(
        long,
        default_value = "scp",
        value_name = "PATH",
        help_heading = "External programs"
    )]
    scp_bin: String,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Toggles the type of progress to show
    ///
    /// If specified, --progress flag is implied.
    ///
    /// Options are: `progress-bar` (animated progress display), `text-updates` (appropriate for
    /// logging), `auto` (default, will choose between the two depending on the type of terminal
    /// attached to stderr)
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Sets the delay between progress updates
    ///
    /// - For the interactive (--progress-type=progress-bar), the default is 200ms.
    /// - For the non-interactive (--progress-type=text-updates), the default is 10s.
    ///
    /// If specified, --progress flag is implied.
    ///
    /// This option accepts a human readable duration, e.g. "200ms", "10s", "5min" etc.
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Performance & throttling
    /// Throttle the number of processes spawned per second, 0 means no throttle
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Performance & throttling"
    )]
    ops_throttle: usize,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Local file or directory to upload
    #[arg()]
    source: std::path::PathBuf,

    /// Remote target, ssh://HOST[+HOST...]:PATH
    #[arg()]
    target: String,
}

#[instrument]
async fn async_main(args: Args) -> Result<upload::Summary> {
    let settings = upload::Settings {
        overwrite: args.overwrite,
        resume: args.resume,
        verbosity: if args.quiet { 0 } else { args.verbose + 1 },
        threads: args.threads,
        strategy: args.strategy,
        programs: remote::Programs {
            rsync: args.rsync_bin,
            ssh: args.ssh_bin,
            scp: args.scp_bin,
        },
    };
    let runner = std::sync::Arc::new(remote::SystemRunner);
    match upload::upload(
        common::get_progress(),
        runner,
        &args.source,
        &args.target,
        &settings,
    )
    .await
    {
        Ok(summary) => Ok(summary),
        Err(error) => {
            if args.summary {
                return Err(anyhow!("{}\n\n{}", error, &error.summary));
            }
            Err(anyhow!("{}", error))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let throttle = common::ThrottleConfig {
        ops_throttle: args.ops_throttle,
    };
    let res = common::run(
        if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
            Some(common::ProgressSettings {
                progress_type: args.progress_type.unwrap_or_default(),
                progress_delay: args.progress_delay,
            })
        } else {
            None
        },
        output,
        runtime,
        throttle,
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
