//! File and directory uploads to remote hosts
//!
//! [`upload`] is the entry point: a directory is walked and every regular file below it is
//! uploaded to the matching path below the target, a single file is uploaded as-is. Transfers of
//! one directory run concurrently, bounded by [`Settings::threads`].
//!
//! # Targets
//!
//! Targets have the form `ssh://HOST[+HOST...]:PATH`. With more than one host, every file picks
//! one of them at random, so a tree spread over `hostA+hostB` lands partly on each. This is only
//! useful when the hosts share the destination storage.
//!
//! # Failures
//!
//! The first failed file stops new transfers from being started. Files already in flight finish,
//! and their results are counted in the [`Summary`] attached to the returned [`Error`].
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), upload::Error> {
//! let runner = std::sync::Arc::new(remote::SystemRunner);
//! let settings = upload::Settings {
//!     resume: true,
//!     threads: 4,
//!     ..Default::default()
//! };
//! let summary = upload::upload(
//!     common::get_progress(),
//!     runner,
//!     std::path::Path::new("/data/run-42"),
//!     "ssh://backup-host:/srv/runs/run-42",
//!     &settings,
//! )
//! .await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod transfer;
pub mod walk;

pub use transfer::{Error, Settings, Summary, transfer_file, transfer_folder, upload};
