//! Structured logging for the viewer.
//!
//! The crate logs through `tracing` macros and spans. Hosts that do not install
//! their own subscriber can call [`init_tracing`] once at startup to get a
//! formatted log on stderr or in a size-rotated file.
//!
//! # Configuration
//!
//! The log level is resolved in this order:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. `log_level` config option
//! 3. Default: `"info"`
//!
//! Setting `log_file` sends output to that file instead of stderr. The file
//! rotates at 10 MB and keeps three numbered backups (`viewer.log.1` is the
//! newest).
//!
//! # Usage
//!
//! ```rust
//! use docviewer::observability::init_tracing;
//! use docviewer::Config;
//!
//! let config = Config::default();
//! init_tracing(&config);
//!
//! tracing::debug!("viewer initialized");
//! ```
//!
//! # Modules
//!
//! - [`init`]: Subscriber setup
//! - [`file_writer`]: Rotating log file usable as a `MakeWriter`

pub mod file_writer;
mod init;

pub use file_writer::LogFile;
pub use init::init_tracing;
