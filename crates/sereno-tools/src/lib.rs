//! Companion tool execution for the i2pd desktop shell.
//!
//! The i2pd distribution ships a family of small command-line utilities
//! (key generation, address book registration, router info inspection).
//! This crate locates those executables, runs them with captured output
//! under a hard time limit, and lets callers cancel a run in flight.
//!
//! # Quick start
//!
//! ```no_run
//! use sereno_tools::{ToolInvocation, ToolKind, ToolRunner, ToolsConfig};
//!
//! # async fn demo() -> sereno_tools::Result<()> {
//! let runner = ToolRunner::new(ToolsConfig::default());
//! let output = runner
//!     .run(ToolInvocation::new(ToolKind::Keygen).arg("my-site.dat"))
//!     .await?;
//! println!("{}", output.combined());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod runner;

pub use catalog::ToolKind;
pub use config::{ToolsConfig, data_dir_candidates, default_data_dir};
pub use error::{Result, ToolError};
pub use runner::{ExitInfo, RunId, ToolInvocation, ToolOutput, ToolRunner};
