//! Rowpipe Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient plumbing shared by every rowpipe binary.
//!
//! # Overview
//!
//! - **Logging**: `tracing` subscriber bootstrap driven by `LOG_*` environment variables
//! - **Environment**: typed lookups for configuration variables
//! - **Errors**: the error type for the two concerns above
//!
//! # Example
//!
//! ```no_run
//! use rowpipe_common::env;
//! use rowpipe_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let broker = env::var_or("KAFKA_BROKER", "localhost:9092");
//!     tracing::info!(%broker, "starting");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
