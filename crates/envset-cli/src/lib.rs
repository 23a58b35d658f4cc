//! envset Command-Line Driver
//!
//! Reads an environment inventory, runs the generator and writes the
//! effective set directory tree.
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_cli::{command, GenerateArgs, OutputWriter};
//!
//! let matches = command().get_matches();
//! let args = GenerateArgs::from_matches(matches.subcommand_matches("generate").unwrap())?;
//! let report = EffectiveSetGenerator::new(args.config.clone()).generate(&inventory)?;
//! OutputWriter::new(&args.output).with_traceability(true).write(&report)?;
//! ```

#![warn(unreachable_pub)]

pub mod args;
pub mod writer;

pub use args::{command, parse_extra_param, GenerateArgs, DEPLOYMENT_SESSION_ID};
pub use writer::{chart_dir_name, OutputError, OutputWriter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
