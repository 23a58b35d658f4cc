//! envset Parameter Assembly
//!
//! Turns fully resolved parameter maps into the output streams written for
//! deployment tooling.
//!
//! # Core Concepts
//!
//! - [`ParameterAssembler`]: Entry point per stream (deployment, runtime, cleanup, pipeline)
//! - [`StreamPair`]: The non-secured and secured halves of one stream
//! - [`ParameterBundle`]: Everything produced for one application
//! - [`split_by_secure`]: Partition by the `secured` flag; entity subtrees split per leaf
//! - [`extract_collisions`]: Top-level keys that shadow a service of the same name
//! - [`arrange_final`]: Entity members first, then the `global` group
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_assembly::ParameterAssembler;
//!
//! let bundle = ParameterAssembler::new().assemble_application(deploy, &technical, token);
//! write("deployment-parameters.yaml", &bundle.deploy.parameters)?;
//! write("credentials.yaml", &bundle.deploy.credentials)?;
//! ```

#![warn(unreachable_pub)]

mod assembler;
mod descriptor;
pub mod keys;
mod layout;
mod partition;
mod ssl;

pub use assembler::{LegacyBundle, ParameterAssembler, ParameterBundle};
pub use descriptor::{extract_per_service, merge_deploy_descriptor};
pub use layout::arrange_final;
pub use partition::{extract_collisions, split_by_secure, StreamKind, StreamPair};
pub use ssl::{derive_ssl_parameters, md5_hex};

/// Commonly used types
pub mod prelude {
    pub use crate::{ParameterAssembler, ParameterBundle, StreamKind, StreamPair};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
