//! envset Core
//!
//! Turns an environment inventory into its effective parameter set:
//! - Stacks scope fragments (calculated, SBOM, tenant, cloud, namespace, application)
//! - Resolves expressions per application on a bounded worker pool
//! - Assembles deployment, runtime, cleanup, pipeline and topology streams
//! - Records per-application failures without stopping the run
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_core::{EffectiveSetGenerator, EnvironmentInventory, GeneratorConfig};
//!
//! let inventory = EnvironmentInventory::from_path("inventory.yaml")?;
//! let generator = EffectiveSetGenerator::new(GeneratorConfig::new().with_traceability(true));
//! let report = generator.generate(&inventory)?;
//!
//! for app in &report.applications {
//!     println!("{}:{}", app.name, app.namespace);
//! }
//! report.ensure_success()?;
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod generator;
pub mod inventory;
pub mod processor;
pub mod sbom;

pub use config::{EffectiveSetVersion, GeneratorConfig};
pub use error::{GenerationError, Result};
pub use generator::{
    ApplicationOutput, ApplicationStreams, ConsumerOutput, EffectiveSetGenerator,
    GenerationReport, MappingTables,
};
pub use inventory::{
    Application, ApplicationDescriptor, Cloud, Component, Consumer, ConsumerProperty, Credential,
    EnvironmentInventory, ImageReference, Namespace, ScopeParameters, Tenant,
};
pub use processor::{NamespaceScope, ParameterGroup, ResolvedApplication, ScopeProcessor};
pub use sbom::SbomFragments;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the generator
    pub use crate::{
        EffectiveSetGenerator, EffectiveSetVersion, EnvironmentInventory, GenerationError,
        GenerationReport, GeneratorConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
