//! envset Provenance
//!
//! Serializes parameter maps and annotates every value with a short comment
//! naming where it came from.
//!
//! # Core Concepts
//!
//! - [`OriginMap`]: Path to origin lookup collected from a parameter tree
//! - [`origin_to_comment`]: Origin label to a categorized comment
//! - [`annotate`]: Line scanner that places comments without changing parsed content
//! - [`YamlRenderer`]: Serialization with optional annotation; `mapping.yaml` is never annotated
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_provenance::YamlRenderer;
//!
//! let renderer = YamlRenderer::new().with_traceability(true);
//! let text = renderer.render(&bundle.deploy.parameters, "deployment-parameters.yaml")?;
//! // REGION: eu # tenant: acme
//! ```

#![warn(unreachable_pub)]

mod annotate;
mod comment;
mod error;
mod origins;
mod render;

pub use annotate::annotate;
pub use comment::origin_to_comment;
pub use error::{ProvenanceError, Result};
pub use origins::OriginMap;
pub use render::{is_excluded, YamlRenderer, EXCLUDED_FILES};

/// Commonly used types
pub mod prelude {
    pub use crate::{OriginMap, ProvenanceError, YamlRenderer};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
