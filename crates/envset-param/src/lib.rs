//! envset Parameter Model
//!
//! Typed configuration values with provenance, and the overlay map used to
//! stack scope fragments.
//!
//! # Core Concepts
//!
//! - [`Parameter`]: One value plus origin, secured flag and resolution state
//! - [`ParamValue`]: Exhaustive value variants (scalars, lists, maps)
//! - [`MergeMap`]: Ordered map with recursive overlay-write
//! - [`ParamPath`]: Dotted/indexed addressing inside parameter trees
//! - [`origin`]: Origin label formats
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_param::{MergeMap, Parameter, origin};
//!
//! let mut merged = MergeMap::new();
//! merged.overlay("REPLICAS", Parameter::from(1).with_origin(origin::tenant("acme")));
//! merged.overlay("REPLICAS", Parameter::from(3).with_origin(origin::application("api")));
//! assert_eq!(merged.get("REPLICAS").unwrap().to_string(), "3");
//! ```

#![warn(unreachable_pub)]

mod merge;
mod parameter;
mod path;

pub mod origin;

pub use merge::{merge_parameter, MergeMap};
pub use parameter::{stamp_origins, ParamMap, ParamValue, Parameter, ValueKind};
pub use path::{ParamPath, PathError, PathSegment};

/// Commonly used types
pub mod prelude {
    pub use crate::{MergeMap, ParamMap, ParamPath, ParamValue, Parameter};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
