//! envset Expression Resolution
//!
//! Resolves placeholders embedded in parameter values.
//!
//! # Core Concepts
//!
//! - [`ExpressionResolver`]: Single entry point, called with an explicit [`ResolutionMode`]
//! - [`Binding`]: Parameters visible to expressions during one call
//! - [`TemplateEngine`]: Primary evaluator over `<{ expr }>`; legacy placeholders are translated first
//! - [`LegacyEngine`]: Fallback evaluator over `${expr}`, `$path` and `<% expr %>`
//! - [`TemplateCache`]: Bounded, idle-evicting cache of compiled legacy templates
//!
//! Values are re-evaluated until no unescaped placeholder is left, at most
//! [`MAX_NESTING`] times. Secured values substituted into a string are
//! wrapped in [`SECURE_START`]/[`SECURE_END`], which mark the result as
//! secured and are removed before it is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use envset_expr::{Binding, ExpressionResolver, ResolutionMode};
//!
//! let resolver = ExpressionResolver::new();
//! let merged = resolver.overlay_scopes([&tenant, &cloud, &namespace], None)?;
//! let effective = resolver.finalize(&merged, None)?;
//! ```

#![warn(unreachable_pub)]

mod binding;
mod cache;
mod error;
mod eval;
mod legacy;
mod markers;
mod parser;
mod resolver;
mod scan;
mod template;

pub use binding::Binding;
pub use cache::{CacheStats, TemplateCache, DEFAULT_CAPACITY, DEFAULT_IDLE_TIMEOUT};
pub use error::{ExpressionError, Result};
pub use legacy::{CompiledTemplate, LegacyEngine};
pub use markers::{
    has_placeholder, single_reference, strip_secure, unescape, wrap_secure, MAX_NESTING,
    SECURE_END, SECURE_START,
};
pub use parser::Dialect;
pub use resolver::{ExpressionResolver, ResolutionMode};
pub use scan::{translate_legacy, TEMPLATE_CLOSE, TEMPLATE_OPEN};
pub use template::TemplateEngine;

/// Commonly used types
pub mod prelude {
    pub use crate::{Binding, ExpressionError, ExpressionResolver, ResolutionMode};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
