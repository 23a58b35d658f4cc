//! Error types for effective set generation
//!
//! Configuration and inventory errors abort a run before any application is
//! processed. Everything else is raised per application and collected in the
//! [`GenerationReport`](crate::GenerationReport).

use envset_expr::ExpressionError;

/// Main generation error type
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Tenant or cloud missing from the inventory
    #[error("{0} not found in the environment inventory")]
    EntityNotFound(&'static str),

    /// Application refers to a namespace the inventory does not define
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Descriptor component lacks a required property
    #[error("property '{property}' is mandatory for {entity}")]
    MissingMandatoryProperty { property: String, entity: String },

    /// Expression resolution failed for one application
    #[error("failed to resolve parameters of application {application} in namespace {namespace}: {source}")]
    Resolution {
        application: String,
        namespace: String,
        #[source]
        source: ExpressionError,
    },

    /// Environment-level stream failed to resolve
    #[error("failed to resolve {stream} parameters: {source}")]
    StreamResolution {
        stream: &'static str,
        #[source]
        source: ExpressionError,
    },

    /// Pipeline consumer property with no value anywhere
    #[error("property {property} of consumer {consumer} is required and no value is defined in E2E configurations")]
    ConsumerPropertyRequired { consumer: String, property: String },

    /// Invalid generator configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inventory document could not be parsed
    #[error("invalid inventory: {0}")]
    InvalidInventory(#[from] serde_yaml::Error),

    /// Worker pool could not be created
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// One or more applications failed
    #[error("Application processing failed: {}", .0.join(", "))]
    ApplicationsFailed(Vec<String>),
}

impl GenerationError {
    /// Create missing mandatory property error
    #[inline]
    pub fn mandatory(property: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::MissingMandatoryProperty {
            property: property.into(),
            entity: entity.into(),
        }
    }

    /// Create resolution error for one application
    #[inline]
    pub fn resolution(
        application: impl Into<String>,
        namespace: impl Into<String>,
        source: ExpressionError,
    ) -> Self {
        Self::Resolution {
            application: application.into(),
            namespace: namespace.into(),
            source,
        }
    }

    /// Check if the error aborts the run before processing starts
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound(_)
                | Self::InvalidConfig(_)
                | Self::InvalidInventory(_)
                | Self::WorkerPool(_)
        )
    }

    /// Check if the error belongs to a single application
    #[inline]
    #[must_use]
    pub fn is_application_scoped(&self) -> bool {
        matches!(
            self,
            Self::NamespaceNotFound(_)
                | Self::MissingMandatoryProperty { .. }
                | Self::Resolution { .. }
        )
    }
}

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandatory_message_names_property_and_entity() {
        let err = GenerationError::mandatory("git_url", "service:api");
        assert_eq!(err.to_string(), "property 'git_url' is mandatory for service:api");
        assert!(err.is_application_scoped());
        assert!(!err.is_configuration());
    }

    #[test]
    fn aggregated_failures() {
        let err = GenerationError::ApplicationsFailed(vec![
            "billing:ns1".to_string(),
            "orders:ns1".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Application processing failed: billing:ns1, orders:ns1"
        );
    }

    #[test]
    fn missing_tenant_is_configuration_error() {
        assert!(GenerationError::EntityNotFound("Tenant").is_configuration());
    }
}
