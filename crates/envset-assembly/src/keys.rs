//! Well-known parameter names

/// Service collection
pub const SERVICES: &str = "services";
/// Configuration collection
pub const CONFIGURATIONS: &str = "configurations";
/// Frontend collection
pub const FRONTENDS: &str = "frontends";
/// Smartplug collection
pub const SMARTPLUG: &str = "smartplug";
/// CDN collection
pub const CDN: &str = "cdn";
/// Sample repository collection
pub const SAMPLE_REPO: &str = "sampleRepo";

/// Entity keys, in extraction order
pub const ENTITIES: [&str; 6] = [SERVICES, CONFIGURATIONS, FRONTENDS, SMARTPLUG, CDN, SAMPLE_REPO];

/// Per-service parameter block
pub const PER_SERVICE_PARAMETERS: &str = "perServiceParameters";
/// Per-component deploy descriptor block
pub const DEPLOY_DESCRIPTOR: &str = "deployDescriptor";
/// Descriptor entries shared by every component
pub const COMMON_DEPLOY_DESCRIPTOR: &str = "commonDeployDescriptor";
/// Application chart name
pub const APP_CHART_NAME: &str = "appChartName";
/// Synthetic group for non-entity parameters
pub const GLOBAL: &str = "global";

/// Certificate bundle supplied by the environment
pub const DEFAULT_SSL_CERTIFICATES_BUNDLE: &str = "DEFAULT_SSL_CERTIFICATES_BUNDLE";
/// Secured alias of the certificate bundle
pub const SSL_SECRET_VALUE: &str = "SSL_SECRET_VALUE";
/// Secured alias of the certificate bundle
pub const CA_BUNDLE_CERTIFICATE: &str = "CA_BUNDLE_CERTIFICATE";
/// MD5 hex digest of the certificate bundle
pub const CERTIFICATE_BUNDLE_MD5SUM: &str = "CERTIFICATE_BUNDLE_MD5SUM";
/// Name of the certificate secret
pub const SSL_SECRET: &str = "SSL_SECRET";
/// Value of [`SSL_SECRET`] when none is configured
pub const DEFAULT_SSL_SECRET: &str = "defaultsslcertificate";
/// Namespace credential token
pub const K8S_TOKEN: &str = "K8S_TOKEN";

/// Check whether `key` names an entity collection
#[inline]
#[must_use]
pub fn is_entity(key: &str) -> bool {
    ENTITIES.contains(&key)
}
