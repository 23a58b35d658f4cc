//! Origin labels
//!
//! Every parameter records the scope or source that produced it. The label
//! formats here are what the provenance engine later turns into comments.

/// Value supplied by the generator itself as a fallback
pub const ENVGENE_DEFAULT: &str = "envgene default";

/// Value computed by the generator
pub const ENVGENE_CALCULATED: &str = "envgene calculated";

/// Value passed in with the pipeline invocation
pub const PIPELINE_PARAMETER: &str = "envgene pipeline parameter";

/// Namespace credential token
pub const K8S_TOKEN: &str = "k8s token";

/// Tenant-level fragment
#[must_use]
pub fn tenant(tenant: &str) -> String {
    format!("Env/Tenant: {tenant}")
}

/// Cloud-level fragment
#[must_use]
pub fn cloud(tenant: &str, cloud: &str) -> String {
    format!("Env/Cloud: {tenant}/{cloud}")
}

/// Namespace-level fragment
#[must_use]
pub fn namespace(tenant: &str, cloud: &str, namespace: &str) -> String {
    format!("Env/Namespace: {tenant}/{cloud}/{namespace}")
}

/// Application override declared on the cloud
#[must_use]
pub fn cloud_application(application: &str) -> String {
    format!("Env/Cloud/App: {application}")
}

/// Application override declared on the namespace
#[must_use]
pub fn application(application: &str) -> String {
    format!("Application: {application}")
}

/// Values taken from the SBOM and its baseline resource profile
#[must_use]
pub fn sbom_baseline(baseline: &str) -> String {
    format!("sbom, resource-profile-baseline: {baseline}")
}

/// Values taken from a resource profile override
#[must_use]
pub fn profile_override(profile: &str) -> String {
    format!("resource-profile-override: {profile}")
}
