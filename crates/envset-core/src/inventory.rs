//! Environment inventory
//!
//! Everything one run needs about an environment: the tenant and cloud, the
//! namespaces, the applications in solution-descriptor order with the
//! components read from their SBOMs, credential tokens and pipeline
//! consumers. Each scope carries the same three parameter groups.

use std::path::Path;

use envset_param::ParamMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parameter groups carried by every scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeParameters {
    /// Deployment parameters
    pub deploy_parameters: ParamMap,
    /// Runtime (technical configuration) parameters
    pub technical_configuration_parameters: ParamMap,
    /// Pipeline (end-to-end) parameters
    pub e2e_parameters: ParamMap,
}

impl ScopeParameters {
    /// Check if no group has entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deploy_parameters.is_empty()
            && self.technical_configuration_parameters.is_empty()
            && self.e2e_parameters.is_empty()
    }
}

/// Tenant scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Tenant name
    pub name: String,
    /// Tenant-level parameters
    #[serde(flatten)]
    pub parameters: ScopeParameters,
}

/// Cloud scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cloud {
    /// Cloud name
    pub name: String,
    /// Cluster API address
    #[serde(default)]
    pub api_url: String,
    /// Cluster API port
    #[serde(default)]
    pub api_port: String,
    /// Public address of the cluster
    #[serde(default)]
    pub public_url: String,
    /// Protocol of the cluster API
    #[serde(default)]
    pub protocol: String,
    /// Credential used by namespaces that declare none
    #[serde(default)]
    pub default_credentials_id: Option<String>,
    /// Cloud-level parameters
    #[serde(flatten)]
    pub parameters: ScopeParameters,
    /// Per-application overrides declared on the cloud
    #[serde(default)]
    pub applications: IndexMap<String, ScopeParameters>,
}

/// Namespace scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Name of the namespace in the cluster
    pub name: String,
    /// Credential holding the namespace token
    #[serde(default)]
    pub credentials_id: Option<String>,
    /// Namespace-level parameters
    #[serde(flatten)]
    pub parameters: ScopeParameters,
    /// Per-application overrides declared on the namespace
    #[serde(default)]
    pub applications: IndexMap<String, ScopeParameters>,
}

/// Docker image of a service component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageReference {
    /// Repository group
    pub group: Option<String>,
    /// Image name
    pub name: Option<String>,
    /// Image tag
    pub version: Option<String>,
    /// Content digest
    pub digest: Option<String>,
}

/// One deployable component of an application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name
    #[serde(default)]
    pub name: Option<String>,
    /// Component version
    #[serde(default)]
    pub version: Option<String>,
    /// MIME type deciding the entity the component belongs to
    pub mime_type: String,
    /// Free-form build properties
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    /// Image, for image-based services
    #[serde(default)]
    pub image: Option<ImageReference>,
    /// Values of the baseline resource profile
    #[serde(default)]
    pub parameters: ParamMap,
    /// Values of the override resource profile
    #[serde(default)]
    pub overrides: ParamMap,
}

impl Component {
    /// Property value, if set
    #[inline]
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Application descriptor read from the SBOM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationDescriptor {
    /// Baseline resource profile name
    pub baseline: Option<String>,
    /// Override resource profile name
    pub profile_override: Option<String>,
    /// Application chart name
    pub app_chart_name: Option<String>,
    /// Per-service parameter block
    pub per_service_parameters: Option<ParamMap>,
    /// Components in SBOM order
    pub components: Vec<Component>,
}

/// Application deployed into one namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
    /// Key of the target namespace in the inventory
    pub namespace: String,
    /// SBOM-derived descriptor
    #[serde(default)]
    pub descriptor: ApplicationDescriptor,
}

impl Application {
    /// Key used for the application in failure reports
    #[must_use]
    pub fn failure_key(&self) -> String {
        format!("{}:{}", self.name, self.namespace)
    }
}

/// Stored credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Secret text (namespace token)
    pub secret: String,
}

/// Property requested by a pipeline consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerProperty {
    /// Parameter name
    pub name: String,
    /// Value used when no pipeline parameter defines it
    #[serde(default)]
    pub value: Option<String>,
    /// Fail when no value is found anywhere
    #[serde(default)]
    pub required: bool,
}

/// Pipeline consumer of end-to-end parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    /// Requested properties, in output order
    #[serde(default)]
    pub properties: Vec<ConsumerProperty>,
}

/// Full description of one environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentInventory {
    /// Tenant scope
    pub tenant: Option<Tenant>,
    /// Cloud scope
    pub cloud: Option<Cloud>,
    /// Namespaces by inventory key
    pub namespaces: IndexMap<String, Namespace>,
    /// Applications in solution-descriptor order
    pub applications: Vec<Application>,
    /// Credentials by id
    pub credentials: IndexMap<String, Credential>,
    /// Pipeline consumers by name
    pub consumers: IndexMap<String, Consumer>,
    /// Composite structure of the environment
    pub composite_structure: Option<ParamMap>,
}

impl EnvironmentInventory {
    /// Parse an inventory document
    ///
    /// # Errors
    /// [`GenerationError::InvalidInventory`](crate::GenerationError::InvalidInventory)
    /// when the text is not a valid inventory.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse an inventory file
    ///
    /// # Errors
    /// [`GenerationError::InvalidConfig`](crate::GenerationError::InvalidConfig)
    /// when the file cannot be read, otherwise as [`Self::from_yaml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::GenerationError::InvalidConfig(format!(
                "cannot read inventory {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Namespace by inventory key
    #[inline]
    #[must_use]
    pub fn namespace(&self, key: &str) -> Option<&Namespace> {
        self.namespaces.get(key)
    }

    /// Credential id of a namespace, falling back to the cloud default
    #[must_use]
    pub fn credentials_id<'a>(&'a self, namespace: &'a Namespace) -> Option<&'a str> {
        namespace
            .credentials_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.cloud
                    .as_ref()
                    .and_then(|c| c.default_credentials_id.as_deref())
                    .filter(|id| !id.is_empty())
            })
    }

    /// Namespace token, if a credential is configured and stored
    #[must_use]
    pub fn namespace_token(&self, namespace: &Namespace) -> Option<&str> {
        let id = self.credentials_id(namespace)?;
        self.credentials.get(id).map(|c| c.secret.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INVENTORY: &str = r#"
tenant:
  name: acme
  deployParameters:
    REGION: eu
cloud:
  name: prod
  apiUrl: api.prod.example
  apiPort: "6443"
  defaultCredentialsId: cloud-token
  applications:
    billing:
      deployParameters:
        REPLICAS: 2
namespaces:
  ns1:
    name: acme-ns1
    technicalConfigurationParameters:
      POOL: 4
  ns2:
    name: acme-ns2
    credentialsId: ns2-token
credentials:
  cloud-token:
    secret: c-secret
  ns2-token:
    secret: n-secret
applications:
  - name: billing
    version: "1.2"
    namespace: ns1
    descriptor:
      baseline: small
      components:
        - name: api
          version: "1.0"
          mimeType: application/vnd.qubership.service
          properties:
            git_url: https://git.example/api
"#;

    #[test]
    fn parses_scopes_and_components() {
        let inventory = EnvironmentInventory::from_yaml_str(INVENTORY).unwrap();
        let tenant = inventory.tenant.as_ref().unwrap();
        assert_eq!(tenant.name, "acme");
        assert_eq!(
            tenant.parameters.deploy_parameters["REGION"].as_str(),
            Some("eu")
        );
        let cloud = inventory.cloud.as_ref().unwrap();
        assert!(cloud.applications["billing"].technical_configuration_parameters.is_empty());
        assert_eq!(
            inventory.namespaces["ns1"]
                .parameters
                .technical_configuration_parameters["POOL"]
                .to_string(),
            "4"
        );
        let app = &inventory.applications[0];
        assert_eq!(app.failure_key(), "billing:ns1");
        assert_eq!(
            app.descriptor.components[0].property("git_url"),
            Some("https://git.example/api")
        );
    }

    #[test]
    fn namespace_token_falls_back_to_cloud_default() {
        let inventory = EnvironmentInventory::from_yaml_str(INVENTORY).unwrap();
        let ns1 = inventory.namespace("ns1").unwrap();
        let ns2 = inventory.namespace("ns2").unwrap();
        assert_eq!(inventory.namespace_token(ns1), Some("c-secret"));
        assert_eq!(inventory.namespace_token(ns2), Some("n-secret"));
    }

    #[test]
    fn invalid_document() {
        let err = EnvironmentInventory::from_yaml_str("applications: 3").unwrap_err();
        assert!(err.is_configuration());
    }
}
