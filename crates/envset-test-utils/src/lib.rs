//! Testing utilities for envset workspace
//!
//! Shared inventory fixtures and parameter helpers.

#![allow(missing_docs)]

use envset_core::{Component, EnvironmentInventory, ImageReference};
use envset_param::{ParamMap, Parameter};

pub const IMAGE_SERVICE_MIME: &str = "application/vnd.qubership.service";

/// Environment with two applications in one namespace. `orders` lacks the
/// mandatory `git_url` property on its only component.
pub const TWO_APPLICATION_INVENTORY: &str = r#"
tenant:
  name: acme
  deployParameters:
    REGION: eu
    DEFAULT_SSL_CERTIFICATES_BUNDLE: abc
    api:
      LOG_LEVEL: debug
  e2eParameters:
    PIPELINE_URL: https://ci.acme.example
cloud:
  name: prod
  apiUrl: api.prod.acme.example
  apiPort: "6443"
  publicUrl: prod.acme.example
  protocol: https
  defaultCredentialsId: prod-token
  deployParameters:
    REGION: eu-west
  applications:
    billing:
      deployParameters:
        REPLICAS: 2
namespaces:
  ns1:
    name: acme-ns1
    deployParameters:
      PORT: 8080
      SERVER_PORT: ${PORT}
      NOTE: '\$NOT_A_VAR'
      DB_PASSWORD: "<{ 'hunter2' | secure }>"
    technicalConfigurationParameters:
      ENDPOINT: http://${NAMESPACE}:${PORT}
    applications:
      billing:
        deployParameters:
          REPLICAS: 3
credentials:
  prod-token:
    secret: k8s-secret
consumers:
  deployer:
    properties:
      - name: PIPELINE_URL
        required: true
      - name: TIMEOUT
        value: "30"
applications:
  - name: billing
    version: "1.4.0"
    namespace: ns1
    descriptor:
      baseline: small
      components:
        - name: api
          version: "1.4.0"
          mimeType: application/vnd.qubership.service
          properties:
            docker_registry: registry.acme.example
            full_image_name: registry.acme.example/billing/api:1.4.0
            git_branch: main
            git_revision: 0a1b2c
            git_url: https://git.acme.example/billing
            image_type: service
            promote_artifacts: "true"
            qualifier: release
          image:
            group: billing
            name: api
            version: 1.4.0
            digest: sha256:0a1b2c
          parameters:
            CPU_LIMIT: 500m
  - name: orders
    version: "2.0.0"
    namespace: ns1
    descriptor:
      components:
        - name: queue
          version: "2.0.0"
          mimeType: application/vnd.qubership.service
          properties:
            docker_registry: registry.acme.example
            full_image_name: registry.acme.example/orders/queue:2.0.0
            git_branch: main
            git_revision: 9f8e7d
            image_type: service
            promote_artifacts: "false"
            qualifier: release
"#;

pub fn two_application_inventory() -> EnvironmentInventory {
    EnvironmentInventory::from_yaml_str(TWO_APPLICATION_INVENTORY)
        .expect("fixture inventory parses")
}

/// Image service component with every mandatory property set
pub fn image_component(name: &str, version: &str) -> Component {
    let properties = [
        ("docker_registry", "registry.example".to_string()),
        ("full_image_name", format!("registry.example/{name}:{version}")),
        ("git_branch", "main".to_string()),
        ("git_revision", "abc123".to_string()),
        ("git_url", format!("https://git.example/{name}")),
        ("image_type", "service".to_string()),
        ("promote_artifacts", "true".to_string()),
        ("qualifier", "release".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Component {
        name: Some(name.to_string()),
        version: Some(version.to_string()),
        mime_type: IMAGE_SERVICE_MIME.to_string(),
        properties,
        image: Some(ImageReference {
            group: Some("example".to_string()),
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            digest: Some(format!("sha256:{name}")),
        }),
        ..Component::default()
    }
}

pub fn param_map(entries: &[(&str, Parameter)]) -> ParamMap {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Nested mapping value at `path` (dot separated), panicking when absent
pub fn mapping_at<'a>(params: &'a ParamMap, path: &str) -> &'a ParamMap {
    let mut current = params;
    for key in path.split('.') {
        current = current
            .get(key)
            .and_then(Parameter::as_mapping)
            .unwrap_or_else(|| panic!("no mapping at {path} (missing {key})"));
    }
    current
}
