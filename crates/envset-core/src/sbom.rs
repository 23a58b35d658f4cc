//! Parameter fragments derived from application descriptors
//!
//! Components are grouped into entity collections by MIME type. Every
//! component also contributes a deploy descriptor block and a common
//! descriptor block, which the assembly step later folds into the
//! `deploy-descriptor` output.

use envset_assembly::keys::{
    APP_CHART_NAME, CDN, COMMON_DEPLOY_DESCRIPTOR, CONFIGURATIONS, DEPLOY_DESCRIPTOR, FRONTENDS,
    PER_SERVICE_PARAMETERS, SERVICES, SMARTPLUG,
};
use envset_param::{origin, stamp_origins, ParamMap, Parameter};
use indexmap::IndexMap;

use crate::error::{GenerationError, Result};
use crate::inventory::{Application, Component, ImageReference};

/// Image-based service
pub const MIME_SERVICE: &str = "application/vnd.qubership.service";
/// Image-based service packaged as a plain binary
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
/// Configuration component
pub const MIME_CONFIGURATION: &str = "application/vnd.qubership.configuration";
/// Frontend configuration component
pub const MIME_FRONTEND: &str = "application/vnd.qubership.configuration.frontend";
/// Smartplug configuration component
pub const MIME_SMARTPLUG: &str = "application/vnd.qubership.configuration.smartplug";
/// CDN configuration component
pub const MIME_CDN: &str = "application/vnd.qubership.configuration.cdn";

const DEPLOYMENT_VERSION: &str = "v1";
const MANAGED_BY: &str = "argocd";

const IMAGE_PROPERTIES: [&str; 8] = [
    "docker_registry",
    "full_image_name",
    "git_branch",
    "git_revision",
    "git_url",
    "image_type",
    "promote_artifacts",
    "qualifier",
];

const CONFIGURATION_PROPERTIES: [&str; 5] = [
    "build_id_dtrust",
    "git_branch",
    "git_revision",
    "git_url",
    "maven_repository",
];

/// How a component is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Docker image
    Image,
    /// Configuration artifact
    Configuration,
}

/// Entity collection and component kind for a MIME type
#[must_use]
pub fn classify(mime_type: &str) -> Option<(&'static str, ComponentKind)> {
    match mime_type {
        MIME_SERVICE | MIME_OCTET_STREAM => Some((SERVICES, ComponentKind::Image)),
        MIME_CONFIGURATION => Some((CONFIGURATIONS, ComponentKind::Configuration)),
        MIME_FRONTEND => Some((FRONTENDS, ComponentKind::Configuration)),
        MIME_SMARTPLUG => Some((SMARTPLUG, ComponentKind::Configuration)),
        MIME_CDN => Some((CDN, ComponentKind::Configuration)),
        _ => None,
    }
}

/// Builds the SBOM layer of one application
#[derive(Debug)]
pub struct SbomFragments<'a> {
    application: &'a Application,
    session: &'a Parameter,
    baseline: String,
}

impl<'a> SbomFragments<'a> {
    /// Fragments for `application`, sharing the run's `session` id
    #[must_use]
    pub fn new(application: &'a Application, session: &'a Parameter) -> Self {
        let baseline = origin::sbom_baseline(
            application
                .descriptor
                .baseline
                .as_deref()
                .unwrap_or("none"),
        );
        Self {
            application,
            session,
            baseline,
        }
    }

    /// Build the layer.
    ///
    /// # Errors
    /// [`GenerationError::MissingMandatoryProperty`] for the first component
    /// lacking a required property.
    pub fn build(&self) -> Result<ParamMap> {
        let descriptor = &self.application.descriptor;
        let mut entities: IndexMap<&'static str, ParamMap> = IndexMap::new();
        let mut deploy_descriptor = ParamMap::new();
        let mut common = ParamMap::new();

        for component in &descriptor.components {
            let Some((entity, kind)) = classify(&component.mime_type) else {
                tracing::debug!(
                    "skipping component with mime type {} of application {}",
                    component.mime_type,
                    self.application.name
                );
                continue;
            };
            let name = mandatory(component.name.as_deref(), "name", "service")?;
            let label = format!("service:{name}");
            let version = mandatory(component.version.as_deref(), "version", &label)?;

            let (fragment, block) = match kind {
                ComponentKind::Image => (
                    self.image_service(component, name, &label)?,
                    self.image_descriptor(component, name, version, &label)?,
                ),
                ComponentKind::Configuration => (
                    self.configuration_service(component, name),
                    self.configuration_descriptor(component, name, version, &label)?,
                ),
            };

            entities
                .entry(entity)
                .or_default()
                .insert(name.to_string(), Parameter::new(fragment));
            deploy_descriptor.insert(name.to_string(), Parameter::new(block));
            common.insert(name.to_string(), Parameter::new(self.common_descriptor()));
        }

        let mut layer = ParamMap::new();
        for (entity, members) in entities {
            layer.insert(entity.to_string(), Parameter::new(members));
        }
        if !deploy_descriptor.is_empty() {
            layer.insert(DEPLOY_DESCRIPTOR.to_string(), Parameter::new(deploy_descriptor));
            layer.insert(COMMON_DEPLOY_DESCRIPTOR.to_string(), Parameter::new(common));
        }
        if let Some(per_service) = &descriptor.per_service_parameters {
            layer.insert(
                PER_SERVICE_PARAMETERS.to_string(),
                Parameter::new(per_service.clone()),
            );
        }
        if let Some(chart) = descriptor.app_chart_name.as_deref().filter(|c| !c.is_empty()) {
            layer.insert(APP_CHART_NAME.to_string(), Parameter::new(chart));
        }
        stamp_origins(&mut layer, &self.baseline);
        Ok(layer)
    }

    fn image_service(&self, component: &Component, name: &str, label: &str) -> Result<ParamMap> {
        let docker_tag = mandatory(component.property("full_image_name"), "full_image_name", label)?;
        let mut params = self.service_base(name);
        params.insert("DOCKER_TAG".into(), self.baseline_value(docker_tag));
        if let Some(repository) = image_repository(docker_tag) {
            params.insert("IMAGE_REPOSITORY".into(), self.baseline_value(repository));
        }
        if let Some(image) = &component.image {
            let entity = format!("image of {label}");
            let tag = mandatory(image.version.as_deref(), "TAG", &entity)?;
            params.insert("TAG".into(), self.baseline_value(tag));
        }
        self.apply_profiles(&mut params, component);
        Ok(params)
    }

    fn configuration_service(&self, component: &Component, name: &str) -> ParamMap {
        let mut params = self.service_base(name);
        params.insert(
            "DEPLOYMENT_VERSION".into(),
            Parameter::new(DEPLOYMENT_VERSION).with_origin(origin::ENVGENE_DEFAULT),
        );
        self.apply_profiles(&mut params, component);
        params
    }

    fn service_base(&self, name: &str) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert(
            "ARTIFACT_DESCRIPTOR_VERSION".into(),
            self.baseline_value(self.application.version.as_str()),
        );
        params.insert(
            "DEPLOYMENT_RESOURCE_NAME".into(),
            self.baseline_value(format!("{name}-{DEPLOYMENT_VERSION}")),
        );
        params.insert("DEPLOYMENT_VERSION".into(), self.baseline_value(DEPLOYMENT_VERSION));
        params.insert("SERVICE_NAME".into(), self.baseline_value(name));
        params
    }

    /// Baseline profile values, then override profile values on top
    fn apply_profiles(&self, params: &mut ParamMap, component: &Component) {
        let mut baseline = component.parameters.clone();
        stamp_origins(&mut baseline, &self.baseline);
        params.extend(baseline);

        if component.overrides.is_empty() {
            return;
        }
        let profile = self
            .application
            .descriptor
            .profile_override
            .as_deref()
            .unwrap_or("none");
        let mut overrides = component.overrides.clone();
        stamp_origins(&mut overrides, &origin::profile_override(profile));
        params.extend(overrides);
    }

    fn image_descriptor(
        &self,
        component: &Component,
        name: &str,
        version: &str,
        label: &str,
    ) -> Result<ParamMap> {
        let mut block = ParamMap::new();
        if let Some(image) = &component.image {
            self.docker_fields(&mut block, image, label)?;
        }
        block.insert(
            "deploy_param".into(),
            self.baseline_value(component.property("deploy_param").unwrap_or_default()),
        );
        block.insert("artifacts".into(), Parameter::new(Vec::<Parameter>::new()));
        for property in IMAGE_PROPERTIES {
            let value = mandatory(component.property(property), property, label)?;
            block.insert(property.into(), self.baseline_value(value));
        }
        if let Some(image) = block.get("full_image_name").cloned() {
            block.insert("image".into(), image);
        }
        block.insert("name".into(), self.baseline_value(name));
        block.insert("version".into(), self.baseline_value(version));
        block.sort_keys();
        Ok(block)
    }

    fn docker_fields(&self, block: &mut ParamMap, image: &ImageReference, label: &str) -> Result<()> {
        let entity = format!("image of {label}");
        let fields = [
            ("docker_digest", image.digest.as_deref(), "hashes"),
            ("docker_repository_name", image.group.as_deref(), "group"),
            ("docker_tag", image.version.as_deref(), "version"),
            ("image_name", image.name.as_deref(), "name"),
        ];
        for (key, value, property) in fields {
            let value = mandatory(value, property, &entity)?;
            block.insert(key.into(), self.baseline_value(value));
        }
        Ok(())
    }

    fn configuration_descriptor(
        &self,
        component: &Component,
        name: &str,
        version: &str,
        label: &str,
    ) -> Result<ParamMap> {
        let mut block = ParamMap::new();
        for property in CONFIGURATION_PROPERTIES {
            let value = mandatory(component.property(property), property, label)?;
            block.insert(property.into(), self.baseline_value(value));
        }
        block.insert("name".into(), self.baseline_value(name));
        block.insert("service_name".into(), self.baseline_value(name));
        block.insert("version".into(), self.baseline_value(version));
        if let Some(kind) = component.property("type") {
            block.insert("type".into(), self.baseline_value(kind));
        }
        block.sort_keys();
        Ok(block)
    }

    fn common_descriptor(&self) -> ParamMap {
        let mut block = ParamMap::new();
        block.insert(
            "APPLICATION_NAME".into(),
            self.baseline_value(self.application.name.as_str()),
        );
        block.insert(
            "DEPLOYMENT_SESSION_ID".into(),
            self.session.clone(),
        );
        block.insert(
            "MANAGED_BY".into(),
            Parameter::new(MANAGED_BY).with_origin(origin::ENVGENE_DEFAULT),
        );
        block
    }

    fn baseline_value(&self, value: impl Into<String>) -> Parameter {
        Parameter::new(value.into()).with_origin(self.baseline.as_str())
    }
}

fn mandatory<'v>(value: Option<&'v str>, property: &str, entity: &str) -> Result<&'v str> {
    value.ok_or_else(|| GenerationError::mandatory(property, entity))
}

/// Image name without its tag; `None` when the image is untagged.
///
/// Only a `:` in the last path segment separates the tag, so a registry
/// port (`host:5000/img`) is kept.
fn image_repository(image: &str) -> Option<&str> {
    let name_start = image.rfind('/').map_or(0, |slash| slash + 1);
    image[name_start..]
        .rfind(':')
        .map(|colon| &image[..name_start + colon])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ApplicationDescriptor;
    use pretty_assertions::assert_eq;

    fn properties(names: &[&str]) -> IndexMap<String, String> {
        names
            .iter()
            .map(|n| ((*n).to_string(), format!("{n}-value")))
            .collect()
    }

    fn image_component() -> Component {
        let mut props = properties(&IMAGE_PROPERTIES);
        props.insert("full_image_name".into(), "registry/acme/api:1.0".into());
        let mut parameters = ParamMap::new();
        parameters.insert("REPLICAS".into(), Parameter::from(2));
        Component {
            name: Some("api".into()),
            version: Some("1.0".into()),
            mime_type: MIME_SERVICE.into(),
            properties: props,
            image: Some(ImageReference {
                group: Some("acme".into()),
                name: Some("api".into()),
                version: Some("1.0".into()),
                digest: Some("sha256:abc".into()),
            }),
            parameters,
            overrides: ParamMap::new(),
        }
    }

    fn application(components: Vec<Component>) -> Application {
        Application {
            name: "billing".into(),
            version: "2.1".into(),
            namespace: "ns1".into(),
            descriptor: ApplicationDescriptor {
                baseline: Some("small".into()),
                components,
                ..ApplicationDescriptor::default()
            },
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify(MIME_OCTET_STREAM), Some((SERVICES, ComponentKind::Image)));
        assert_eq!(
            classify(MIME_FRONTEND),
            Some((FRONTENDS, ComponentKind::Configuration))
        );
        assert_eq!(classify("application/vnd.docker.image"), None);
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        assert_eq!(image_repository("registry/acme/api:1.0"), Some("registry/acme/api"));
        assert_eq!(image_repository("host:5000/img:1.0"), Some("host:5000/img"));
        assert_eq!(image_repository("host:5000/img"), None);
        assert_eq!(image_repository("api:latest"), Some("api"));
        assert_eq!(image_repository("api"), None);
    }

    #[test]
    fn image_repository_of_registry_with_port() {
        let mut component = image_component();
        component
            .properties
            .insert("full_image_name".into(), "host:5000/acme/api:1.0".into());
        let session = Parameter::new("s-1");
        let layer = SbomFragments::new(&application(vec![component]), &session)
            .build()
            .unwrap();

        let api = layer["services"].as_mapping().unwrap()["api"].as_mapping().unwrap();
        assert_eq!(api["IMAGE_REPOSITORY"].as_str(), Some("host:5000/acme/api"));
        assert_eq!(api["DOCKER_TAG"].as_str(), Some("host:5000/acme/api:1.0"));
    }

    #[test]
    fn image_service_fragment() {
        let session = Parameter::new("s-1");
        let app = application(vec![image_component()]);
        let layer = SbomFragments::new(&app, &session).build().unwrap();

        let api = layer["services"].as_mapping().unwrap()["api"].as_mapping().unwrap();
        assert_eq!(api["SERVICE_NAME"].as_str(), Some("api"));
        assert_eq!(api["DEPLOYMENT_RESOURCE_NAME"].as_str(), Some("api-v1"));
        assert_eq!(api["IMAGE_REPOSITORY"].as_str(), Some("registry/acme/api"));
        assert_eq!(api["TAG"].as_str(), Some("1.0"));
        assert_eq!(api["REPLICAS"].to_string(), "2");
        assert_eq!(
            api["REPLICAS"].origin(),
            Some("sbom, resource-profile-baseline: small")
        );

        let block = layer["deployDescriptor"].as_mapping().unwrap()["api"]
            .as_mapping()
            .unwrap();
        assert_eq!(block["docker_digest"].as_str(), Some("sha256:abc"));
        assert_eq!(block["image"].as_str(), Some("registry/acme/api:1.0"));
        assert_eq!(block["deploy_param"].as_str(), Some(""));

        let common = layer["commonDeployDescriptor"].as_mapping().unwrap()["api"]
            .as_mapping()
            .unwrap();
        assert_eq!(common["APPLICATION_NAME"].as_str(), Some("billing"));
        assert_eq!(common["MANAGED_BY"].origin(), Some(origin::ENVGENE_DEFAULT));
        assert_eq!(common["DEPLOYMENT_SESSION_ID"].as_str(), Some("s-1"));
    }

    #[test]
    fn override_profile_wins_over_baseline() {
        let mut component = image_component();
        component.overrides.insert("REPLICAS".into(), Parameter::from(5));
        let mut app = application(vec![component]);
        app.descriptor.profile_override = Some("large".into());

        let session = Parameter::new("s");
        let layer = SbomFragments::new(&app, &session).build().unwrap();
        let api = layer["services"].as_mapping().unwrap()["api"].as_mapping().unwrap();
        assert_eq!(api["REPLICAS"].to_string(), "5");
        assert_eq!(api["REPLICAS"].origin(), Some("resource-profile-override: large"));
    }

    #[test]
    fn configuration_component() {
        let component = Component {
            name: Some("ui".into()),
            version: Some("3".into()),
            mime_type: MIME_FRONTEND.into(),
            properties: properties(&CONFIGURATION_PROPERTIES),
            ..Component::default()
        };
        let session = Parameter::new("s");
        let app = application(vec![component]);
        let layer = SbomFragments::new(&app, &session).build().unwrap();

        let ui = layer["frontends"].as_mapping().unwrap()["ui"].as_mapping().unwrap();
        assert_eq!(ui["DEPLOYMENT_VERSION"].origin(), Some(origin::ENVGENE_DEFAULT));
        let block = layer["deployDescriptor"].as_mapping().unwrap()["ui"]
            .as_mapping()
            .unwrap();
        assert_eq!(block["service_name"].as_str(), Some("ui"));
        assert!(block.keys().zip(block.keys().skip(1)).all(|(a, b)| a < b));
    }

    #[test]
    fn missing_property_names_component() {
        let mut component = image_component();
        component.properties.shift_remove("git_url");
        let session = Parameter::new("s");
        let app = application(vec![component]);
        let err = SbomFragments::new(&app, &session).build().unwrap_err();
        assert_eq!(err.to_string(), "property 'git_url' is mandatory for service:api");
    }

    #[test]
    fn missing_version() {
        let mut component = image_component();
        component.version = None;
        let session = Parameter::new("s");
        let app = application(vec![component]);
        let err = SbomFragments::new(&app, &session).build().unwrap_err();
        assert_eq!(err.to_string(), "property 'version' is mandatory for service:api");
    }

    #[test]
    fn chart_and_per_service_blocks_pass_through() {
        let mut app = application(Vec::new());
        app.descriptor.app_chart_name = Some("billing-chart".into());
        let mut block = ParamMap::new();
        block.insert("api".into(), Parameter::new(ParamMap::new()));
        app.descriptor.per_service_parameters = Some(block);

        let session = Parameter::new("s");
        let layer = SbomFragments::new(&app, &session).build().unwrap();
        assert_eq!(layer["appChartName"].as_str(), Some("billing-chart"));
        assert!(layer.contains_key("perServiceParameters"));
        assert!(!layer.contains_key("deployDescriptor"));
    }
}
