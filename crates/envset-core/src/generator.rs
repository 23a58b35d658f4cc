//! Parallel effective set generation
//!
//! One run resolves every application of an environment on a bounded worker
//! pool. Results are keyed by application and namespace, so the report does
//! not depend on scheduling. A failing application is recorded and the
//! others keep going.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use dashmap::DashMap;
use envset_assembly::{LegacyBundle, ParameterAssembler, ParameterBundle, StreamPair};
use envset_expr::ExpressionResolver;
use envset_param::{origin, ParamMap, Parameter};
use rayon::prelude::*;

use crate::config::{EffectiveSetVersion, GeneratorConfig};
use crate::error::{GenerationError, Result};
use crate::inventory::{Application, Cloud, Consumer, EnvironmentInventory, Namespace, Tenant};
use crate::processor::{NamespaceScope, ScopeProcessor};

const COMPOSITE_STRUCTURE_ORIGIN: &str = "composite-structure";

/// Streams of one application, in the layout of the configured version
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationStreams {
    /// Split deployment, runtime and descriptor outputs
    V2(ParameterBundle),
    /// Single-directory output
    V1(LegacyBundle),
}

/// Generated output of one application
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationOutput {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
    /// Inventory key of the namespace
    pub namespace: String,
    /// Name of the namespace in the cluster
    pub original_namespace: String,
    /// Assembled streams
    pub streams: ApplicationStreams,
}

impl ApplicationOutput {
    /// Split-layout bundle, if generated for v2.0
    #[inline]
    #[must_use]
    pub fn bundle(&self) -> Option<&ParameterBundle> {
        match &self.streams {
            ApplicationStreams::V2(bundle) => Some(bundle),
            ApplicationStreams::V1(_) => None,
        }
    }
}

/// Parameters requested by one pipeline consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerOutput {
    /// Consumer name
    pub name: String,
    /// Requested values, split by the secured flag
    pub streams: StreamPair,
}

/// Namespace to output directory tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTables {
    /// Deployment directories (the only table in the v1.0 layout)
    pub deployment: BTreeMap<String, String>,
    /// Runtime directories
    pub runtime: BTreeMap<String, String>,
    /// Cleanup directories
    pub cleanup: BTreeMap<String, String>,
}

impl MappingTables {
    /// Table as a parameter map, ready to be written
    #[must_use]
    pub fn to_params(table: &BTreeMap<String, String>) -> ParamMap {
        table
            .iter()
            .map(|(ns, dir)| (ns.clone(), Parameter::new(dir.as_str())))
            .collect()
    }
}

/// Result of one generation run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Layout version of every output
    pub version: EffectiveSetVersion,
    /// Successful applications in solution-descriptor order
    pub applications: Vec<ApplicationOutput>,
    /// Cleanup streams by namespace key
    pub cleanup: BTreeMap<String, StreamPair>,
    /// Pipeline stream
    pub e2e: Option<StreamPair>,
    /// Pipeline consumer streams in inventory order
    pub pipeline: Vec<ConsumerOutput>,
    /// Cluster topology
    pub topology: Option<StreamPair>,
    /// Namespace to output directory tables
    pub mappings: MappingTables,
    /// Failure message by `application:namespace`
    pub failures: BTreeMap<String, String>,
}

impl GenerationReport {
    /// Check if every application succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into an error
    ///
    /// # Errors
    /// [`GenerationError::ApplicationsFailed`] listing every failed
    /// `application:namespace`.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(GenerationError::ApplicationsFailed(
            self.failures.keys().cloned().collect(),
        ))
    }
}

/// Shared accumulators of one run
#[derive(Default)]
struct Accumulators {
    deployment: DashMap<String, String>,
    runtime: DashMap<String, String>,
    cleanup_dirs: DashMap<String, String>,
    cleanup: DashMap<String, StreamPair>,
    failures: DashMap<String, String>,
}

impl Accumulators {
    fn into_tables(self) -> (MappingTables, BTreeMap<String, StreamPair>, BTreeMap<String, String>) {
        let tables = MappingTables {
            deployment: self.deployment.into_iter().collect(),
            runtime: self.runtime.into_iter().collect(),
            cleanup: self.cleanup_dirs.into_iter().collect(),
        };
        (
            tables,
            self.cleanup.into_iter().collect(),
            self.failures.into_iter().collect(),
        )
    }
}

/// Per-run context shared by the workers
struct Run<'a> {
    inventory: &'a EnvironmentInventory,
    tenant: &'a Tenant,
    cloud: &'a Cloud,
    processor: ScopeProcessor<'a>,
    tokens: BTreeMap<String, String>,
    env_id: String,
}

/// Effective set generator
#[derive(Debug, Clone, Default)]
pub struct EffectiveSetGenerator {
    config: GeneratorConfig,
    resolver: ExpressionResolver,
    assembler: ParameterAssembler,
}

impl EffectiveSetGenerator {
    /// Create generator
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            resolver: ExpressionResolver::new(),
            assembler: ParameterAssembler::new(),
        }
    }

    /// With a specific expression resolver
    #[inline]
    #[must_use]
    pub fn with_resolver(mut self, resolver: ExpressionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the effective set of `inventory`.
    ///
    /// # Errors
    /// Missing tenant or cloud, worker pool failures, and failures of the
    /// environment-level streams. Per-application failures are recorded in
    /// the report instead.
    pub fn generate(&self, inventory: &EnvironmentInventory) -> Result<GenerationReport> {
        let tenant = inventory
            .tenant
            .as_ref()
            .ok_or(GenerationError::EntityNotFound("Tenant"))?;
        let cloud = inventory
            .cloud
            .as_ref()
            .ok_or(GenerationError::EntityNotFound("Cloud"))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads.max(1))
            .thread_name(|i| format!("envset-worker-{i}"))
            .build()?;

        let session = self.config.session_parameter();
        tracing::info!(
            "Generating effective set {} for {}/{}: {} applications, session {}",
            self.config.effective_set_version,
            tenant.name,
            cloud.name,
            inventory.applications.len(),
            session
        );

        pool.install(|| {
            let run = Run {
                inventory,
                tenant,
                cloud,
                processor: ScopeProcessor::new(tenant, cloud, &self.resolver, &session),
                tokens: collect_tokens(inventory),
                env_id: self
                    .config
                    .env_id
                    .clone()
                    .unwrap_or_else(|| cloud.name.clone()),
            };
            self.run(&run)
        })
    }

    fn run(&self, run: &Run<'_>) -> Result<GenerationReport> {
        let version = self.config.effective_set_version;
        let acc = Accumulators::default();

        let applications: Vec<ApplicationOutput> = run
            .inventory
            .applications
            .par_iter()
            .filter_map(|app| {
                tracing::info!(
                    "Started processing of application: {}:{} from the namespace {}",
                    app.name,
                    app.version,
                    app.namespace
                );
                match self.process_application(run, app, &acc) {
                    Ok(output) => {
                        tracing::info!(
                            "Finished processing of application: {}:{} from the namespace {}",
                            app.name,
                            app.version,
                            app.namespace
                        );
                        Some(output)
                    }
                    Err(e) => {
                        tracing::error!(
                            "Application {} from the namespace {} failed: {}",
                            app.name,
                            app.namespace,
                            e
                        );
                        tracing::debug!("Failure details for {}: {}", app.failure_key(), error_chain(&e));
                        acc.failures.entry(app.failure_key()).or_insert(e.to_string());
                        None
                    }
                }
            })
            .collect();

        let (e2e, pipeline, topology) = match version {
            EffectiveSetVersion::V2_0 => {
                let e2e = self.assembler.assemble_e2e(&run.processor.process_e2e()?);
                let pipeline = consumer_outputs(&run.inventory.consumers, &e2e)?;
                let topology = topology(run);
                (Some(e2e), pipeline, Some(topology))
            }
            EffectiveSetVersion::V1_0 => (None, Vec::new(), None),
        };

        let (mappings, cleanup, failures) = acc.into_tables();
        if !failures.is_empty() {
            tracing::error!("{} of {} applications failed", failures.len(), run.inventory.applications.len());
        }
        Ok(GenerationReport {
            version,
            applications,
            cleanup,
            e2e,
            pipeline,
            topology,
            mappings,
            failures,
        })
    }

    fn process_application(
        &self,
        run: &Run<'_>,
        app: &Application,
        acc: &Accumulators,
    ) -> Result<ApplicationOutput> {
        let namespace = run
            .inventory
            .namespace(&app.namespace)
            .ok_or_else(|| GenerationError::NamespaceNotFound(app.namespace.clone()))?;
        let scope = NamespaceScope {
            key: &app.namespace,
            namespace,
        };
        let original = scope.original_name();
        let token = run.tokens.get(original).map(String::as_str);

        let resolved = run.processor.process_application(app, scope)?;
        let streams = match self.config.effective_set_version {
            EffectiveSetVersion::V2_0 => {
                if !acc.cleanup.contains_key(scope.key) {
                    let cleanup = run.processor.process_cleanup(scope)?;
                    acc.cleanup
                        .entry(scope.key.to_string())
                        .or_insert_with(|| self.assembler.assemble_cleanup(&cleanup, token));
                }
                acc.deployment.insert(
                    original.to_string(),
                    mapping_path(&run.env_id, Some("deployment"), scope.key),
                );
                acc.runtime.insert(
                    original.to_string(),
                    mapping_path(&run.env_id, Some("runtime"), scope.key),
                );
                acc.cleanup_dirs.insert(
                    original.to_string(),
                    mapping_path(&run.env_id, Some("cleanup"), scope.key),
                );
                ApplicationStreams::V2(self.assembler.assemble_application(
                    resolved.deploy,
                    &resolved.technical,
                    token,
                ))
            }
            EffectiveSetVersion::V1_0 => {
                acc.deployment.insert(
                    original.to_string(),
                    mapping_path(&run.env_id, None, scope.key),
                );
                ApplicationStreams::V1(self.assembler.assemble_legacy(
                    &resolved.deploy,
                    &resolved.technical,
                    token,
                ))
            }
        };

        Ok(ApplicationOutput {
            name: app.name.clone(),
            version: app.version.clone(),
            namespace: app.namespace.clone(),
            original_namespace: original.to_string(),
            streams,
        })
    }
}

/// Namespace tokens by cluster namespace name, read-only once collected
fn collect_tokens(inventory: &EnvironmentInventory) -> BTreeMap<String, String> {
    let tokens = DashMap::new();
    let namespaces: Vec<&Namespace> = inventory.namespaces.values().collect();
    namespaces.par_iter().for_each(|namespace| {
        if let Some(token) = inventory.namespace_token(namespace) {
            tokens.insert(namespace.name.clone(), token.to_string());
        }
    });
    tokens.into_iter().collect()
}

fn mapping_path(env_id: &str, stream: Option<&str>, namespace: &str) -> String {
    match stream {
        Some(stream) => format!("/environments/{env_id}/effective-set/{stream}/{namespace}"),
        None => format!("/environments/{env_id}/effective-set/{namespace}"),
    }
}

fn consumer_outputs(
    consumers: &indexmap::IndexMap<String, Consumer>,
    e2e: &StreamPair,
) -> Result<Vec<ConsumerOutput>> {
    let mut outputs = Vec::with_capacity(consumers.len());
    for (name, consumer) in consumers {
        let mut streams = StreamPair::default();
        for property in &consumer.properties {
            if let Some(value) = e2e.parameters.get(&property.name) {
                streams.parameters.insert(property.name.clone(), value.clone());
            } else if let Some(value) = e2e.credentials.get(&property.name) {
                streams.credentials.insert(property.name.clone(), value.clone());
            } else if let Some(value) = property.value.as_deref().filter(|v| !v.is_empty()) {
                streams.parameters.insert(
                    property.name.clone(),
                    Parameter::new(value).with_origin(origin::ENVGENE_DEFAULT),
                );
            } else if property.required {
                return Err(GenerationError::ConsumerPropertyRequired {
                    consumer: name.clone(),
                    property: property.name.clone(),
                });
            }
        }
        outputs.push(ConsumerOutput {
            name: name.clone(),
            streams,
        });
    }
    Ok(outputs)
}

fn topology(run: &Run<'_>) -> StreamPair {
    let cloud_origin = origin::cloud(&run.tenant.name, &run.cloud.name);
    let mut parameters = ParamMap::new();

    if let Some(structure) = &run.inventory.composite_structure {
        let mut structure = Parameter::new(structure.clone());
        structure.stamp_origin(COMPOSITE_STRUCTURE_ORIGIN);
        parameters.insert("composite_structure".into(), structure);
    }

    let mut cluster = ParamMap::new();
    cluster.insert("api_port".into(), Parameter::new(run.cloud.api_port.as_str()));
    cluster.insert("api_url".into(), Parameter::new(run.cloud.api_url.as_str()));
    cluster.insert("protocol".into(), Parameter::new(run.cloud.protocol.as_str()));
    cluster.insert("public_url".into(), Parameter::new(run.cloud.public_url.as_str()));
    let mut cluster = Parameter::new(cluster);
    cluster.stamp_origin(&cloud_origin);
    parameters.insert("cluster".into(), cluster);

    let environments: ParamMap = run
        .inventory
        .namespaces
        .iter()
        .map(|(key, ns)| (key.clone(), Parameter::new(ns.name.as_str())))
        .collect();
    let mut environments = Parameter::new(environments);
    environments.stamp_origin(&cloud_origin);
    parameters.insert("environments".into(), environments);
    parameters.sort_keys();

    let tokens: ParamMap = run
        .tokens
        .iter()
        .map(|(ns, token)| (ns.clone(), Parameter::new(token.as_str())))
        .collect();
    let mut tokens = Parameter::new(tokens);
    tokens.stamp_origin(&cloud_origin);
    tokens.mark_secured();
    let mut credentials = ParamMap::new();
    credentials.insert("k8s_tokens".into(), tokens);

    StreamPair::new(parameters, credentials)
}

/// Error message followed by every source in the chain
fn error_chain(error: &dyn StdError) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": caused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{ConsumerProperty, ScopeParameters};
    use pretty_assertions::assert_eq;

    fn inventory() -> EnvironmentInventory {
        let mut tenant_params = ScopeParameters::default();
        tenant_params
            .e2e_parameters
            .insert("PIPELINE_URL".into(), Parameter::new("https://ci.example"));
        let mut inventory = EnvironmentInventory {
            tenant: Some(Tenant {
                name: "acme".into(),
                parameters: tenant_params,
            }),
            cloud: Some(Cloud {
                name: "prod".into(),
                api_url: "api.prod".into(),
                default_credentials_id: Some("token".into()),
                ..Cloud::default()
            }),
            ..EnvironmentInventory::default()
        };
        inventory.namespaces.insert(
            "ns1".into(),
            Namespace {
                name: "acme-ns1".into(),
                ..Namespace::default()
            },
        );
        inventory.credentials.insert(
            "token".into(),
            crate::inventory::Credential {
                secret: "s3cret".into(),
            },
        );
        for name in ["billing", "orders"] {
            inventory.applications.push(Application {
                name: name.into(),
                version: "1.0".into(),
                namespace: "ns1".into(),
                ..Application::default()
            });
        }
        inventory
    }

    fn generator(version: EffectiveSetVersion) -> EffectiveSetGenerator {
        EffectiveSetGenerator::new(
            GeneratorConfig::new()
                .with_worker_threads(2)
                .with_version(version)
                .with_env_id("prod/env1"),
        )
    }

    #[test]
    fn missing_tenant_aborts() {
        let mut inventory = inventory();
        inventory.tenant = None;
        let err = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory)
            .unwrap_err();
        assert_eq!(err.to_string(), "Tenant not found in the environment inventory");
    }

    #[test]
    fn applications_keep_descriptor_order() {
        let report = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory())
            .unwrap();
        let names: Vec<_> = report.applications.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["billing", "orders"]);
        assert!(report.is_success());
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn mapping_tables_use_original_namespace() {
        let report = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory())
            .unwrap();
        assert_eq!(
            report.mappings.deployment["acme-ns1"],
            "/environments/prod/env1/effective-set/deployment/ns1"
        );
        assert_eq!(
            report.mappings.cleanup["acme-ns1"],
            "/environments/prod/env1/effective-set/cleanup/ns1"
        );
        let params = MappingTables::to_params(&report.mappings.runtime);
        assert_eq!(
            params["acme-ns1"].as_str(),
            Some("/environments/prod/env1/effective-set/runtime/ns1")
        );
    }

    #[test]
    fn namespace_token_reaches_credentials_and_topology() {
        let report = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory())
            .unwrap();
        let bundle = report.applications[0].bundle().unwrap();
        let global = bundle.deploy.credentials["global"].as_mapping().unwrap();
        assert_eq!(global["K8S_TOKEN"].as_str(), Some("s3cret"));
        assert_eq!(
            report.cleanup["ns1"].credentials["K8S_TOKEN"].as_str(),
            Some("s3cret")
        );

        let topology = report.topology.unwrap();
        let tokens = topology.credentials["k8s_tokens"].as_mapping().unwrap();
        assert_eq!(tokens["acme-ns1"].as_str(), Some("s3cret"));
        assert!(tokens["acme-ns1"].secured);
        let cluster = topology.parameters["cluster"].as_mapping().unwrap();
        assert_eq!(cluster["api_url"].origin(), Some("Env/Cloud: acme/prod"));
    }

    #[test]
    fn unknown_namespace_is_recorded_not_fatal() {
        let mut inventory = inventory();
        inventory.applications[1].namespace = "missing".into();
        let report = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory)
            .unwrap();
        assert_eq!(report.applications.len(), 1);
        assert_eq!(
            report.failures["orders:missing"],
            "namespace not found: missing"
        );
        assert!(report.ensure_success().is_err());
    }

    #[test]
    fn consumers_pick_values_and_defaults() {
        let mut inventory = inventory();
        inventory.consumers.insert(
            "deployer".into(),
            Consumer {
                properties: vec![
                    ConsumerProperty {
                        name: "PIPELINE_URL".into(),
                        value: None,
                        required: true,
                    },
                    ConsumerProperty {
                        name: "TIMEOUT".into(),
                        value: Some("30".into()),
                        required: false,
                    },
                    ConsumerProperty {
                        name: "OPTIONAL".into(),
                        value: None,
                        required: false,
                    },
                ],
            },
        );
        let report = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory)
            .unwrap();
        let deployer = &report.pipeline[0];
        assert_eq!(deployer.name, "deployer");
        assert_eq!(
            deployer.streams.parameters.keys().collect::<Vec<_>>(),
            vec!["PIPELINE_URL", "TIMEOUT"]
        );
        assert_eq!(
            deployer.streams.parameters["TIMEOUT"].origin(),
            Some(origin::ENVGENE_DEFAULT)
        );
    }

    #[test]
    fn required_consumer_property_fails_run() {
        let mut inventory = inventory();
        inventory.consumers.insert(
            "deployer".into(),
            Consumer {
                properties: vec![ConsumerProperty {
                    name: "NOWHERE".into(),
                    value: None,
                    required: true,
                }],
            },
        );
        let err = generator(EffectiveSetVersion::V2_0)
            .generate(&inventory)
            .unwrap_err();
        assert!(matches!(err, GenerationError::ConsumerPropertyRequired { .. }));
    }

    #[test]
    fn legacy_layout_has_single_mapping_table() {
        let report = generator(EffectiveSetVersion::V1_0)
            .generate(&inventory())
            .unwrap();
        assert!(report.e2e.is_none());
        assert!(report.cleanup.is_empty());
        assert!(report.mappings.runtime.is_empty());
        assert_eq!(
            report.mappings.deployment["acme-ns1"],
            "/environments/prod/env1/effective-set/ns1"
        );
        assert!(matches!(
            report.applications[0].streams,
            ApplicationStreams::V1(_)
        ));
    }
}
