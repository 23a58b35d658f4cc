//! Stream assembly

use envset_param::{origin, ParamMap, Parameter};

use crate::descriptor::{extract_per_service, merge_deploy_descriptor};
use crate::keys::{APP_CHART_NAME, DEPLOY_DESCRIPTOR, K8S_TOKEN};
use crate::layout::arrange_final;
use crate::partition::{extract_collisions, split_by_secure, StreamKind, StreamPair};
use crate::ssl::derive_ssl_parameters;

/// Assembled output of one application
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBundle {
    /// Deployment values and credentials, in output layout
    pub deploy: StreamPair,
    /// Top-level parameters that shadowed a service of the same name
    pub collisions: StreamPair,
    /// Per-service parameter block, when the application defines one
    pub per_service: Option<ParamMap>,
    /// Deploy descriptor tree, empty when the application has none
    pub deploy_descriptor: ParamMap,
    /// Application chart name, empty when unset
    pub app_chart_name: String,
    /// Runtime (technical configuration) parameters and credentials
    pub runtime: StreamPair,
}

impl ParameterBundle {
    /// Per-service mode: service maps carry their own `global` copy
    #[inline]
    #[must_use]
    pub fn is_per_service(&self) -> bool {
        self.per_service.is_some()
    }
}

/// Single-directory output of one application (v1.0 layout)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyBundle {
    /// Insecure deployment parameters
    pub deployment: ParamMap,
    /// Insecure technical configuration parameters
    pub technical: ParamMap,
    /// Secured parameters of both streams
    pub credentials: ParamMap,
}

/// Turns resolved parameter maps into output streams
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterAssembler;

impl ParameterAssembler {
    /// Create assembler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Assemble the deployment and runtime streams of one application.
    ///
    /// `k8s_token` is the credential token of the application's namespace.
    #[must_use]
    pub fn assemble_application(
        &self,
        mut deploy: ParamMap,
        technical: &ParamMap,
        k8s_token: Option<&str>,
    ) -> ParameterBundle {
        let mut bundle = ParameterBundle {
            runtime: split_by_secure(technical, StreamKind::Technical),
            ..ParameterBundle::default()
        };
        if deploy.is_empty() {
            tracing::debug!("no deployment parameters, deployment stream left empty");
            return bundle;
        }

        bundle.per_service = extract_per_service(&mut deploy);
        if deploy.contains_key(DEPLOY_DESCRIPTOR) {
            bundle.deploy_descriptor = merge_deploy_descriptor(&mut deploy);
        }

        let StreamPair {
            mut parameters,
            mut credentials,
        } = split_by_secure(&deploy, StreamKind::Deploy);

        bundle.app_chart_name = parameters
            .shift_remove(APP_CHART_NAME)
            .and_then(|p| p.value.scalar_text())
            .unwrap_or_default();

        bundle.collisions = StreamPair::new(
            extract_collisions(&mut parameters),
            extract_collisions(&mut credentials),
        );

        if let Some(token) = k8s_token {
            credentials.insert(K8S_TOKEN.to_string(), token_parameter(token));
        }
        derive_ssl_parameters(&mut parameters, &mut credentials);

        // Credentials always carry the per-service layout; values only with
        // a per-service block.
        bundle.deploy = StreamPair::new(
            arrange_final(parameters, bundle.is_per_service()),
            arrange_final(credentials, true),
        );
        bundle
    }

    /// Assemble the cleanup stream of one namespace
    #[must_use]
    pub fn assemble_cleanup(&self, cleanup: &ParamMap, k8s_token: Option<&str>) -> StreamPair {
        let mut pair = split_by_secure(cleanup, StreamKind::Cleanup);
        if let Some(token) = k8s_token {
            pair.credentials
                .insert(K8S_TOKEN.to_string(), token_parameter(token));
        }
        pair
    }

    /// Assemble the v1.0 layout of one application.
    ///
    /// Entities stay whole and nothing is regrouped; secured values of both
    /// streams share one credentials map, deployment values first.
    #[must_use]
    pub fn assemble_legacy(
        &self,
        deploy: &ParamMap,
        technical: &ParamMap,
        k8s_token: Option<&str>,
    ) -> LegacyBundle {
        let deploy = split_by_secure(deploy, StreamKind::Technical);
        let runtime = split_by_secure(technical, StreamKind::Technical);

        let mut credentials = deploy.credentials;
        for (key, value) in runtime.credentials {
            credentials.entry(key).or_insert(value);
        }
        if let Some(token) = k8s_token {
            credentials.insert(K8S_TOKEN.to_string(), token_parameter(token));
        }
        credentials.sort_keys();

        LegacyBundle {
            deployment: deploy.parameters,
            technical: runtime.parameters,
            credentials,
        }
    }

    /// Assemble the pipeline (end-to-end) stream
    #[must_use]
    pub fn assemble_e2e(&self, e2e: &ParamMap) -> StreamPair {
        split_by_secure(e2e, StreamKind::E2e)
    }
}

fn token_parameter(token: &str) -> Parameter {
    Parameter::new(token)
        .with_origin(origin::K8S_TOKEN)
        .with_secured(true)
}
