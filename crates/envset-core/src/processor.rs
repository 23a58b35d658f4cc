//! Scope stacking
//!
//! Builds the ordered layers of one stream and hands them to the expression
//! resolver. Layers go from broadest to narrowest; a narrower layer wins per
//! leaf:
//!
//! 1. calculated values
//! 2. SBOM fragments (deployment stream only)
//! 3. tenant
//! 4. cloud
//! 5. cloud-level application override
//! 6. namespace
//! 7. namespace-level application override

use envset_expr::ExpressionResolver;
use envset_param::{origin, stamp_origins, ParamMap, Parameter};

use crate::error::{GenerationError, Result};
use crate::inventory::{Application, Cloud, Namespace, ScopeParameters, Tenant};
use crate::sbom::SbomFragments;

/// Parameter group of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterGroup {
    /// `deployParameters`
    Deploy,
    /// `technicalConfigurationParameters`
    Technical,
    /// `e2eParameters`
    E2e,
}

impl ParameterGroup {
    /// Select this group from a scope
    #[inline]
    #[must_use]
    pub fn of(self, scope: &ScopeParameters) -> &ParamMap {
        match self {
            Self::Deploy => &scope.deploy_parameters,
            Self::Technical => &scope.technical_configuration_parameters,
            Self::E2e => &scope.e2e_parameters,
        }
    }
}

/// Resolved deployment and runtime maps of one application
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedApplication {
    /// Deployment parameters
    pub deploy: ParamMap,
    /// Runtime (technical configuration) parameters
    pub technical: ParamMap,
}

/// Namespace together with its inventory key
#[derive(Debug, Clone, Copy)]
pub struct NamespaceScope<'a> {
    /// Inventory key, used in output paths and origins
    pub key: &'a str,
    /// Namespace definition
    pub namespace: &'a Namespace,
}

impl NamespaceScope<'_> {
    /// Name of the namespace in the cluster
    #[inline]
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.namespace.name
    }
}

/// Stacks and resolves the scope layers of one environment
#[derive(Debug, Clone, Copy)]
pub struct ScopeProcessor<'a> {
    tenant: &'a Tenant,
    cloud: &'a Cloud,
    resolver: &'a ExpressionResolver,
    session: &'a Parameter,
}

impl<'a> ScopeProcessor<'a> {
    /// Processor for one tenant and cloud
    #[must_use]
    pub fn new(
        tenant: &'a Tenant,
        cloud: &'a Cloud,
        resolver: &'a ExpressionResolver,
        session: &'a Parameter,
    ) -> Self {
        Self {
            tenant,
            cloud,
            resolver,
            session,
        }
    }

    /// Resolve the deployment and runtime streams of `application`.
    ///
    /// The runtime stream may reference deployment values; they are bound as
    /// a fallback.
    ///
    /// # Errors
    /// Missing mandatory descriptor properties and strict-pass expression
    /// failures.
    pub fn process_application(
        &self,
        application: &Application,
        scope: NamespaceScope<'_>,
    ) -> Result<ResolvedApplication> {
        let sbom = SbomFragments::new(application, self.session).build()?;
        let calculated = self.calculated(Some(scope), Some(application));

        let mut deploy_layers = vec![calculated.clone(), sbom];
        deploy_layers.extend(self.scope_layers(
            ParameterGroup::Deploy,
            Some(scope),
            Some(application),
        ));
        let deploy = self
            .resolver
            .resolve_scopes(&deploy_layers, None)
            .map_err(|e| GenerationError::resolution(&application.name, scope.key, e))?;

        let mut technical_layers = vec![calculated];
        technical_layers.extend(self.scope_layers(
            ParameterGroup::Technical,
            Some(scope),
            Some(application),
        ));
        let technical = self
            .resolver
            .resolve_scopes(&technical_layers, Some(&deploy))
            .map_err(|e| GenerationError::resolution(&application.name, scope.key, e))?;

        tracing::debug!(
            "resolved {} deployment and {} runtime parameters for {}",
            deploy.len(),
            technical.len(),
            application.failure_key()
        );
        Ok(ResolvedApplication { deploy, technical })
    }

    /// Resolve the cleanup stream of one namespace
    ///
    /// # Errors
    /// Strict-pass expression failures.
    pub fn process_cleanup(&self, scope: NamespaceScope<'_>) -> Result<ParamMap> {
        let mut layers = vec![self.calculated(Some(scope), None)];
        layers.extend(self.scope_layers(ParameterGroup::Deploy, Some(scope), None));
        self.resolver
            .resolve_scopes(&layers, None)
            .map_err(|source| GenerationError::StreamResolution {
                stream: "cleanup",
                source,
            })
    }

    /// Resolve the pipeline stream from tenant and cloud
    ///
    /// # Errors
    /// Strict-pass expression failures.
    pub fn process_e2e(&self) -> Result<ParamMap> {
        let mut layers = vec![self.calculated(None, None)];
        layers.extend(self.scope_layers(ParameterGroup::E2e, None, None));
        self.resolver
            .resolve_scopes(&layers, None)
            .map_err(|source| GenerationError::StreamResolution {
                stream: "e2e",
                source,
            })
    }

    fn calculated(
        &self,
        scope: Option<NamespaceScope<'_>>,
        application: Option<&Application>,
    ) -> ParamMap {
        let mut layer = ParamMap::new();
        layer.insert("TENANTNAME".into(), Parameter::new(self.tenant.name.as_str()));
        layer.insert("CLOUDNAME".into(), Parameter::new(self.cloud.name.as_str()));
        if let Some(scope) = scope {
            layer.insert("NAMESPACE".into(), Parameter::new(scope.original_name()));
            layer.insert("ORIGIN_NAMESPACE".into(), Parameter::new(scope.original_name()));
        }
        if let Some(application) = application {
            layer.insert(
                "APPLICATION_NAME".into(),
                Parameter::new(application.name.as_str()),
            );
            layer.insert(
                "APPLICATION_VERSION".into(),
                Parameter::new(application.version.as_str()),
            );
        }
        stamp_origins(&mut layer, origin::ENVGENE_CALCULATED);
        layer
    }

    fn scope_layers(
        &self,
        group: ParameterGroup,
        scope: Option<NamespaceScope<'_>>,
        application: Option<&Application>,
    ) -> Vec<ParamMap> {
        let tenant = self.tenant.name.as_str();
        let cloud = self.cloud.name.as_str();
        let app_name = application.map(|a| a.name.as_str());

        let mut layers = vec![
            stamped(group.of(&self.tenant.parameters), &origin::tenant(tenant)),
            stamped(group.of(&self.cloud.parameters), &origin::cloud(tenant, cloud)),
        ];
        if let Some((name, overrides)) =
            app_name.and_then(|a| self.cloud.applications.get_key_value(a))
        {
            layers.push(stamped(group.of(overrides), &origin::cloud_application(name)));
        }
        if let Some(scope) = scope {
            layers.push(stamped(
                group.of(&scope.namespace.parameters),
                &origin::namespace(tenant, cloud, scope.key),
            ));
            if let Some((name, overrides)) =
                app_name.and_then(|a| scope.namespace.applications.get_key_value(a))
            {
                layers.push(stamped(group.of(overrides), &origin::application(name)));
            }
        }
        layers.retain(|layer| !layer.is_empty());
        layers
    }
}

fn stamped(params: &ParamMap, origin: &str) -> ParamMap {
    let mut layer = params.clone();
    stamp_origins(&mut layer, origin);
    layer
}
