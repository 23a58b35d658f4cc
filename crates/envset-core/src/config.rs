//! Generator configuration

use std::fmt;
use std::str::FromStr;

use envset_param::{origin, Parameter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GenerationError;

/// Output layout version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EffectiveSetVersion {
    /// Deployment, technical and credential maps per application
    #[serde(rename = "v1.0")]
    V1_0,
    /// Split streams: deployment, runtime, cleanup, pipeline, topology
    #[default]
    #[serde(rename = "v2.0")]
    V2_0,
}

impl EffectiveSetVersion {
    /// Version label as written on the command line
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "v1.0",
            Self::V2_0 => "v2.0",
        }
    }
}

impl fmt::Display for EffectiveSetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectiveSetVersion {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "v1.0" => Ok(Self::V1_0),
            "v2.0" => Ok(Self::V2_0),
            other => Err(GenerationError::InvalidConfig(format!(
                "unsupported effective set version '{other}', expected v1.0 or v2.0"
            ))),
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Annotate written values with their origin
    pub enable_traceability: bool,
    /// Session id supplied with the pipeline invocation
    pub deployment_session_id: Option<String>,
    /// Size of the application worker pool
    pub worker_threads: usize,
    /// Output layout version
    pub effective_set_version: EffectiveSetVersion,
    /// Environment id used in mapping table paths; the cloud name when unset
    pub env_id: Option<String>,
}

impl GeneratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With origin annotations on or off
    #[inline]
    #[must_use]
    pub fn with_traceability(mut self, enabled: bool) -> Self {
        self.enable_traceability = enabled;
        self
    }

    /// With a pipeline-supplied deployment session id
    #[inline]
    #[must_use]
    pub fn with_deployment_session_id(mut self, id: impl Into<String>) -> Self {
        self.deployment_session_id = Some(id.into());
        self
    }

    /// With worker pool size; zero is raised to one
    #[inline]
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// With output layout version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: EffectiveSetVersion) -> Self {
        self.effective_set_version = version;
        self
    }

    /// With environment id for mapping table paths
    #[inline]
    #[must_use]
    pub fn with_env_id(mut self, env_id: impl Into<String>) -> Self {
        self.env_id = Some(env_id.into());
        self
    }

    /// Session id parameter shared by every application of one run.
    ///
    /// A supplied id keeps the pipeline origin; otherwise a fresh UUID is
    /// generated.
    #[must_use]
    pub fn session_parameter(&self) -> Parameter {
        match self
            .deployment_session_id
            .as_deref()
            .filter(|id| !id.is_empty())
        {
            Some(id) => Parameter::new(id).with_origin(origin::PIPELINE_PARAMETER),
            None => Parameter::new(Uuid::new_v4().to_string())
                .with_origin(origin::ENVGENE_CALCULATED),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enable_traceability: false,
            deployment_session_id: None,
            worker_threads: std::thread::available_parallelism().map_or(1, usize::from),
            effective_set_version: EffectiveSetVersion::default(),
            env_id: None,
        }
    }
}
