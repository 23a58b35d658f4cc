//! Effective set directory layout
//!
//! Every stream of a [`GenerationReport`] is rendered through a
//! [`YamlRenderer`] and written under one output root. Empty streams still
//! produce an (empty) file so consumers can rely on the layout.

use std::fs;
use std::path::{Path, PathBuf};

use envset_core::{
    ApplicationOutput, ApplicationStreams, EffectiveSetVersion, GenerationReport, MappingTables,
};
use envset_param::ParamMap;
use envset_provenance::{ProvenanceError, YamlRenderer};
use thiserror::Error;

const MAPPING_FILE: &str = "mapping.yaml";
const PER_SERVICE_DIR: &str = "per-service-parameters";
const MAX_CHART_DIR_LEN: usize = 53;

/// Errors raised while writing the effective set
#[derive(Debug, Error)]
pub enum OutputError {
    /// A directory or file could not be written
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// A stream could not be rendered
    #[error(transparent)]
    Render(#[from] ProvenanceError),
}

impl OutputError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes a report below one output root
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
    renderer: YamlRenderer,
    written: usize,
}

impl OutputWriter {
    /// Writer for `root`, without origin comments
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            renderer: YamlRenderer::new(),
            written: 0,
        }
    }

    /// With origin comments on or off
    #[inline]
    #[must_use]
    pub fn with_traceability(mut self, enabled: bool) -> Self {
        self.renderer = self.renderer.with_traceability(enabled);
        self
    }

    /// Output root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every stream of `report`, returning the number of files written.
    ///
    /// # Errors
    /// [`OutputError`] on the first file that cannot be rendered or written.
    pub fn write(&mut self, report: &GenerationReport) -> Result<usize, OutputError> {
        self.written = 0;
        for app in &report.applications {
            match &app.streams {
                ApplicationStreams::V2(_) => self.write_application(app)?,
                ApplicationStreams::V1(_) => self.write_legacy_application(app)?,
            }
        }

        if report.version == EffectiveSetVersion::V1_0 {
            let table = MappingTables::to_params(&report.mappings.deployment);
            self.write_file(&[], MAPPING_FILE, &table)?;
            return Ok(self.written);
        }

        for (namespace, streams) in &report.cleanup {
            let dir = ["cleanup", namespace.as_str()];
            self.write_file(&dir, "parameters.yaml", &streams.parameters)?;
            self.write_file(&dir, "credentials.yaml", &streams.credentials)?;
        }
        if let Some(e2e) = &report.e2e {
            self.write_file(&["pipeline"], "parameters.yaml", &e2e.parameters)?;
            self.write_file(&["pipeline"], "credentials.yaml", &e2e.credentials)?;
        }
        for consumer in &report.pipeline {
            self.write_file(
                &["pipeline"],
                &format!("{}-parameters.yaml", consumer.name),
                &consumer.streams.parameters,
            )?;
            self.write_file(
                &["pipeline"],
                &format!("{}-credentials.yaml", consumer.name),
                &consumer.streams.credentials,
            )?;
        }
        if let Some(topology) = &report.topology {
            self.write_file(&["topology"], "parameters.yaml", &topology.parameters)?;
            self.write_file(&["topology"], "credentials.yaml", &topology.credentials)?;
        }

        let tables = [
            ("deployment", &report.mappings.deployment),
            ("runtime", &report.mappings.runtime),
            ("cleanup", &report.mappings.cleanup),
        ];
        for (stream, table) in tables {
            self.write_file(&[stream], MAPPING_FILE, &MappingTables::to_params(table))?;
        }
        Ok(self.written)
    }

    fn write_application(&mut self, app: &ApplicationOutput) -> Result<(), OutputError> {
        let Some(bundle) = app.bundle() else {
            return Ok(());
        };
        let values = ["deployment", app.namespace.as_str(), app.name.as_str(), "values"];
        self.write_file(&values, "deployment-parameters.yaml", &bundle.deploy.parameters)?;
        self.write_file(&values, "credentials.yaml", &bundle.deploy.credentials)?;
        self.write_file(
            &values,
            "collision-deployment-parameters.yaml",
            &bundle.collisions.parameters,
        )?;
        self.write_file(
            &values,
            "collision-credentials.yaml",
            &bundle.collisions.credentials,
        )?;
        self.write_file(&values, "deploy-descriptor.yaml", &bundle.deploy_descriptor)?;

        let per_service = bundle.per_service.clone().unwrap_or_default();
        if !bundle.app_chart_name.is_empty() {
            let chart = chart_dir_name(&bundle.app_chart_name, &app.original_namespace);
            let mut dir = values.to_vec();
            dir.extend([PER_SERVICE_DIR, chart.as_str()]);
            self.write_file(&dir, "deployment-parameters.yaml", &per_service)?;
        } else {
            for (service, params) in &per_service {
                let Some(params) = params.as_mapping() else {
                    tracing::debug!("per-service entry '{}' is not a mapping, skipped", service);
                    continue;
                };
                let mut dir = values.to_vec();
                dir.extend([PER_SERVICE_DIR, service.as_str()]);
                self.write_file(&dir, "deployment-parameters.yaml", params)?;
            }
        }

        let runtime = ["runtime", app.namespace.as_str(), app.name.as_str()];
        self.write_file(&runtime, "parameters.yaml", &bundle.runtime.parameters)?;
        self.write_file(&runtime, "credentials.yaml", &bundle.runtime.credentials)?;
        Ok(())
    }

    fn write_legacy_application(&mut self, app: &ApplicationOutput) -> Result<(), OutputError> {
        let ApplicationStreams::V1(bundle) = &app.streams else {
            return Ok(());
        };
        let dir = [app.namespace.as_str(), app.name.as_str()];
        self.write_file(&dir, "deployment-parameters.yaml", &bundle.deployment)?;
        self.write_file(
            &dir,
            "technical-configuration-parameters.yaml",
            &bundle.technical,
        )?;
        self.write_file(&dir, "credentials.yaml", &bundle.credentials)?;
        Ok(())
    }

    fn write_file(
        &mut self,
        dir: &[&str],
        file_name: &str,
        params: &ParamMap,
    ) -> Result<(), OutputError> {
        let dir = dir.iter().fold(self.root.clone(), |path, part| path.join(part));
        fs::create_dir_all(&dir).map_err(|e| OutputError::io(&dir, e))?;

        let text = self.renderer.render(params, file_name)?;
        let path = dir.join(file_name);
        fs::write(&path, text).map_err(|e| OutputError::io(&path, e))?;
        tracing::debug!("wrote {}", path.display());
        self.written += 1;
        Ok(())
    }
}

/// Directory name for an application chart.
///
/// Lowercase alphanumerics and `-` only, without leading or trailing `-`,
/// short enough to leave room for a namespace suffix in release names.
/// Falls back to `namespace` when nothing usable is left.
#[must_use]
pub fn chart_dir_name(chart: &str, namespace: &str) -> String {
    let mapped: String = chart
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() { c } else { '-' }
        })
        .collect();
    let mut name = mapped.trim_matches('-').to_string();
    name.truncate(MAX_CHART_DIR_LEN);
    let name = name.trim_end_matches('-');
    if name.is_empty() {
        namespace.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_names_are_normalized() {
        assert_eq!(chart_dir_name("Billing_Chart", "ns"), "billing-chart");
        assert_eq!(chart_dir_name("--api--", "ns"), "api");
        assert_eq!(chart_dir_name("___", "acme-ns1"), "acme-ns1");
        assert_eq!(chart_dir_name(&"a".repeat(80), "ns").len(), MAX_CHART_DIR_LEN);
    }

    #[test]
    fn io_error_names_path() {
        let err = OutputError::io(
            Path::new("/out/x.yaml"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to write /out/x.yaml: denied");
    }
}
