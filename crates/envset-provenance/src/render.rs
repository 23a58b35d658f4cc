//! Parameter files as YAML text

use envset_param::ParamMap;

use crate::annotate::annotate;
use crate::error::{ProvenanceError, Result};
use crate::origins::OriginMap;

/// Files written without origin comments
pub const EXCLUDED_FILES: [&str; 1] = ["mapping.yaml"];

/// Check whether `file_name` is never annotated
#[inline]
#[must_use]
pub fn is_excluded(file_name: &str) -> bool {
    EXCLUDED_FILES.contains(&file_name)
}

/// Serializes parameter maps, optionally with origin comments
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRenderer {
    traceability: bool,
}

impl YamlRenderer {
    /// Renderer without origin comments
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable origin comments
    #[inline]
    #[must_use]
    pub fn with_traceability(mut self, enabled: bool) -> Self {
        self.traceability = enabled;
        self
    }

    /// Origin comments are enabled
    #[inline]
    #[must_use]
    pub fn traceability(&self) -> bool {
        self.traceability
    }

    /// Render `params` as the content of `file_name`.
    ///
    /// An empty map renders as an empty file.
    ///
    /// # Errors
    /// [`ProvenanceError::Serialize`] when the tree cannot be serialized.
    pub fn render(&self, params: &ParamMap, file_name: &str) -> Result<String> {
        if params.is_empty() {
            return Ok(String::new());
        }
        let text =
            serde_yaml::to_string(params).map_err(|e| ProvenanceError::serialize(file_name, e))?;
        if !self.traceability || is_excluded(file_name) {
            return Ok(text);
        }

        let origins = OriginMap::collect(params);
        tracing::debug!("annotating {} with {} origins", file_name, origins.len());
        Ok(annotate(&text, &origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envset_param::Parameter;

    fn params() -> ParamMap {
        let mut map = ParamMap::new();
        map.insert(
            "REGION".into(),
            Parameter::new("eu").with_origin("Env/Tenant: acme"),
        );
        map
    }

    #[test]
    fn traceability_adds_comments() {
        let text = YamlRenderer::new()
            .with_traceability(true)
            .render(&params(), "credentials.yaml")
            .unwrap();
        assert_eq!(text, "REGION: eu # tenant: acme\n");
    }

    #[test]
    fn plain_without_traceability() {
        let text = YamlRenderer::new()
            .render(&params(), "credentials.yaml")
            .unwrap();
        assert_eq!(text, "REGION: eu\n");
    }

    #[test]
    fn mapping_file_is_never_annotated() {
        let text = YamlRenderer::new()
            .with_traceability(true)
            .render(&params(), "mapping.yaml")
            .unwrap();
        assert_eq!(text, "REGION: eu\n");
    }

    #[test]
    fn empty_map_is_empty_file() {
        let text = YamlRenderer::new()
            .with_traceability(true)
            .render(&ParamMap::new(), "parameters.yaml")
            .unwrap();
        assert!(text.is_empty());
    }
}
