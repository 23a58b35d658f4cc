//! Parameter resolution
//!
//! Single entry point for turning raw parameters into resolved ones. The
//! caller picks a [`ResolutionMode`] per call:
//!
//! - [`ResolutionMode::Permissive`]: failures become invalid markers that
//!   keep the raw value, escapes are kept
//! - [`ResolutionMode::Strict`]: failures are errors naming the parameter,
//!   escapes are reversed

use envset_param::{MergeMap, ParamMap, ParamPath, ParamValue, Parameter};

use crate::binding::Binding;
use crate::cache::TemplateCache;
use crate::error::{ExpressionError, Result};
use crate::legacy::LegacyEngine;
use crate::markers::{has_placeholder, single_reference, strip_secure, unescape, MAX_NESTING};
use crate::template::TemplateEngine;

const UNSUPPORTED_CREDENTIAL_LOOKUP: &str = "cmdb.creds[";

/// How resolution failures and escapes are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Per-scope pass: keep going, mark failures invalid
    #[default]
    Permissive,
    /// Final pass: fail on the first unresolvable parameter
    Strict,
}

impl ResolutionMode {
    /// Check for strict mode
    #[inline]
    #[must_use]
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

#[derive(Debug, Clone, Copy)]
enum Engine {
    Template,
    Legacy,
}

/// Resolves expressions inside parameters
#[derive(Debug, Clone, Default)]
pub struct ExpressionResolver {
    template: TemplateEngine,
    legacy: LegacyEngine,
}

impl ExpressionResolver {
    /// Resolver using the process-wide template cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver compiling legacy templates into `cache`
    #[must_use]
    pub fn with_cache(cache: TemplateCache) -> Self {
        Self {
            template: TemplateEngine::new(),
            legacy: LegacyEngine::with_cache(cache),
        }
    }

    /// Resolve every entry of `map`.
    ///
    /// # Errors
    /// In strict mode, the first parameter that cannot be resolved.
    pub fn resolve_map(
        &self,
        map: &ParamMap,
        binding: &Binding<'_>,
        mode: ResolutionMode,
    ) -> Result<ParamMap> {
        self.resolve_entries(&ParamPath::root(), map, binding, mode, 0)
    }

    /// Resolve one named parameter with map-entry semantics
    pub fn resolve_value(
        &self,
        key: &str,
        value: &Parameter,
        binding: &Binding<'_>,
        mode: ResolutionMode,
    ) -> Result<Parameter> {
        self.resolve_entry(&ParamPath::single(key), value, binding, mode, 0)
    }

    /// Render a standalone string and strip secure sentinels.
    ///
    /// Returns the text and whether any secured value was substituted.
    pub fn render_text(&self, raw: &str, binding: &Binding<'_>) -> Result<(String, bool)> {
        let rendered = self.render(raw, binding)?;
        Ok(strip_secure(&rendered))
    }

    /// Stack scope layers from broadest to narrowest.
    ///
    /// Each layer is resolved permissively against the raw overlay of all
    /// layers, so a narrower override is seen by broader references, then
    /// overlaid.
    pub fn overlay_scopes<'l, I>(&self, layers: I, fallback: Option<&ParamMap>) -> Result<MergeMap>
    where
        I: IntoIterator<Item = &'l ParamMap>,
    {
        let layers: Vec<&ParamMap> = layers.into_iter().collect();
        let stack = layers
            .iter()
            .fold(MergeMap::new(), |stack, layer| stack.merged_with(layer));
        let mut binding = Binding::new(stack.as_map());
        if let Some(fallback) = fallback {
            binding = binding.with_fallback(fallback);
        }

        let mut merged = MergeMap::new();
        for layer in layers {
            let resolved = self.resolve_map(layer, &binding, ResolutionMode::Permissive)?;
            merged.overlay_all(resolved);
        }
        Ok(merged)
    }

    /// Strict pass over a fully merged map, resolved against itself
    pub fn finalize(&self, merged: &MergeMap, fallback: Option<&ParamMap>) -> Result<ParamMap> {
        let mut binding = Binding::from(merged);
        if let Some(fallback) = fallback {
            binding = binding.with_fallback(fallback);
        }
        self.resolve_map(merged.as_map(), &binding, ResolutionMode::Strict)
    }

    /// [`overlay_scopes`](Self::overlay_scopes) followed by [`finalize`](Self::finalize)
    pub fn resolve_scopes<'l, I>(&self, layers: I, fallback: Option<&ParamMap>) -> Result<ParamMap>
    where
        I: IntoIterator<Item = &'l ParamMap>,
    {
        let merged = self.overlay_scopes(layers, fallback)?;
        self.finalize(&merged, fallback)
    }

    fn resolve_entries(
        &self,
        path: &ParamPath,
        map: &ParamMap,
        binding: &Binding<'_>,
        mode: ResolutionMode,
        depth: usize,
    ) -> Result<ParamMap> {
        map.iter()
            .map(|(key, param)| {
                let resolved = self.resolve_entry(&path.child(key), param, binding, mode, depth)?;
                Ok((key.clone(), resolved))
            })
            .collect()
    }

    fn resolve_entry(
        &self,
        path: &ParamPath,
        param: &Parameter,
        binding: &Binding<'_>,
        mode: ResolutionMode,
        depth: usize,
    ) -> Result<Parameter> {
        match (self.resolve_at(path, param, binding, mode, depth), mode) {
            (Ok(resolved), ResolutionMode::Permissive) if resolved.is_null_like() => {
                Ok(Parameter::invalid(param))
            }
            (Ok(resolved), _) => Ok(resolved),
            (Err(err), ResolutionMode::Permissive) => {
                tracing::debug!("deferring parameter {}: {}", path, err);
                Ok(Parameter::invalid(param))
            }
            (Err(err), ResolutionMode::Strict) => Err(strict_failure(path, param, err)),
        }
    }

    fn resolve_at(
        &self,
        path: &ParamPath,
        param: &Parameter,
        binding: &Binding<'_>,
        mode: ResolutionMode,
        depth: usize,
    ) -> Result<Parameter> {
        if depth > MAX_NESTING {
            return Err(ExpressionError::NestingExceeded {
                value: param.to_string(),
                attempts: MAX_NESTING,
            });
        }

        if param.processed {
            return Ok(match (&param.value, mode) {
                (ParamValue::String(text), ResolutionMode::Strict) => Parameter {
                    value: ParamValue::String(unescape(text)),
                    ..param.clone()
                },
                _ => param.clone(),
            });
        }

        match &param.value {
            ParamValue::String(text) => {
                if let Some(typed) = self.preserve_type(path, param, text, binding, mode, depth)? {
                    return Ok(typed);
                }
                let rendered = self.render(text, binding)?;
                Ok(finish_string(param, &rendered, mode))
            }
            ParamValue::Sequence(items) => {
                let resolved = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.resolve_entry(&path.index(i), item, binding, mode, depth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(rewrap(param, ParamValue::Sequence(resolved)))
            }
            ParamValue::Mapping(map) => {
                let resolved = self.resolve_entries(path, map, binding, mode, depth)?;
                Ok(rewrap(param, ParamValue::Mapping(resolved)))
            }
            scalar => Ok(rewrap(param, scalar.clone())),
        }
    }

    /// Typed substitution for values that are a single reference.
    ///
    /// Returns `None` when the value must go through string rendering.
    fn preserve_type(
        &self,
        path: &ParamPath,
        param: &Parameter,
        text: &str,
        binding: &Binding<'_>,
        mode: ResolutionMode,
        depth: usize,
    ) -> Result<Option<Parameter>> {
        let Some(name) = single_reference(text.trim()).filter(|name| binding.contains(name)) else {
            return Ok(None);
        };
        let Ok(target) = self.template.evaluate(name, binding) else {
            return Ok(None);
        };
        if !target.valid {
            return Ok(None);
        }

        let typed = Parameter {
            value: target.value.clone(),
            origin: param.origin.clone(),
            secured: target.secured,
            processed: false,
            parsed: true,
            valid: true,
        };
        match &target.value {
            ParamValue::Bool(_) | ParamValue::Number(_) => Ok(Some(Parameter {
                processed: true,
                ..typed
            })),
            ParamValue::Sequence(_) | ParamValue::Mapping(_) => self
                .resolve_at(path, &typed, binding, mode, depth + 1)
                .map(Some),
            ParamValue::Null | ParamValue::String(_) => Ok(None),
        }
    }

    /// Evaluate until no placeholders remain, falling back to the legacy
    /// engine on the original text when the template engine fails.
    fn render(&self, raw: &str, binding: &Binding<'_>) -> Result<String> {
        match self.render_with(Engine::Template, raw, binding) {
            Ok(rendered) => Ok(rendered),
            Err(template) => {
                tracing::debug!(
                    "template engine failed on '{}': {}; retrying with legacy engine",
                    raw,
                    template
                );
                self.render_with(Engine::Legacy, raw, binding)
                    .map_err(|legacy| ExpressionError::EnginesFailed {
                        template: Box::new(template),
                        legacy: Box::new(legacy),
                    })
            }
        }
    }

    fn render_with(&self, engine: Engine, raw: &str, binding: &Binding<'_>) -> Result<String> {
        let mut rendered = raw.to_string();
        let mut attempts = 0;
        while has_placeholder(&rendered) {
            if attempts == MAX_NESTING {
                return Err(ExpressionError::NestingExceeded {
                    value: raw.to_string(),
                    attempts,
                });
            }
            attempts += 1;
            rendered = match engine {
                Engine::Template => self.template.render(&rendered, binding)?,
                Engine::Legacy => self.legacy.render(&rendered, binding)?,
            };
        }
        Ok(rendered)
    }
}

fn rewrap(param: &Parameter, value: ParamValue) -> Parameter {
    Parameter {
        value,
        origin: param.origin.clone(),
        secured: param.secured,
        processed: false,
        parsed: true,
        valid: true,
    }
}

fn finish_string(param: &Parameter, rendered: &str, mode: ResolutionMode) -> Parameter {
    let (text, masked) = strip_secure(rendered);
    let text = if mode.is_strict() { unescape(&text) } else { text };
    Parameter {
        value: ParamValue::String(text),
        origin: param.origin.clone(),
        secured: param.secured || masked,
        processed: true,
        parsed: true,
        valid: true,
    }
}

fn strict_failure(path: &ParamPath, param: &Parameter, err: ExpressionError) -> ExpressionError {
    if err.is_parameter_failure() {
        return err;
    }
    let value = param.to_string();
    if value.contains(UNSUPPORTED_CREDENTIAL_LOOKUP) {
        return ExpressionError::UnsupportedExpression {
            key: path.to_string(),
            value,
        };
    }
    ExpressionError::Unresolved {
        key: path.to_string(),
        value,
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(entries: &[(&str, Parameter)]) -> ParamMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn resolver() -> ExpressionResolver {
        ExpressionResolver::with_cache(TemplateCache::new(64))
    }

    #[test]
    fn processed_values_only_get_unescaped() {
        let map = params(&[(
            "A",
            Parameter::new("\\$X ${Y}").resolved(),
        )]);
        let binding = Binding::new(&map);
        let strict = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap();
        assert_eq!(strict["A"].as_str(), Some("$X ${Y}"));

        let permissive = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Permissive)
            .unwrap();
        assert_eq!(permissive["A"].as_str(), Some("\\$X ${Y}"));
    }

    #[test]
    fn permissive_marks_failures_invalid() {
        let map = params(&[
            ("A", Parameter::new("${MISSING}").with_origin("Env/Tenant: t")),
            ("N", Parameter::new("null")),
        ]);
        let binding = Binding::new(&map);
        let out = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Permissive)
            .unwrap();
        assert!(!out["A"].valid);
        assert_eq!(out["A"].as_str(), Some("${MISSING}"));
        assert_eq!(out["A"].origin(), Some("Env/Tenant: t"));
        assert!(!out["N"].valid);
    }

    #[test]
    fn strict_names_key_and_value() {
        let map = params(&[("A", Parameter::new("x-${MISSING}"))]);
        let binding = Binding::new(&map);
        let err = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap_err();
        match err {
            ExpressionError::Unresolved { key, value, .. } => {
                assert_eq!(key, "A");
                assert_eq!(value, "x-${MISSING}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn strict_reports_nested_paths() {
        let mut inner = ParamMap::new();
        inner.insert(
            "list".into(),
            Parameter::new(vec![Parameter::new("ok"), Parameter::new("$NOPE")]),
        );
        let map = params(&[("svc", Parameter::new(inner))]);
        let binding = Binding::new(&map);
        let err = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap_err();
        let ExpressionError::Unresolved { key, .. } = err else {
            panic!("expected unresolved");
        };
        assert_eq!(key, "svc.list[1]");
    }

    #[test]
    fn credential_lookup_is_unsupported() {
        let map = params(&[("PASS", Parameter::new("${cmdb.creds['db'].password}"))]);
        let binding = Binding::new(&map);
        let err = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap_err();
        assert!(matches!(err, ExpressionError::UnsupportedExpression { .. }));
    }

    #[test]
    fn container_references_resolve_elementwise() {
        let mut db = ParamMap::new();
        db.insert("url".into(), Parameter::new("jdbc://${HOST}"));
        let map = params(&[
            ("HOST", Parameter::new("db")),
            ("DB", Parameter::new(db)),
            ("COPY", Parameter::new("${DB}")),
        ]);
        let binding = Binding::new(&map);
        let out = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap();
        let copy = out["COPY"].as_mapping().unwrap();
        assert_eq!(copy["url"].as_str(), Some("jdbc://db"));
    }

    #[test]
    fn self_referencing_container_hits_nesting_bound() {
        let mut looped = ParamMap::new();
        looped.insert("me".into(), Parameter::new("$M"));
        let map = params(&[("M", Parameter::new(looped))]);
        let binding = Binding::new(&map);
        let err = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap_err();
        assert!(err.is_nesting_exceeded());
    }

    #[test]
    fn legacy_fallback_handles_legacy_operators() {
        let map = params(&[
            ("NAME", Parameter::new("api")),
            ("URL", Parameter::new("${NAME.toUpperCase() + '-svc'}")),
        ]);
        let binding = Binding::new(&map);
        let out = resolver()
            .resolve_map(&map, &binding, ResolutionMode::Strict)
            .unwrap();
        assert_eq!(out["URL"].as_str(), Some("API-svc"));
    }

    #[test]
    fn both_engines_failing_reports_both() {
        let map = params(&[("A", Parameter::new("${1 +}"))]);
        let binding = Binding::new(&map);
        let err = resolver()
            .resolve_value("A", &map["A"], &binding, ResolutionMode::Strict)
            .unwrap_err();
        let ExpressionError::Unresolved { source, .. } = err else {
            panic!("expected unresolved");
        };
        assert!(matches!(*source, ExpressionError::EnginesFailed { .. }));
    }

    #[test]
    fn scope_overlay_sees_narrower_layers() {
        let tenant = params(&[
            ("URL", Parameter::new("http://${HOST}")),
            ("LATER", Parameter::new("${MISSING}")),
        ]);
        let namespace = params(&[("HOST", Parameter::new("ns.local"))]);
        let r = resolver();

        let merged = r.overlay_scopes([&tenant, &namespace], None).unwrap();
        assert_eq!(merged.get("URL").unwrap().as_str(), Some("http://ns.local"));
        assert!(merged.get("URL").unwrap().valid);
        assert!(!merged.get("LATER").unwrap().valid);

        let err = r.finalize(&merged, None).unwrap_err();
        assert!(matches!(err, ExpressionError::Unresolved { ref key, .. } if key == "LATER"));
    }

    #[test]
    fn fallback_binding_is_consulted() {
        let deploy = params(&[("HOST", Parameter::new("api"))]);
        let technical = params(&[("ENDPOINT", Parameter::new("${HOST}:80"))]);
        let out = resolver()
            .resolve_scopes([&technical], Some(&deploy))
            .unwrap();
        assert_eq!(out["ENDPOINT"].as_str(), Some("api:80"));
        assert!(!out.contains_key("HOST"));
    }

    #[test]
    fn render_text_reports_secured_substitution() {
        let map = params(&[("PASS", Parameter::new("pw").with_secured(true))]);
        let (text, secured) = resolver()
            .render_text("p=${PASS}", &Binding::new(&map))
            .unwrap();
        assert_eq!(text, "p=pw");
        assert!(secured);
    }
}
