//! Legacy interpolation engine
//!
//! Evaluates `${expr}`, `$path` and `<% expr %>` placeholders directly on
//! the original string. Used as the fallback when the template engine
//! rejects a value.

use std::sync::Arc;

use crate::binding::Binding;
use crate::cache::TemplateCache;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::parser::{parse, Dialect, Expr};
use crate::scan::{scan_legacy, RawSegment};

#[derive(Debug)]
enum CompiledSegment {
    Text(String),
    Expr(Expr),
}

/// A legacy template parsed into literal text and expressions
#[derive(Debug)]
pub struct CompiledTemplate {
    segments: Vec<CompiledSegment>,
}

impl CompiledTemplate {
    /// Render one evaluation pass
    pub fn render(&self, binding: &Binding<'_>) -> Result<String> {
        let evaluator = Evaluator::new(binding, Dialect::Legacy);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                CompiledSegment::Text(text) => out.push_str(text),
                CompiledSegment::Expr(expr) => {
                    let value = evaluator.eval(expr)?;
                    out.push_str(&evaluator.render(&value));
                }
            }
        }
        Ok(out)
    }

    /// True when the template holds no placeholders
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, CompiledSegment::Text(_)))
    }
}

/// Legacy engine backed by a compiled-template cache
#[derive(Debug, Clone)]
pub struct LegacyEngine {
    cache: TemplateCache,
}

impl LegacyEngine {
    /// Engine using the process-wide cache
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache(TemplateCache::shared().clone())
    }

    /// Engine using a dedicated cache
    #[inline]
    #[must_use]
    pub fn with_cache(cache: TemplateCache) -> Self {
        Self { cache }
    }

    /// Compile a source string without caching
    pub fn compile(source: &str) -> Result<CompiledTemplate> {
        let segments = scan_legacy(source)?
            .into_iter()
            .map(|segment| match segment {
                RawSegment::Text(text) => Ok(CompiledSegment::Text(text.to_string())),
                RawSegment::Expr(expr) => parse(expr, Dialect::Legacy).map(CompiledSegment::Expr),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledTemplate { segments })
    }

    /// Compile (or fetch) and render one evaluation pass
    pub fn render(&self, source: &str, binding: &Binding<'_>) -> Result<String> {
        let template: Arc<CompiledTemplate> = self.cache.get_or_compile(source, Self::compile)?;
        template.render(binding)
    }
}

impl Default for LegacyEngine {
    fn default() -> Self {
        Self::new()
    }
}
