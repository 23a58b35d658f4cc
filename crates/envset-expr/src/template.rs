//! Template engine
//!
//! The primary evaluator. Raw strings are first rewritten from the legacy
//! syntax into `<{ expr }>` placeholders and then rendered in strict
//! template semantics: unknown variables and filters are errors.

use envset_param::Parameter;

use crate::binding::Binding;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::parser::{parse, Dialect};
use crate::scan::{scan_template, translate_legacy, RawSegment};

/// Template engine over the `<{ expr }>` syntax
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Translate `raw` and render one evaluation pass
    pub fn render(&self, raw: &str, binding: &Binding<'_>) -> Result<String> {
        let translated = translate_legacy(raw)?;
        let evaluator = Evaluator::new(binding, Dialect::Template);
        let mut out = String::with_capacity(translated.len());
        for segment in scan_template(&translated)? {
            match segment {
                RawSegment::Text(text) => out.push_str(text),
                RawSegment::Expr(src) => {
                    let expr = parse(src, Dialect::Template)?;
                    let value = evaluator.eval(&expr)?;
                    out.push_str(&evaluator.render(&value));
                }
            }
        }
        Ok(out)
    }

    /// Evaluate a bare expression, keeping the type of the result
    pub fn evaluate(&self, expression: &str, binding: &Binding<'_>) -> Result<Parameter> {
        let expr = parse(expression, Dialect::Template)?;
        Evaluator::new(binding, Dialect::Template).eval(&expr)
    }
}
