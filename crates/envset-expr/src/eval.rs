//! Expression evaluation against a [`Binding`]

use envset_param::{ParamValue, Parameter, ValueKind};
use serde_json::Number;

use crate::binding::Binding;
use crate::error::{ExpressionError, Result};
use crate::markers::wrap_secure;
use crate::parser::{Dialect, Expr};

pub(crate) struct Evaluator<'b, 'a> {
    binding: &'b Binding<'a>,
    dialect: Dialect,
}

impl<'b, 'a> Evaluator<'b, 'a> {
    pub(crate) fn new(binding: &'b Binding<'a>, dialect: Dialect) -> Self {
        Self { binding, dialect }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Parameter> {
        match expr {
            Expr::Literal(value) => Ok(Parameter::new(value.clone())),
            Expr::Variable(name) => self
                .binding
                .lookup(name)
                .cloned()
                .ok_or_else(|| ExpressionError::unknown_variable(name)),
            Expr::Attr(target, key) => {
                let base = self.eval_followed(target)?;
                self.member(&base, key)
            }
            Expr::Index(target, index) => {
                let base = self.eval_followed(target)?;
                let index = self.eval(index)?;
                self.index(&base, &index)
            }
            Expr::Call { target, name, args }
                if name == "default" && self.dialect == Dialect::Template =>
            {
                self.default_filter(target, args)
            }
            Expr::Call { target, name, args } => {
                let base = self.eval_followed(target)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(&base, name, &args)
            }
            Expr::Concat(parts) => {
                let mut text = String::new();
                let mut secured = false;
                for part in parts {
                    let value = self.eval(part)?;
                    secured |= value.secured;
                    text.push_str(&self.text(&value));
                }
                Ok(Parameter::new(text).with_secured(secured))
            }
            Expr::Add(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.add(&left, &right)
            }
            Expr::Compare {
                left,
                right,
                negated,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let equal = left.value == right.value;
                Ok(Parameter::new(equal != *negated).with_secured(left.secured || right.secured))
            }
            Expr::Elvis(left, right) => {
                let left = self.eval(left)?;
                if truthy(&left.value) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?.value) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    /// Text placed into the surrounding string for an evaluated value
    pub(crate) fn render(&self, value: &Parameter) -> String {
        let text = self.text(value);
        if value.secured {
            wrap_secure(&text)
        } else {
            text
        }
    }

    fn eval_followed(&self, expr: &Expr) -> Result<Parameter> {
        let value = self.eval(expr)?;
        Ok(self.binding_target(value))
    }

    /// Resolve a string that only references another bound name
    fn binding_target(&self, value: Parameter) -> Parameter {
        let Some(name) = value
            .as_str()
            .and_then(|s| crate::markers::single_reference(s.trim()))
        else {
            return value;
        };
        match self.binding.lookup(name) {
            Some(target) => target.clone(),
            None => value,
        }
    }

    fn text(&self, value: &Parameter) -> String {
        match &value.value {
            ParamValue::Null => match self.dialect {
                Dialect::Template => String::new(),
                Dialect::Legacy => "null".to_string(),
            },
            ParamValue::Sequence(_) | ParamValue::Mapping(_) => value.to_json_string(),
            scalar => scalar.scalar_text().unwrap_or_default(),
        }
    }

    fn missing(&self, base: &Parameter, name: &str) -> Result<Parameter> {
        match self.dialect {
            Dialect::Template => Err(ExpressionError::unknown_variable(name)),
            Dialect::Legacy => Ok(Parameter::default().with_secured(base.secured)),
        }
    }

    fn member(&self, base: &Parameter, key: &str) -> Result<Parameter> {
        match &base.value {
            ParamValue::Mapping(map) => match map.get(key) {
                Some(found) => Ok(self.binding_target(found.clone())),
                None => self.missing(base, key),
            },
            other => Err(ExpressionError::type_mismatch(
                format!("property access '.{key}'"),
                other.kind(),
            )),
        }
    }

    fn index(&self, base: &Parameter, index: &Parameter) -> Result<Parameter> {
        match (&base.value, &index.value) {
            (ParamValue::Mapping(_), _) => self.member(base, &self.text(index)),
            (ParamValue::Sequence(items), ParamValue::Number(n)) => {
                let position = n
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| ExpressionError::type_mismatch("list index", index.value.kind()))?;
                match items.get(position) {
                    Some(found) => Ok(self.binding_target(found.clone())),
                    None => self.missing(base, &format!("[{position}]")),
                }
            }
            (ParamValue::Sequence(_), other) => {
                Err(ExpressionError::type_mismatch("list index", other.kind()))
            }
            (other, _) => Err(ExpressionError::type_mismatch("index access", other.kind())),
        }
    }

    fn default_filter(&self, target: &Expr, args: &[Expr]) -> Result<Parameter> {
        let fallback = || match args {
            [] => Ok(Parameter::new("")),
            [value] => self.eval(value),
            _ => Err(ExpressionError::Arity {
                function: "default".into(),
                expected: 1,
                found: args.len(),
            }),
        };
        match self.eval(target) {
            Ok(value) if !value.value.is_null() => Ok(value),
            Ok(_) | Err(ExpressionError::UnknownVariable(_)) => fallback(),
            Err(err) => Err(err),
        }
    }

    fn call(&self, base: &Parameter, name: &str, args: &[Parameter]) -> Result<Parameter> {
        let secured = base.secured || args.iter().any(|a| a.secured);
        let text = || self.text(base);
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ExpressionError::Arity {
                    function: name.to_string(),
                    expected,
                    found: args.len(),
                })
            }
        };

        let value = match (self.dialect, name) {
            (Dialect::Template, "lower") | (Dialect::Legacy, "toLowerCase") => {
                arity(0)?;
                ParamValue::String(text().to_lowercase())
            }
            (Dialect::Template, "upper") | (Dialect::Legacy, "toUpperCase") => {
                arity(0)?;
                ParamValue::String(text().to_uppercase())
            }
            (_, "trim") => {
                arity(0)?;
                ParamValue::String(text().trim().to_string())
            }
            (Dialect::Template, "length") | (Dialect::Legacy, "size" | "length") => {
                arity(0)?;
                let len = match &base.value {
                    ParamValue::Sequence(items) => items.len(),
                    ParamValue::Mapping(map) => map.len(),
                    _ => text().chars().count(),
                };
                ParamValue::Number(Number::from(len as u64))
            }
            (_, "replace") => {
                arity(2)?;
                ParamValue::String(text().replace(&self.text(&args[0]), &self.text(&args[1])))
            }
            (Dialect::Template, "secure") => {
                arity(0)?;
                let mut masked = base.clone();
                masked.secured = true;
                return Ok(masked);
            }
            (Dialect::Legacy, "toString") => {
                arity(0)?;
                ParamValue::String(text())
            }
            (Dialect::Legacy, "toInteger") => {
                arity(0)?;
                let parsed: i64 = text().trim().parse().map_err(|_| {
                    ExpressionError::type_mismatch("toInteger()", base.value.kind())
                })?;
                ParamValue::Number(Number::from(parsed))
            }
            (Dialect::Legacy, "contains") => {
                arity(1)?;
                let needle = &args[0];
                let found = match &base.value {
                    ParamValue::Sequence(items) => items.iter().any(|i| i.value == needle.value),
                    ParamValue::Mapping(map) => map.contains_key(&self.text(needle)),
                    _ => text().contains(&self.text(needle)),
                };
                ParamValue::Bool(found)
            }
            (Dialect::Legacy, "startsWith") => {
                arity(1)?;
                ParamValue::Bool(text().starts_with(&self.text(&args[0])))
            }
            (Dialect::Legacy, "endsWith") => {
                arity(1)?;
                ParamValue::Bool(text().ends_with(&self.text(&args[0])))
            }
            _ => return Err(ExpressionError::UnknownFunction(name.to_string())),
        };

        Ok(Parameter::new(value).with_secured(secured))
    }

    fn add(&self, left: &Parameter, right: &Parameter) -> Result<Parameter> {
        let secured = left.secured || right.secured;
        let value = match (&left.value, &right.value) {
            (ParamValue::Number(a), ParamValue::Number(b)) => add_numbers(a, b)
                .map(ParamValue::Number)
                .ok_or_else(|| ExpressionError::type_mismatch("'+'", ValueKind::Number))?,
            (ParamValue::String(_), _) | (_, ParamValue::String(_)) => {
                ParamValue::String(self.text(left) + &self.text(right))
            }
            (other, _) => return Err(ExpressionError::type_mismatch("'+'", other.kind())),
        };
        Ok(Parameter::new(value).with_secured(secured))
    }
}

fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_add(y).map(Number::from),
        _ => Number::from_f64(a.as_f64()? + b.as_f64()?),
    }
}

fn truthy(value: &ParamValue) -> bool {
    match value {
        ParamValue::Null => false,
        ParamValue::Bool(b) => *b,
        ParamValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        ParamValue::String(s) => !s.is_empty(),
        ParamValue::Sequence(items) => !items.is_empty(),
        ParamValue::Mapping(map) => !map.is_empty(),
    }
}
