//! Parameter value model
//!
//! A [`Parameter`] wraps one configuration value together with the metadata
//! the generator tracks for it: where the value came from, whether it is a
//! secret and how far resolution got.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Ordered map of parameter names to parameters.
pub type ParamMap = IndexMap<String, Parameter>;

/// The value carried by a [`Parameter`].
///
/// Containers always hold `Parameter`s, so every nested value keeps its own
/// origin and flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamValue {
    /// Absent value
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Integer or floating point scalar
    Number(Number),
    /// String scalar, possibly containing expressions
    String(String),
    /// Ordered list of parameters
    Sequence(Vec<Parameter>),
    /// Ordered map of parameters
    Mapping(ParamMap),
}

/// Discriminant of a [`ParamValue`], used for merge decisions and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Numeric scalar
    Number,
    /// String scalar
    String,
    /// List
    Sequence,
    /// Map
    Mapping,
}

impl ValueKind {
    /// Lowercase name of the kind
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ParamValue {
    /// Kind of this value
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Sequence(_) => ValueKind::Sequence,
            Self::Mapping(_) => ValueKind::Mapping,
        }
    }

    /// Check for `null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check for a list or map
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Mapping(_))
    }

    /// String contents, if this is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric contents, if this is a number
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Map contents, if this is a map
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&ParamMap> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable map contents, if this is a map
    #[inline]
    pub fn as_mapping_mut(&mut self) -> Option<&mut ParamMap> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// List contents, if this is a list
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Parameter]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Text form of a scalar value.
    ///
    /// Returns `None` for `null` and for containers.
    #[must_use]
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Null | Self::Sequence(_) | Self::Mapping(_) => None,
        }
    }
}

/// One configuration value with provenance and resolution metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// The value itself
    pub value: ParamValue,
    /// Free-text description of the scope or source that produced the value
    pub origin: Option<String>,
    /// Value must be written to the secured stream
    pub secured: bool,
    /// Expression resolution already ran on this value
    pub processed: bool,
    /// Value went through the expression parser
    pub parsed: bool,
    /// `false` when resolution failed; the raw value is kept for reporting
    pub valid: bool,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            value: ParamValue::Null,
            origin: None,
            secured: false,
            processed: false,
            parsed: false,
            valid: true,
        }
    }
}

impl Parameter {
    /// Create an unprocessed parameter without origin
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<ParamValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Set the origin
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the secured flag
    #[inline]
    #[must_use]
    pub fn with_secured(mut self, secured: bool) -> Self {
        self.secured = secured;
        self
    }

    /// Mark the value as fully resolved
    #[inline]
    #[must_use]
    pub fn resolved(mut self) -> Self {
        self.processed = true;
        self.parsed = true;
        self.valid = true;
        self
    }

    /// Invalid marker for a value whose resolution failed.
    ///
    /// Keeps the raw value and metadata so a later pass can retry it.
    #[must_use]
    pub fn invalid(raw: &Parameter) -> Self {
        Self {
            processed: false,
            parsed: true,
            valid: false,
            ..raw.clone()
        }
    }

    /// Origin text, if any
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// String contents, if the value is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Map contents, if the value is a map
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&ParamMap> {
        self.value.as_mapping()
    }

    /// Consume into map contents, if the value is a map
    #[must_use]
    pub fn into_mapping(self) -> Option<ParamMap> {
        match self.value {
            ParamValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// `null`, or the literal string `"null"`
    #[must_use]
    pub fn is_null_like(&self) -> bool {
        match &self.value {
            ParamValue::Null => true,
            ParamValue::String(s) => s == "null",
            _ => false,
        }
    }

    /// Set `origin` on this parameter and every nested parameter that has none.
    pub fn stamp_origin(&mut self, origin: &str) {
        if self.origin.is_none() {
            self.origin = Some(origin.to_string());
        }
        match &mut self.value {
            ParamValue::Sequence(items) => {
                for item in items {
                    item.stamp_origin(origin);
                }
            }
            ParamValue::Mapping(map) => {
                for item in map.values_mut() {
                    item.stamp_origin(origin);
                }
            }
            _ => {}
        }
    }

    /// Set `secured` on this parameter and every nested parameter.
    pub fn mark_secured(&mut self) {
        self.secured = true;
        match &mut self.value {
            ParamValue::Sequence(items) => items.iter_mut().for_each(Parameter::mark_secured),
            ParamValue::Mapping(map) => map.values_mut().for_each(Parameter::mark_secured),
            _ => {}
        }
    }

    /// Compact JSON rendering of the plain value (metadata dropped)
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.value).unwrap_or_default()
    }
}

/// Stamp `origin` onto every parameter of a map that has none.
pub fn stamp_origins(map: &mut ParamMap, origin: &str) {
    for param in map.values_mut() {
        param.stamp_origin(origin);
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.value.scalar_text() {
            Some(text) => f.write_str(&text),
            None if self.value.is_null() => f.write_str("null"),
            None => f.write_str(&self.to_json_string()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from($v: $ty) -> Self {
                    $body
                }
            }

            impl From<$ty> for Parameter {
                fn from(value: $ty) -> Self {
                    Parameter::new(ParamValue::from(value))
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => |v| ParamValue::Bool(v),
    i32 => |v| ParamValue::Number(Number::from(v)),
    i64 => |v| ParamValue::Number(Number::from(v)),
    u32 => |v| ParamValue::Number(Number::from(v)),
    u64 => |v| ParamValue::Number(Number::from(v)),
    f64 => |v| Number::from_f64(v).map_or(ParamValue::Null, ParamValue::Number),
    &str => |v| ParamValue::String(v.to_string()),
    String => |v| ParamValue::String(v),
    Vec<Parameter> => |v| ParamValue::Sequence(v),
    ParamMap => |v| ParamValue::Mapping(v),
}

impl From<ParamValue> for Parameter {
    fn from(value: ParamValue) -> Self {
        Parameter::new(value)
    }
}

impl From<serde_yaml::Value> for ParamValue {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => yaml_number(&n),
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Parameter::from).collect())
            }
            Value::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Parameter::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

impl From<serde_yaml::Value> for Parameter {
    fn from(value: serde_yaml::Value) -> Self {
        Parameter::new(ParamValue::from(value))
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Parameter::from).collect()),
            Value::Object(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Parameter::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Parameter {
    fn from(value: serde_json::Value) -> Self {
        Parameter::new(ParamValue::from(value))
    }
}

fn yaml_number(n: &serde_yaml::Number) -> ParamValue {
    if let Some(i) = n.as_i64() {
        ParamValue::Number(Number::from(i))
    } else if let Some(u) = n.as_u64() {
        ParamValue::Number(Number::from(u))
    } else {
        // NaN and infinities have no JSON number form
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or_else(|| ParamValue::String(n.to_string()), ParamValue::Number)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match key {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => serializer.collect_seq(items),
            Self::Mapping(map) => serializer.collect_map(map),
        }
    }
}

impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Parameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_yaml::Value::deserialize(deserializer).map(Parameter::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameter_is_valid_and_unprocessed() {
        let p = Parameter::default();
        assert!(p.valid);
        assert!(!p.processed);
        assert!(!p.secured);
        assert!(p.value.is_null());
    }

    #[test]
    fn builder_sets_metadata() {
        let p = Parameter::new("x").with_origin("Env/Tenant: acme").with_secured(true);
        assert_eq!(p.origin(), Some("Env/Tenant: acme"));
        assert!(p.secured);
        assert_eq!(p.as_str(), Some("x"));
    }

    #[test]
    fn invalid_keeps_raw_value() {
        let raw = Parameter::new("${MISSING}").with_origin("o");
        let marker = Parameter::invalid(&raw);
        assert!(!marker.valid);
        assert!(marker.parsed);
        assert_eq!(marker.as_str(), Some("${MISSING}"));
        assert_eq!(marker.origin(), Some("o"));
    }

    #[test]
    fn yaml_conversion_wraps_recursively() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("a:\n  b: 1\n  c: [true, x]\nport: 8080\n").unwrap();
        let p = Parameter::from(yaml);
        let map = p.as_mapping().unwrap();
        let a = map["a"].as_mapping().unwrap();
        assert_eq!(a["b"].value, ParamValue::Number(1.into()));
        let list = a["c"].value.as_sequence().unwrap();
        assert_eq!(list[0].value, ParamValue::Bool(true));
        assert_eq!(list[1].as_str(), Some("x"));
        assert_eq!(map["port"].value.kind(), ValueKind::Number);
    }

    #[test]
    fn non_string_keys_become_text() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("8080: http\ntrue: yes\n").unwrap();
        let p = Parameter::from(yaml);
        let map = p.as_mapping().unwrap();
        assert!(map.contains_key("8080"));
        assert!(map.contains_key("true"));
    }

    #[test]
    fn stamp_origin_fills_only_missing() {
        let mut map = ParamMap::new();
        map.insert("a".into(), Parameter::new("1"));
        map.insert("b".into(), Parameter::new("2").with_origin("keep"));
        let mut inner = ParamMap::new();
        inner.insert("c".into(), Parameter::new("3"));
        map.insert("n".into(), Parameter::new(inner));

        stamp_origins(&mut map, "Env/Cloud: t/c");

        assert_eq!(map["a"].origin(), Some("Env/Cloud: t/c"));
        assert_eq!(map["b"].origin(), Some("keep"));
        assert_eq!(
            map["n"].as_mapping().unwrap()["c"].origin(),
            Some("Env/Cloud: t/c")
        );
    }

    #[test]
    fn null_like_detection() {
        assert!(Parameter::default().is_null_like());
        assert!(Parameter::new("null").is_null_like());
        assert!(!Parameter::new("nil").is_null_like());
        assert!(!Parameter::from(0).is_null_like());
    }

    #[test]
    fn serializes_plain_value() {
        let mut map = ParamMap::new();
        map.insert("k".into(), Parameter::new("v").with_origin("ignored"));
        map.insert("n".into(), Parameter::from(3));
        let json = Parameter::new(map).to_json_string();
        assert_eq!(json, r#"{"k":"v","n":3}"#);
    }

    #[test]
    fn deserializes_from_yaml_text() {
        let p: Parameter = serde_yaml::from_str("[1, {a: b}]").unwrap();
        let items = p.value.as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_mapping().unwrap()["a"].as_str(), Some("b"));
    }

    #[test]
    fn display_renders_scalars_and_containers() {
        assert_eq!(Parameter::from(true).to_string(), "true");
        assert_eq!(Parameter::default().to_string(), "null");
        assert_eq!(Parameter::new(vec![Parameter::from(1)]).to_string(), "[1]");
    }
}
