//! [`Parameter`]: the tagged-variant descriptor tree. One struct carries the
//! fields every kind shares ([`ParamSpec`]); [`ParameterKind`] is the role
//! tag selecting which JSON-Schema fragment and parse rule apply.

use std::sync::Arc;

use ff_resolver::{ResolvedValue, ResolverContainer};
use ff_timeline::Clock;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::spec::ParamSpec;

static UUID_PATTERN: &str = r"^[0-9A-Fa-f]{8}-([0-9A-Fa-f]{4}-){3}[0-9A-Fa-f]{12}$";
static UUID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(UUID_PATTERN).expect("valid uuid regex"));

/// A node in the parameter/result descriptor tree.
#[derive(Debug, Clone)]
pub struct Parameter {
    spec: ParamSpec,
    kind: ParameterKind,
}

#[derive(Debug, Clone)]
pub enum ParameterKind {
    String { pattern: Option<String>, min_length: Option<u64>, max_length: Option<u64> },
    Enum { options: Vec<String> },
    Boolean,
    Uri,
    Uuid,
    Int { minimum: Option<i64>, maximum: Option<i64> },
    Float { minimum: Option<f64>, maximum: Option<f64> },
    IsoDate,
    NaiveIsoDate,
    Object { properties: IndexMap<String, Parameter> },
    ResolverObject {
        context: String,
        properties: IndexMap<String, Parameter>,
        extra_type: Option<Box<Parameter>>,
    },
    LooseObject { value_type: Box<Parameter>, key_regex: String },
    StringMap,
    Array { element: Box<Parameter>, min_items: u64, max_items: Option<u64>, unique: bool },
    OneOf { options: Vec<Parameter> },
    AnyOf { options: Vec<Parameter> },
    Json,
}

impl Parameter {
    fn new(spec: ParamSpec, kind: ParameterKind) -> Self {
        Self { spec, kind }
    }

    pub fn string(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::String { pattern: None, min_length: None, max_length: None })
    }

    pub fn string_constrained(
        spec: ParamSpec,
        pattern: Option<String>,
        min_length: Option<u64>,
        max_length: Option<u64>,
    ) -> Self {
        Self::new(spec, ParameterKind::String { pattern, min_length, max_length })
    }

    pub fn enum_of(spec: ParamSpec, options: Vec<String>) -> Self {
        Self::new(spec, ParameterKind::Enum { options })
    }

    pub fn boolean(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::Boolean)
    }

    pub fn uri(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::Uri)
    }

    pub fn uuid(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::Uuid)
    }

    pub fn int(spec: ParamSpec, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        Self::new(spec, ParameterKind::Int { minimum, maximum })
    }

    pub fn float(spec: ParamSpec, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        Self::new(spec, ParameterKind::Float { minimum, maximum })
    }

    pub fn iso_date(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::IsoDate)
    }

    pub fn naive_iso_date(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::NaiveIsoDate)
    }

    pub fn object(spec: ParamSpec, properties: IndexMap<String, Parameter>) -> Self {
        Self::new(spec, ParameterKind::Object { properties })
    }

    pub fn resolver_object(
        spec: ParamSpec,
        context: impl Into<String>,
        properties: IndexMap<String, Parameter>,
        extra_type: Option<Parameter>,
    ) -> Self {
        Self::new(
            spec,
            ParameterKind::ResolverObject {
                context: context.into(),
                properties,
                extra_type: extra_type.map(Box::new),
            },
        )
    }

    pub fn loose_object(spec: ParamSpec, value_type: Parameter, key_regex: impl Into<String>) -> Self {
        Self::new(spec, ParameterKind::LooseObject { value_type: Box::new(value_type), key_regex: key_regex.into() })
    }

    pub fn string_map(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::StringMap)
    }

    pub fn array(spec: ParamSpec, element: Parameter, min_items: u64, max_items: Option<u64>, unique: bool) -> Self {
        Self::new(spec, ParameterKind::Array { element: Box::new(element), min_items, max_items, unique })
    }

    pub fn one_of(spec: ParamSpec, options: Vec<Parameter>) -> Self {
        Self::new(spec, ParameterKind::OneOf { options })
    }

    pub fn any_of(spec: ParamSpec, options: Vec<Parameter>) -> Self {
        Self::new(spec, ParameterKind::AnyOf { options })
    }

    pub fn json(spec: ParamSpec) -> Self {
        Self::new(spec, ParameterKind::Json)
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn is_required(&self) -> bool {
        self.spec.is_required()
    }

    /// True for scalar kinds; false for the two container kinds.
    pub fn simple(&self) -> bool {
        !matches!(
            self.kind,
            ParameterKind::Object { .. }
                | ParameterKind::ResolverObject { .. }
                | ParameterKind::LooseObject { .. }
                | ParameterKind::StringMap
                | ParameterKind::Array { .. }
        )
    }

    fn bare_json_type(&self) -> Value {
        match &self.kind {
            ParameterKind::String { .. }
            | ParameterKind::Enum { .. }
            | ParameterKind::Uri
            | ParameterKind::Uuid
            | ParameterKind::IsoDate
            | ParameterKind::NaiveIsoDate => json!("string"),
            ParameterKind::Boolean => json!("boolean"),
            ParameterKind::Int { .. } => json!("integer"),
            ParameterKind::Float { .. } => json!("number"),
            ParameterKind::Object { .. }
            | ParameterKind::ResolverObject { .. }
            | ParameterKind::LooseObject { .. }
            | ParameterKind::StringMap => json!("object"),
            ParameterKind::Array { .. } => json!("array"),
            ParameterKind::OneOf { options } | ParameterKind::AnyOf { options } => {
                Value::Array(options.iter().map(Parameter::bare_json_type).collect())
            }
            ParameterKind::Json => {
                json!(["array", "boolean", "integer", "number", "object", "string"])
            }
        }
    }

    fn json_type_with_null(&self) -> Value {
        let bare = self.bare_json_type();
        if self.is_required() {
            return bare;
        }
        match bare {
            Value::Array(mut items) => {
                items.insert(0, json!("null"));
                Value::Array(items)
            }
            other => json!(["null", other]),
        }
    }

    /// Emit this node's JSON-Schema Draft-4 fragment.
    pub fn to_schema(&self, include_version: bool) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), self.json_type_with_null());
        schema.insert("description".to_string(), json!(self.spec.description));
        if let Some(default) = &self.spec.default {
            schema.insert("default".to_string(), default.clone());
        }
        self.extend_schema(&mut schema);
        if include_version {
            schema.insert("$schema".to_string(), json!("http://json-schema.org/draft-04/schema"));
        }
        Value::Object(schema)
    }

    fn extend_schema(&self, schema: &mut Map<String, Value>) {
        match &self.kind {
            ParameterKind::String { pattern, min_length, max_length } => {
                if let Some(p) = pattern {
                    schema.insert("pattern".to_string(), json!(p));
                }
                if let Some(max) = max_length {
                    schema.insert("maxLength".to_string(), json!(max));
                }
                if let Some(min) = min_length {
                    schema.insert("minLength".to_string(), json!(min));
                }
            }
            ParameterKind::Enum { options } => {
                schema.insert("enum".to_string(), json!(options));
            }
            ParameterKind::Uri => {
                schema.insert("format".to_string(), json!("uri"));
                schema.insert("minLength".to_string(), json!(1));
            }
            ParameterKind::Uuid => {
                schema.insert("pattern".to_string(), json!(UUID_PATTERN));
            }
            ParameterKind::Int { minimum, maximum } | ParameterKind::Float { .. } => {
                if let ParameterKind::Int { minimum, maximum } = &self.kind {
                    if let Some(m) = minimum {
                        schema.insert("minimum".to_string(), json!(m));
                    }
                    if let Some(m) = maximum {
                        schema.insert("maximum".to_string(), json!(m));
                    }
                }
                let _ = (minimum, maximum);
            }
            ParameterKind::Object { properties } | ParameterKind::ResolverObject { properties, .. } => {
                let props: Map<String, Value> =
                    properties.iter().map(|(k, v)| (k.clone(), v.to_schema(false))).collect();
                let required: Vec<&str> =
                    properties.iter().filter(|(_, v)| v.is_required()).map(|(k, _)| k.as_str()).collect();
                schema.insert("properties".to_string(), Value::Object(props));
                schema.insert("required".to_string(), json!(required));
            }
            ParameterKind::LooseObject { value_type, key_regex } => {
                schema.insert("minProperties".to_string(), json!(1));
                schema.insert(
                    "patternProperties".to_string(),
                    json!({ key_regex.clone(): value_type.to_schema(false) }),
                );
                schema.insert("additionalProperties".to_string(), json!(false));
            }
            ParameterKind::StringMap => {
                schema.insert(
                    "additionalProperties".to_string(),
                    json!({ "type": "string", "description": "string values" }),
                );
            }
            ParameterKind::Array { element, min_items, max_items, unique } => {
                schema.insert("items".to_string(), element.to_schema(false));
                if *min_items > 0 {
                    schema.insert("minItems".to_string(), json!(min_items));
                }
                if let Some(max) = max_items {
                    schema.insert("maxItems".to_string(), json!(max));
                }
                if *unique {
                    schema.insert("uniqueItems".to_string(), json!(true));
                }
            }
            ParameterKind::OneOf { options } => {
                schema.insert("oneOf".to_string(), json!(options.iter().map(|o| o.to_schema(false)).collect::<Vec<_>>()));
            }
            ParameterKind::AnyOf { options } => {
                schema.insert("anyOf".to_string(), json!(options.iter().map(|o| o.to_schema(false)).collect::<Vec<_>>()));
            }
            ParameterKind::Boolean | ParameterKind::IsoDate | ParameterKind::NaiveIsoDate | ParameterKind::Json => {}
        }

        if let ParameterKind::Float { minimum, maximum } = &self.kind {
            if let Some(m) = minimum {
                schema.insert("minimum".to_string(), json!(m));
            }
            if let Some(m) = maximum {
                schema.insert("maximum".to_string(), json!(m));
            }
        }
    }

    /// Parse `value` (absent = `None`) at `context`, producing a normalized
    /// value or building this node's container. `clock` is only consulted
    /// by `ResolverObject` when it must build a nested [`ResolverContainer`].
    pub fn parse(
        &self,
        value: Option<&Value>,
        context: &str,
        clock: &Arc<dyn Clock>,
    ) -> Result<Option<ResolvedValue>, SchemaError> {
        match value {
            Some(v) => self.parse_raw(v, context, clock),
            None => match &self.spec.default {
                Some(default) if !self.is_required() => {
                    let default = default.clone();
                    self.parse_raw(&default, &format!("{context}/-default-/"), clock)
                }
                Some(_) | None if !self.is_required() => Ok(None),
                _ => Err(SchemaError::MissingRequired {
                    context: context.to_string(),
                    description: truncate(&self.spec.description, 40),
                }),
            },
        }
    }

    fn parse_raw(
        &self,
        value: &Value,
        context: &str,
        clock: &Arc<dyn Clock>,
    ) -> Result<Option<ResolvedValue>, SchemaError> {
        let json_value = match &self.kind {
            ParameterKind::String { .. } | ParameterKind::Uri | ParameterKind::IsoDate | ParameterKind::NaiveIsoDate => {
                json!(expect_str(value, context)?.trim())
            }
            ParameterKind::Uuid => {
                let s = expect_str(value, context)?.trim();
                if !UUID_RE.is_match(s) {
                    return Err(SchemaError::InvalidValue {
                        context: context.to_string(),
                        message: format!("'{s}' is not a valid UUID"),
                    });
                }
                json!(s)
            }
            ParameterKind::Enum { options } => {
                let v = expect_str(value, context)?.trim().to_string();
                if !options.contains(&v) {
                    return Err(SchemaError::InvalidEnumValue { value: v });
                }
                json!(v)
            }
            ParameterKind::Boolean => json!(truthy(value)),
            ParameterKind::Int { .. } => json!(coerce_int(value, context)?),
            ParameterKind::Float { .. } => json!(coerce_float(value, context)?),
            ParameterKind::StringMap => value.clone(),
            ParameterKind::Json => value.clone(),
            ParameterKind::Object { properties } => {
                let obj = expect_object(value, context)?;
                let mut out = Map::new();
                for (name, prop) in properties {
                    let child_context = format!("{context}[{name}]");
                    if let Some(parsed) = prop.parse(obj.get(name), &child_context, clock)? {
                        out.insert(name.clone(), parsed.into_json());
                    }
                }
                Value::Object(out)
            }
            ParameterKind::LooseObject { value_type, key_regex } => {
                let obj = expect_object(value, context)?;
                let re = Regex::new(key_regex)
                    .map_err(|e| SchemaError::InvalidValue { context: context.to_string(), message: e.to_string() })?;
                let mut out = Map::new();
                for (name, v) in obj {
                    if !re.is_match(name) {
                        return Err(SchemaError::InvalidValue {
                            context: context.to_string(),
                            message: format!("key '{name}' doesn't match pattern '{key_regex}'"),
                        });
                    }
                    let child_context = format!("{context}[{name}]");
                    if let Some(parsed) = value_type.parse(Some(v), &child_context, clock)? {
                        out.insert(name.clone(), parsed.into_json());
                    }
                }
                Value::Object(out)
            }
            ParameterKind::Array { element, .. } => {
                let arr = expect_array(value, context)?;
                let len = arr.len();
                let mut out = Vec::with_capacity(len);
                for (i, v) in arr.iter().enumerate() {
                    let child_context = format!("{context}[{i}/{len}]");
                    if let Some(parsed) = element.parse(Some(v), &child_context, clock)? {
                        out.push(parsed.into_json());
                    } else {
                        out.push(Value::Null);
                    }
                }
                Value::Array(out)
            }
            ParameterKind::OneOf { options } => {
                return Ok(try_options(options, value, context, clock, "OneOf"));
            }
            ParameterKind::AnyOf { options } => {
                return Ok(try_options(options, value, context, clock, "AnyOf"));
            }
            ParameterKind::ResolverObject { context: rctx, properties, extra_type } => {
                return Ok(Some(self.parse_resolver_object(rctx, properties, extra_type.as_deref(), value, context, clock)?));
            }
        };
        Ok(Some(ResolvedValue::Json(json_value)))
    }

    fn parse_resolver_object(
        &self,
        rctx: &str,
        properties: &IndexMap<String, Parameter>,
        extra_type: Option<&Parameter>,
        value: &Value,
        context: &str,
        clock: &Arc<dyn Clock>,
    ) -> Result<ResolvedValue, SchemaError> {
        let obj = expect_object(value, context)?;
        let mut entries: Vec<(String, Value, Option<ff_resolver::Transform>)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (name, prop) in properties {
            seen.insert(name.clone());
            let raw = obj.get(name).cloned().unwrap_or(Value::Null);
            let scontext = format!("{rctx}/{context}[{name}]");
            // Nested ResolverObjectParameter children already build their own
            // container on resolution; skip re-wrapping them in a transform.
            let transform = if matches!(prop.kind, ParameterKind::ResolverObject { .. }) {
                None
            } else {
                Some(normalizing_transform(prop.clone(), scontext, clock.clone()))
            };
            entries.push((name.clone(), raw, transform));
        }

        if let Some(extra) = extra_type {
            for (name, v) in obj {
                if seen.contains(name) {
                    continue;
                }
                let scontext = format!("{rctx}/{context}[{name}]");
                let transform = if matches!(extra.kind, ParameterKind::ResolverObject { .. }) {
                    None
                } else {
                    Some(normalizing_transform(extra.clone(), scontext, clock.clone()))
                };
                entries.push((name.clone(), v.clone(), transform));
            }
        }

        let container = ResolverContainer::with_transforms(entries, clock.clone());
        Ok(ResolvedValue::Container(container))
    }
}

/// Build a resolver-wrapper transform that re-applies a property's own
/// `parse` to a code-resolved value, so schema normalization (trimming,
/// enum membership, etc.) isn't bypassed just because the value arrived via
/// the sandbox instead of the raw event.
fn normalizing_transform(prop: Parameter, context: String, clock: Arc<dyn Clock>) -> ff_resolver::Transform {
    Arc::new(move |value: Value| {
        prop.parse(Some(&value), &context, &clock)
            .map_err(|e| e.to_string())?
            .map(ResolvedValue::into_json)
            .ok_or_else(|| format!("{context}: resolved to no value"))
    })
}

fn try_options(
    options: &[Parameter],
    value: &Value,
    context: &str,
    clock: &Arc<dyn Clock>,
    label: &str,
) -> Option<ResolvedValue> {
    for option in options {
        let child_context = format!("{context}:{label}:");
        if let Ok(Some(resolved)) = option.parse(Some(value), &child_context, clock) {
            return Some(resolved);
        }
    }
    None
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn expect_str<'a>(value: &'a Value, context: &str) -> Result<&'a str, SchemaError> {
    value.as_str().ok_or_else(|| SchemaError::InvalidValue {
        context: context.to_string(),
        message: format!("{value} is not of type 'string'"),
    })
}

fn expect_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::InvalidValue {
        context: context.to_string(),
        message: format!("{value} is not of type 'object'"),
    })
}

fn expect_array<'a>(value: &'a Value, context: &str) -> Result<&'a Vec<Value>, SchemaError> {
    value.as_array().ok_or_else(|| SchemaError::InvalidValue {
        context: context.to_string(),
        message: format!("{value} is not of type 'array'"),
    })
}

fn coerce_int(value: &Value, context: &str) -> Result<i64, SchemaError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.as_i64().unwrap_or_default()),
        Value::Number(n) => Ok(n.as_f64().unwrap_or_default() as i64),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SchemaError::InvalidValue { context: context.to_string(), message: format!("'{s}' is not an int") }),
        other => Err(SchemaError::InvalidValue { context: context.to_string(), message: format!("{other} is not of type 'integer'") }),
    }
}

fn coerce_float(value: &Value, context: &str) -> Result<f64, SchemaError> {
    match value {
        Value::Number(n) => Ok(n.as_f64().unwrap_or_default()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SchemaError::InvalidValue { context: context.to_string(), message: format!("'{s}' is not a number") }),
        other => Err(SchemaError::InvalidValue { context: context.to_string(), message: format!("{other} is not of type 'number'") }),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_timeline::SystemClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }

    #[test]
    fn required_with_default_is_rejected() {
        let err = ParamSpec::new("x", Some(true), Some(json!("d"))).unwrap_err();
        assert!(matches!(err, SchemaError::RequiredWithDefault));
    }

    #[test]
    fn string_parse_trims() {
        let p = Parameter::string(ParamSpec::required("a string"));
        let parsed = p.parse(Some(&json!("  hi  ")), "stuff", &clock()).unwrap().unwrap();
        assert_eq!(parsed.into_json(), json!("hi"));
    }

    #[test]
    fn missing_required_errors_with_context_and_truncated_description() {
        let long_desc = "x".repeat(100);
        let p = Parameter::string(ParamSpec::required(long_desc));
        let err = p.parse(None, "stuff", &clock()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("stuff-Missing required parameter"));
    }

    #[test]
    fn optional_missing_with_default_is_parsed_default() {
        let p = Parameter::string(ParamSpec::with_default("d", json!(" hi ")));
        let parsed = p.parse(None, "ctx", &clock()).unwrap().unwrap();
        assert_eq!(parsed.into_json(), json!("hi"));
    }

    #[test]
    fn optional_missing_without_default_is_none() {
        let p = Parameter::string(ParamSpec::optional("d"));
        assert!(p.parse(None, "ctx", &clock()).unwrap().is_none());
    }

    #[test]
    fn to_schema_wraps_optional_type_with_null() {
        let p = Parameter::string(ParamSpec::optional("d"));
        let schema = p.to_schema(false);
        assert_eq!(schema["type"], json!(["null", "string"]));
    }

    #[test]
    fn enum_rejects_unknown_value() {
        let p = Parameter::enum_of(ParamSpec::required("d"), vec!["a".into(), "b".into()]);
        let err = p.parse(Some(&json!("c")), "ctx", &clock()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidEnumValue { .. }));
    }

    #[test]
    fn uuid_validates_pattern() {
        let p = Parameter::uuid(ParamSpec::required("d"));
        assert!(p.parse(Some(&json!("not-a-uuid")), "ctx", &clock()).is_err());
        let ok = p.parse(Some(&json!("123e4567-e89b-12d3-a456-426614174000")), "ctx", &clock()).unwrap().unwrap();
        assert_eq!(ok.into_json(), json!("123e4567-e89b-12d3-a456-426614174000"));
    }

    #[test]
    fn object_drops_null_optional_fields() {
        let mut props = IndexMap::new();
        props.insert("a".to_string(), Parameter::string(ParamSpec::required("d")));
        props.insert("b".to_string(), Parameter::string(ParamSpec::optional("d")));
        let p = Parameter::object(ParamSpec::required("d"), props);
        let parsed = p.parse(Some(&json!({"a": "x"})), "ctx", &clock()).unwrap().unwrap();
        assert_eq!(parsed.into_json(), json!({"a": "x"}));
    }

    #[test]
    fn one_of_returns_none_when_all_options_fail() {
        let options = vec![
            Parameter::int(ParamSpec::required("d"), None, None),
            Parameter::boolean(ParamSpec::required("d")),
        ];
        let p = Parameter::one_of(ParamSpec::required("d"), options);
        let result = p.parse(Some(&json!("not int or bool-ish")), "ctx", &clock()).unwrap();
        assert!(result.is_none(), "exhausted OneOf must be None, not Value::Bool(false)");
    }

    #[test]
    fn resolver_object_builds_container() {
        let mut props = IndexMap::new();
        props.insert("n".to_string(), Parameter::int(ParamSpec::required("d"), None, None));
        let p = Parameter::resolver_object(ParamSpec::required("d"), "root", props, None);
        let resolved = p.parse(Some(&json!({"n": 5})), "ctx", &clock()).unwrap().unwrap();
        match resolved {
            ResolvedValue::Container(mut c) => assert_eq!(c.get("n"), Some(json!(5))),
            ResolvedValue::Json(_) => panic!("expected a container"),
        }
    }
}
