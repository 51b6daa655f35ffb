//! Input schema generation.
//!
//! Splits an introspected parameter list into data parameters, which are
//! surfaced to callers through a JSON-Schema-like descriptor, and collaborator
//! parameters, which are resolved internally and never appear in the schema.
//!
//! Declared types map onto schema types through a fixed table:
//!
//! | declared type            | schema type               |
//! |--------------------------|---------------------------|
//! | `String`                 | `string`                  |
//! | integer primitives       | `integer`                 |
//! | `f32` / `f64`            | `number`                  |
//! | `bool`                   | `boolean`                 |
//! | `Vec<T>`                 | `array`, items = schema(T)|
//! | `Option<T>` / defaulted  | as `T`, not required      |
//!
//! Anything else fails with [`SchemaGenerationError`] at registration time.

use crate::introspect::{CollaboratorType, IntrospectedParam, TypeDecl};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// Schema generation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaGenerationError {
    /// The declared type has no schema mapping.
    #[error("parameter '{param}' has unsupported type '{type_name}'")]
    UnsupportedType {
        /// Parameter name.
        param: String,
        /// Declared type.
        type_name: String,
    },

    /// The declared collaborator type was never registered.
    #[error("parameter '{param}' declares unknown collaborator type '{type_name}'")]
    UnknownCollaborator {
        /// Parameter name.
        param: String,
        /// Collaborator type name.
        type_name: String,
    },

    /// A collaborator type appears inside a list or option.
    #[error("parameter '{param}' nests collaborator type '{type_name}'; collaborators must be declared directly")]
    NestedCollaborator {
        /// Parameter name.
        param: String,
        /// Collaborator type name.
        type_name: String,
    },

    /// A collaborator parameter declares a default value.
    #[error("collaborator parameter '{0}' cannot have a default value")]
    CollaboratorDefault(String),

    /// The default value does not fit the declared type.
    #[error("default value for parameter '{param}' does not match its type: {reason}")]
    DefaultMismatch {
        /// Parameter name.
        param: String,
        /// Coercion failure.
        reason: String,
    },
}

/// Schema type of a data parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
}

impl SchemaType {
    /// JSON Schema name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of array items.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSchema {
    /// Item type.
    pub schema_type: SchemaType,
    /// Nested item schema, present iff `schema_type` is `array`.
    pub items: Option<Box<ItemSchema>>,
}

impl ItemSchema {
    fn to_json(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.schema_type.as_str()));
        if let Some(items) = &self.items {
            schema.insert("items".into(), items.to_json());
        }
        Value::Object(schema)
    }

    fn coerce(&self, value: Value) -> Result<Value, String> {
        coerce(self.schema_type, self.items.as_deref(), false, value)
    }
}

/// Registration-time descriptor of one data parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Schema type, derived once from the declared type.
    pub schema_type: SchemaType,
    /// Item schema, present iff `schema_type` is `array`.
    pub item_schema: Option<ItemSchema>,
    /// Declared as `Option<T>`.
    pub nullable: bool,
    /// A default was declared.
    pub has_default: bool,
    /// The declared default.
    pub default_value: Option<Value>,
}

impl ParameterDescriptor {
    /// Whether callers must supply this parameter.
    pub fn is_required(&self) -> bool {
        !self.has_default && !self.nullable
    }

    /// Property schema for this parameter.
    pub fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.schema_type.as_str()));
        if let Some(items) = &self.item_schema {
            schema.insert("items".into(), items.to_json());
        }
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default_value {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }

    /// Coerce a caller-supplied value to this parameter's type.
    ///
    /// Accepts the exact JSON type plus a few lossless conversions: numeric
    /// and boolean strings, integral floats for integers, and scalars for
    /// strings.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        coerce(
            self.schema_type,
            self.item_schema.as_ref(),
            self.nullable,
            value,
        )
    }
}

/// A collaborator parameter, resolved internally at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaboratorParam {
    /// Parameter name.
    pub name: String,
    /// Collaborator type.
    pub collaborator: CollaboratorType,
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSchema {
    /// Data parameters in declaration order.
    pub parameters: Vec<ParameterDescriptor>,
    /// Collaborator parameters in declaration order.
    pub collaborators: Vec<CollaboratorParam>,
}

impl GeneratedSchema {
    /// Names of the required data parameters, in declaration order.
    pub fn required(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.clone())
            .collect()
    }

    /// `{type: "object", properties: {...}, required: [...]}`.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_schema()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }
}

/// Generate the schema for an introspected parameter list.
///
/// `known` lists the collaborator types registered so far; a collaborator
/// parameter of any other type is rejected.
pub fn generate(
    params: &[IntrospectedParam],
    known: &[CollaboratorType],
) -> Result<GeneratedSchema, SchemaGenerationError> {
    let mut parameters = Vec::new();
    let mut collaborators = Vec::new();

    for param in params {
        if let TypeDecl::Collaborator(collaborator) = &param.ty {
            if !known.contains(collaborator) {
                return Err(SchemaGenerationError::UnknownCollaborator {
                    param: param.name.clone(),
                    type_name: collaborator.name().to_string(),
                });
            }
            if param.default.is_some() {
                return Err(SchemaGenerationError::CollaboratorDefault(param.name.clone()));
            }
            collaborators.push(CollaboratorParam {
                name: param.name.clone(),
                collaborator: *collaborator,
            });
            continue;
        }

        parameters.push(describe(param)?);
    }

    Ok(GeneratedSchema {
        parameters,
        collaborators,
    })
}

fn describe(param: &IntrospectedParam) -> Result<ParameterDescriptor, SchemaGenerationError> {
    let (ty, nullable) = match &param.ty {
        TypeDecl::Optional(inner) => (strip_optional(inner), true),
        other => (other, false),
    };

    let (schema_type, item_schema) = map_type(&param.name, ty)?;
    let mut descriptor = ParameterDescriptor {
        name: param.name.clone(),
        description: param.description.clone(),
        schema_type,
        item_schema,
        nullable,
        has_default: param.default.is_some(),
        default_value: None,
    };

    if let Some(default) = &param.default {
        let coerced = descriptor
            .coerce(default.clone())
            .map_err(|reason| SchemaGenerationError::DefaultMismatch {
                param: param.name.clone(),
                reason,
            })?;
        descriptor.default_value = Some(coerced);
    }

    Ok(descriptor)
}

fn strip_optional(mut ty: &TypeDecl) -> &TypeDecl {
    while let TypeDecl::Optional(inner) = ty {
        ty = inner;
    }
    ty
}

fn map_type(
    param: &str,
    ty: &TypeDecl,
) -> Result<(SchemaType, Option<ItemSchema>), SchemaGenerationError> {
    match ty {
        TypeDecl::String => Ok((SchemaType::String, None)),
        TypeDecl::Integer => Ok((SchemaType::Integer, None)),
        TypeDecl::Number => Ok((SchemaType::Number, None)),
        TypeDecl::Boolean => Ok((SchemaType::Boolean, None)),
        TypeDecl::List(inner) => {
            let (schema_type, items) = map_type(param, inner)?;
            Ok((
                SchemaType::Array,
                Some(ItemSchema {
                    schema_type,
                    items: items.map(Box::new),
                }),
            ))
        }
        TypeDecl::Collaborator(collaborator) => Err(SchemaGenerationError::NestedCollaborator {
            param: param.to_string(),
            type_name: collaborator.name().to_string(),
        }),
        TypeDecl::Optional(_) | TypeDecl::Unsupported(_) => {
            Err(SchemaGenerationError::UnsupportedType {
                param: param.to_string(),
                type_name: ty.to_string(),
            })
        }
    }
}

fn coerce(
    schema_type: SchemaType,
    items: Option<&ItemSchema>,
    nullable: bool,
    value: Value,
) -> Result<Value, String> {
    if value.is_null() {
        return if nullable {
            Ok(Value::Null)
        } else {
            Err(format!("expected {}, got null", schema_type))
        };
    }

    match (schema_type, value) {
        (SchemaType::String, Value::String(s)) => Ok(Value::String(s)),
        (SchemaType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
            Ok(Value::String(v.to_string()))
        }

        (SchemaType::Integer, Value::Number(n)) => integer_from_number(&n)
            .ok_or_else(|| format!("expected integer, got {}", n)),
        (SchemaType::Integer, Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .map_err(|_| format!("expected integer, got \"{}\"", s))
        }

        (SchemaType::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (SchemaType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got \"{}\"", s)),

        (SchemaType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (SchemaType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{}\"", s)),
        },

        (SchemaType::Array, Value::Array(values)) => {
            let Some(items) = items else {
                return Ok(Value::Array(values));
            };
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| items.coerce(v).map_err(|e| format!("item {}: {}", i, e)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }

        (expected, other) => Err(format!("expected {}, got {}", expected, json_kind(&other))),
    }
}

fn integer_from_number(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return Some(Value::Number(n.clone()));
    }
    // `i64::MAX as f64` and `u64::MAX as f64` round up to 2^63 and 2^64.
    let f = n.as_f64()?;
    if f.fract() != 0.0 {
        None
    } else if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else if f >= 0.0 && f < u64::MAX as f64 {
        Some(Value::from(f as u64))
    } else {
        None
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Collaborator;
    use crate::introspect::{introspect, Signature};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Ledger;

    #[async_trait]
    impl Collaborator for Ledger {
        fn construct() -> anyhow::Result<Self> {
            Ok(Ledger)
        }

        async fn authenticate(&self) -> bool {
            true
        }
    }

    fn schema_for(signature: Signature) -> Result<GeneratedSchema, SchemaGenerationError> {
        let introspected = introspect(&signature).unwrap();
        generate(&introspected.params, &[CollaboratorType::of::<Ledger>()])
    }

    #[test]
    fn test_required_and_defaults() {
        let schema = schema_for(
            Signature::new()
                .param::<i64>("a")
                .param::<f64>("b")
                .param_with_default("c", true),
        )
        .unwrap();

        let rendered = schema.input_schema();
        assert_eq!(rendered["type"], json!("object"));
        assert_eq!(rendered["required"], json!(["a", "b"]));
        assert_eq!(rendered["properties"]["a"]["type"], json!("integer"));
        assert_eq!(rendered["properties"]["b"]["type"], json!("number"));
        assert_eq!(rendered["properties"]["c"]["type"], json!("boolean"));
        assert_eq!(rendered["properties"]["c"]["default"], json!(true));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let build = || {
            schema_for(
                Signature::new()
                    .param::<String>("zeta")
                    .param::<Vec<i64>>("alpha")
                    .param::<Option<bool>>("mid"),
            )
            .unwrap()
            .input_schema()
        };

        let first = serde_json::to_string(&build()).unwrap();
        let second = serde_json::to_string(&build()).unwrap();
        assert_eq!(first, second);

        let keys: Vec<_> = build()["properties"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_list_and_optional_mapping() {
        let schema = schema_for(
            Signature::new()
                .param::<Vec<Vec<f64>>>("matrix")
                .param::<Option<String>>("label"),
        )
        .unwrap();

        let rendered = schema.input_schema();
        assert_eq!(
            rendered["properties"]["matrix"],
            json!({"type": "array", "items": {"type": "array", "items": {"type": "number"}}})
        );
        assert_eq!(rendered["properties"]["label"]["type"], json!("string"));
        assert_eq!(rendered["required"], json!(["matrix"]));
        assert!(schema.parameters[1].nullable);
    }

    #[test]
    fn test_collaborators_are_not_surfaced() {
        let schema = schema_for(
            Signature::new()
                .param::<f64>("a")
                .client::<Ledger>("ledger"),
        )
        .unwrap();

        assert_eq!(schema.collaborators.len(), 1);
        assert_eq!(schema.collaborators[0].name, "ledger");
        let rendered = schema.input_schema();
        assert!(rendered["properties"].get("ledger").is_none());
        assert_eq!(rendered["required"], json!(["a"]));
    }

    #[test]
    fn test_unknown_collaborator_fails() {
        let introspected = introspect(&Signature::new().client::<Ledger>("ledger")).unwrap();
        let err = generate(&introspected.params, &[]).unwrap_err();
        assert!(matches!(err, SchemaGenerationError::UnknownCollaborator { .. }));
    }

    #[test]
    fn test_unsupported_and_nested_types_fail() {
        let err = schema_for(Signature::new().param::<serde_json::Value>("blob")).unwrap_err();
        assert!(matches!(err, SchemaGenerationError::UnsupportedType { .. }));

        let err = schema_for(Signature::new().param::<Option<std::sync::Arc<Ledger>>>("maybe"))
            .unwrap_err();
        assert!(matches!(err, SchemaGenerationError::NestedCollaborator { .. }));

        let err = schema_for(Signature::new().param::<Vec<Option<i64>>>("holes")).unwrap_err();
        assert!(matches!(err, SchemaGenerationError::UnsupportedType { .. }));
    }

    #[test]
    fn test_default_must_match_type() {
        let introspected = introspect(&Signature::new().param_with_default("n", 3_i64)).unwrap();
        let mut params = introspected.params;
        params[0].default = Some(json!("three"));
        let err = generate(&params, &[]).unwrap_err();
        assert!(matches!(err, SchemaGenerationError::DefaultMismatch { .. }));
    }

    #[test]
    fn test_coercion() {
        let schema = schema_for(
            Signature::new()
                .param::<i64>("i")
                .param::<f64>("n")
                .param::<bool>("b")
                .param::<String>("s")
                .param::<Vec<i64>>("l")
                .param::<Option<i64>>("o"),
        )
        .unwrap();
        let p = &schema.parameters;

        assert_eq!(p[0].coerce(json!("42")), Ok(json!(42)));
        assert_eq!(p[0].coerce(json!(4.0)), Ok(json!(4)));
        assert!(p[0].coerce(json!(4.5)).is_err());
        assert_eq!(p[1].coerce(json!("2.5")), Ok(json!(2.5)));
        assert_eq!(p[1].coerce(json!(3)), Ok(json!(3)));
        assert_eq!(p[2].coerce(json!("TRUE")), Ok(json!(true)));
        assert!(p[2].coerce(json!(1)).is_err());
        assert_eq!(p[3].coerce(json!(12)), Ok(json!("12")));
        assert_eq!(p[4].coerce(json!(["1", 2])), Ok(json!([1, 2])));
        assert!(p[4].coerce(json!([1, "x"])).is_err());
        assert!(p[0].coerce(Value::Null).is_err());
        assert_eq!(p[5].coerce(Value::Null), Ok(Value::Null));
    }

    #[test]
    fn test_integer_coercion_covers_u64() {
        let schema = schema_for(Signature::new().param::<u64>("id")).unwrap();
        let id = &schema.parameters[0];

        assert_eq!(id.coerce(json!("18446744073709551615")), Ok(json!(u64::MAX)));
        assert_eq!(id.coerce(json!(u64::MAX)), Ok(json!(u64::MAX)));
        assert_eq!(
            id.coerce(json!(9223372036854775808.0_f64)),
            Ok(json!(9_223_372_036_854_775_808_u64))
        );
        assert_eq!(id.coerce(json!(-9223372036854775808.0_f64)), Ok(json!(i64::MIN)));
        assert!(id.coerce(json!(18446744073709551616.0_f64)).is_err());
        assert!(id.coerce(json!("18446744073709551616")).is_err());
    }
}
