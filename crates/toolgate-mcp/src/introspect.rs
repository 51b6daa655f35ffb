//! Handler signature introspection.
//!
//! Rust cannot reflect over a closure's parameter list, so every handler
//! carries an explicit [`Signature`]: ordered parameter names, their declared
//! Rust types (captured through [`DeclaredType`]), optional defaults, and the
//! declared return type. [`introspect`] validates a signature once, at
//! registration time, and produces the ordered parameter list the schema
//! generator consumes.
//!
//! ```rust
//! use toolgate_mcp::introspect::{introspect, Signature, TypeDecl};
//!
//! let signature = Signature::new()
//!     .param::<i64>("a")
//!     .param::<f64>("b")
//!     .param_with_default("c", true)
//!     .returns::<f64>();
//!
//! let introspected = introspect(&signature).unwrap();
//! assert_eq!(introspected.params.len(), 3);
//! assert_eq!(introspected.params[2].ty, TypeDecl::Boolean);
//! assert!(introspected.params[2].default.is_some());
//! ```

use crate::clients::Collaborator;
use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Introspection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntrospectionError {
    /// A parameter was declared without a type.
    #[error("parameter '{0}' has no declared type")]
    MissingType(String),

    /// A parameter was declared with an empty name.
    #[error("parameter at position {0} has an empty name")]
    EmptyName(usize),

    /// The same parameter name appears twice.
    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    /// A default value could not be represented as JSON.
    #[error("default value for parameter '{param}' is not representable: {reason}")]
    InvalidDefault {
        /// Parameter name.
        param: String,
        /// Serialization failure.
        reason: String,
    },
}

/// Identity of a collaborator type.
#[derive(Debug, Clone, Copy)]
pub struct CollaboratorType {
    id: TypeId,
    name: &'static str,
}

impl CollaboratorType {
    /// Identity of `C`.
    pub fn of<C: Collaborator>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: type_name::<C>(),
        }
    }

    /// Type identity used as the slot key.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, for messages.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for CollaboratorType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CollaboratorType {}

impl fmt::Display for CollaboratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A declared parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    /// `String`
    String,
    /// Any primitive integer type
    Integer,
    /// `f32` / `f64`
    Number,
    /// `bool`
    Boolean,
    /// `Vec<T>`
    List(Box<TypeDecl>),
    /// `Option<T>`
    Optional(Box<TypeDecl>),
    /// `Arc<C>` where `C` is a collaborator
    Collaborator(CollaboratorType),
    /// A Rust type with no schema mapping
    Unsupported(&'static str),
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecl::String => f.write_str("string"),
            TypeDecl::Integer => f.write_str("integer"),
            TypeDecl::Number => f.write_str("number"),
            TypeDecl::Boolean => f.write_str("boolean"),
            TypeDecl::List(inner) => write!(f, "list[{}]", inner),
            TypeDecl::Optional(inner) => write!(f, "optional[{}]", inner),
            TypeDecl::Collaborator(c) => write!(f, "collaborator[{}]", c),
            TypeDecl::Unsupported(name) => f.write_str(name),
        }
    }
}

/// Rust types that can appear in a handler signature.
pub trait DeclaredType {
    /// The declaration recorded for this type.
    fn declare() -> TypeDecl;
}

impl DeclaredType for String {
    fn declare() -> TypeDecl {
        TypeDecl::String
    }
}

macro_rules! declare_as {
    ($decl:expr => $($ty:ty),+) => {
        $(
            impl DeclaredType for $ty {
                fn declare() -> TypeDecl {
                    $decl
                }
            }
        )+
    };
}

declare_as!(TypeDecl::Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
declare_as!(TypeDecl::Number => f32, f64);
declare_as!(TypeDecl::Boolean => bool);
declare_as!(TypeDecl::Unsupported("serde_json::Value") => Value);
declare_as!(TypeDecl::Unsupported("serde_json::Map") => serde_json::Map<String, Value>);

impl<T: DeclaredType> DeclaredType for Vec<T> {
    fn declare() -> TypeDecl {
        TypeDecl::List(Box::new(T::declare()))
    }
}

impl<T: DeclaredType> DeclaredType for Option<T> {
    fn declare() -> TypeDecl {
        TypeDecl::Optional(Box::new(T::declare()))
    }
}

impl<C: Collaborator> DeclaredType for Arc<C> {
    fn declare() -> TypeDecl {
        TypeDecl::Collaborator(CollaboratorType::of::<C>())
    }
}

/// One parameter as written in a [`Signature`].
#[derive(Debug, Clone)]
pub struct DeclaredParam {
    name: String,
    ty: Option<TypeDecl>,
    default: Option<Result<Value, String>>,
    description: Option<String>,
}

impl DeclaredParam {
    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type, if any.
    pub fn ty(&self) -> Option<&TypeDecl> {
        self.ty.as_ref()
    }
}

/// Explicit handler signature.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<DeclaredParam>,
    returns: Option<TypeDecl>,
}

impl Signature {
    /// Create an empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter of type `T`.
    pub fn param<T: DeclaredType>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Some(T::declare()), None)
    }

    /// Declare a parameter of type `T` with a default value.
    pub fn param_with_default<T>(self, name: impl Into<String>, default: T) -> Self
    where
        T: DeclaredType + Serialize,
    {
        let default = serde_json::to_value(&default).map_err(|e| e.to_string());
        self.push(name.into(), Some(T::declare()), Some(default))
    }

    /// Declare a collaborator parameter of type `C`.
    pub fn client<C: Collaborator>(self, name: impl Into<String>) -> Self {
        self.param::<Arc<C>>(name)
    }

    /// Declare a parameter without a type.
    ///
    /// Used by handlers whose parameters are described at runtime; such a
    /// signature is rejected by [`introspect`].
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.push(name.into(), None, None)
    }

    /// Attach a description to the most recently declared parameter.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.params.last_mut() {
            last.description = Some(description.into());
        }
        self
    }

    /// Declare the return type.
    pub fn returns<T: DeclaredType>(mut self) -> Self {
        self.returns = Some(T::declare());
        self
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[DeclaredParam] {
        &self.params
    }

    fn push(
        mut self,
        name: String,
        ty: Option<TypeDecl>,
        default: Option<Result<Value, String>>,
    ) -> Self {
        self.params.push(DeclaredParam {
            name,
            ty,
            default,
            description: None,
        });
        self
    }
}

/// A validated parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectedParam {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub ty: TypeDecl,
    /// Declared default.
    pub default: Option<Value>,
    /// Human-readable description.
    pub description: Option<String>,
}

impl IntrospectedParam {
    /// Whether a default was declared.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// The result of introspecting a [`Signature`].
#[derive(Debug, Clone, PartialEq)]
pub struct Introspected {
    /// Parameters in declaration order.
    pub params: Vec<IntrospectedParam>,
    /// Declared return type.
    pub returns: Option<TypeDecl>,
}

/// Validate a signature into an ordered, fully typed parameter list.
pub fn introspect(signature: &Signature) -> Result<Introspected, IntrospectionError> {
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(signature.params.len());

    for (position, param) in signature.params.iter().enumerate() {
        if param.name.trim().is_empty() {
            return Err(IntrospectionError::EmptyName(position));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(IntrospectionError::DuplicateParameter(param.name.clone()));
        }

        let ty = param
            .ty
            .clone()
            .ok_or_else(|| IntrospectionError::MissingType(param.name.clone()))?;

        let default = match &param.default {
            None => None,
            Some(Ok(value)) => Some(value.clone()),
            Some(Err(reason)) => {
                return Err(IntrospectionError::InvalidDefault {
                    param: param.name.clone(),
                    reason: reason.clone(),
                })
            }
        };

        params.push(IntrospectedParam {
            name: param.name.clone(),
            ty,
            default,
            description: param.description.clone(),
        });
    }

    Ok(Introspected {
        params,
        returns: signature.returns.clone(),
    })
}
