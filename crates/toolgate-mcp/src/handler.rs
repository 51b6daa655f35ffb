//! Handler traits and invocation plumbing.
//!
//! Tools and resources implement [`ToolHandler`]; prompts implement
//! [`PromptHandler`]. Most handlers are closures wrapped with [`from_fn`],
//! [`from_async`] or [`prompt_fn`], which receive an [`Invocation`] holding
//! the bound data arguments and the resolved collaborators.

use crate::clients::{Collaborator, CollaboratorError, ErasedCollaborator};
use crate::introspect::CollaboratorType;
use crate::schema::ParameterDescriptor;
use crate::types::{ContentBlock, PromptMessage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Result type returned by handlers.
pub type HandlerResult<T> = Result<T, anyhow::Error>;

/// Call-time failures of a validly addressed tool, resource, or prompt.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// A declared collaborator could not be resolved.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// A required parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A supplied value could not be coerced to the declared type.
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidArgument {
        /// Parameter name.
        name: String,
        /// Coercion failure.
        reason: String,
    },

    /// The handler itself failed.
    #[error("{0}")]
    Handler(anyhow::Error),
}

/// Data arguments bound to a handler's declared parameters.
///
/// Keys follow declaration order. Omitted optional parameters are present
/// with their default, or `null` when none was declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Deserialize argument `name`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, InvocationError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| InvocationError::MissingParameter(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| InvocationError::InvalidArgument {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Raw JSON value of argument `name`.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// All bound arguments.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no arguments are bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Bind caller-supplied values to declared data parameters.
///
/// Missing required parameters and values that cannot be coerced fail;
/// undeclared extra arguments are ignored.
pub fn bind_arguments(
    parameters: &[ParameterDescriptor],
    provided: &Map<String, Value>,
) -> Result<Arguments, InvocationError> {
    let mut bound = Map::new();

    for param in parameters {
        let value = match provided.get(&param.name) {
            Some(value) if !(value.is_null() && param.has_default) => param
                .coerce(value.clone())
                .map_err(|reason| InvocationError::InvalidArgument {
                    name: param.name.clone(),
                    reason,
                })?,
            _ => match &param.default_value {
                Some(default) => default.clone(),
                None if param.nullable => Value::Null,
                None => return Err(InvocationError::MissingParameter(param.name.clone())),
            },
        };
        bound.insert(param.name.clone(), value);
    }

    for extra in provided.keys().filter(|k| !bound.contains_key(*k)) {
        debug!(argument = %extra, "Ignoring undeclared argument");
    }

    Ok(Arguments(bound))
}

/// Collaborator instances resolved for one invocation.
#[derive(Default, Clone)]
pub struct Collaborators {
    resolved: Vec<(String, CollaboratorType, Arc<dyn ErasedCollaborator>)>,
}

impl Collaborators {
    pub(crate) fn push(
        &mut self,
        name: String,
        ty: CollaboratorType,
        instance: Arc<dyn ErasedCollaborator>,
    ) {
        self.resolved.push((name, ty, instance));
    }

    /// The instance of `C`.
    pub fn get<C: Collaborator>(&self) -> Result<Arc<C>, CollaboratorError> {
        let ty = CollaboratorType::of::<C>();
        self.resolved
            .iter()
            .find(|(_, t, _)| *t == ty)
            .and_then(|(_, _, instance)| instance.clone().into_any().downcast::<C>().ok())
            .ok_or_else(|| CollaboratorError::NotDeclared(ty.short_name().to_string()))
    }

    /// Parameter names of the resolved collaborators, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolved.iter().map(|(name, _, _)| name.as_str())
    }

    /// Number of resolved collaborators.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Everything a handler receives for one call.
#[derive(Debug, Clone)]
pub struct Invocation {
    arguments: Arguments,
    collaborators: Collaborators,
}

impl Invocation {
    /// Create an invocation.
    pub fn new(arguments: Arguments, collaborators: Collaborators) -> Self {
        Self {
            arguments,
            collaborators,
        }
    }

    /// Deserialize data argument `name`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> HandlerResult<T> {
        Ok(self.arguments.get(name)?)
    }

    /// The resolved instance of collaborator `C`.
    pub fn client<C: Collaborator>(&self) -> HandlerResult<Arc<C>> {
        Ok(self.collaborators.get::<C>()?)
    }

    /// Bound data arguments.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Resolved collaborators.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}

/// What a tool or resource handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A JSON value, rendered into content items.
    Json(Value),
    /// Content items passed through unchanged.
    Content(Vec<ContentBlock>),
}

impl ToolOutput {
    /// Render into content items.
    ///
    /// Strings become one text item, arrays one item per element, `null`
    /// no items, and any other value its pretty-printed JSON text.
    pub fn into_content(self) -> Vec<ContentBlock> {
        match self {
            ToolOutput::Content(blocks) => blocks,
            ToolOutput::Json(Value::Null) => Vec::new(),
            ToolOutput::Json(Value::Array(items)) => items.into_iter().map(render_item).collect(),
            ToolOutput::Json(value) => vec![render_item(value)],
        }
    }
}

fn render_item(value: Value) -> ContentBlock {
    match value {
        Value::String(text) => ContentBlock::Text { text },
        other => ContentBlock::Text {
            text: serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        },
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Json(Value::String(text))
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Json(Value::String(text.to_string()))
    }
}

impl From<f64> for ToolOutput {
    fn from(n: f64) -> Self {
        ToolOutput::Json(Value::from(n))
    }
}

impl From<i64> for ToolOutput {
    fn from(n: i64) -> Self {
        ToolOutput::Json(Value::from(n))
    }
}

impl From<bool> for ToolOutput {
    fn from(b: bool) -> Self {
        ToolOutput::Json(Value::Bool(b))
    }
}

impl From<Vec<ContentBlock>> for ToolOutput {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        ToolOutput::Content(blocks)
    }
}

/// Trait for tool and resource implementations.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the handler.
    async fn call(&self, invocation: Invocation) -> HandlerResult<ToolOutput>;
}

/// What a prompt handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutput {
    /// A single user message.
    Text(String),
    /// An explicit conversation.
    Messages(Vec<PromptMessage>),
}

impl PromptOutput {
    /// Render into messages.
    pub fn into_messages(self) -> Vec<PromptMessage> {
        match self {
            PromptOutput::Text(text) => vec![PromptMessage::user(text)],
            PromptOutput::Messages(messages) => messages,
        }
    }
}

impl From<String> for PromptOutput {
    fn from(text: String) -> Self {
        PromptOutput::Text(text)
    }
}

impl From<&str> for PromptOutput {
    fn from(text: &str) -> Self {
        PromptOutput::Text(text.to_string())
    }
}

impl From<Vec<PromptMessage>> for PromptOutput {
    fn from(messages: Vec<PromptMessage>) -> Self {
        PromptOutput::Messages(messages)
    }
}

/// Trait for prompt implementations.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Render the prompt.
    async fn render(&self, arguments: Arguments) -> HandlerResult<PromptOutput>;
}

/// Tool handler backed by a synchronous closure.
pub struct FunctionHandler<F, O> {
    handler: F,
    _output: PhantomData<fn() -> O>,
}

/// Wrap a synchronous closure as a [`ToolHandler`].
pub fn from_fn<F, O>(handler: F) -> FunctionHandler<F, O>
where
    F: Fn(&Invocation) -> HandlerResult<O> + Send + Sync,
    O: Into<ToolOutput>,
{
    FunctionHandler {
        handler,
        _output: PhantomData,
    }
}

#[async_trait]
impl<F, O> ToolHandler for FunctionHandler<F, O>
where
    F: Fn(&Invocation) -> HandlerResult<O> + Send + Sync,
    O: Into<ToolOutput>,
{
    async fn call(&self, invocation: Invocation) -> HandlerResult<ToolOutput> {
        (self.handler)(&invocation).map(Into::into)
    }
}

/// Tool handler backed by an async closure.
pub struct AsyncFunctionHandler<F, O> {
    handler: F,
    _output: PhantomData<fn() -> O>,
}

/// Wrap an async closure as a [`ToolHandler`].
pub fn from_async<F, Fut, O>(handler: F) -> AsyncFunctionHandler<F, O>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<O>> + Send,
    O: Into<ToolOutput>,
{
    AsyncFunctionHandler {
        handler,
        _output: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, O> ToolHandler for AsyncFunctionHandler<F, O>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<O>> + Send,
    O: Into<ToolOutput>,
{
    async fn call(&self, invocation: Invocation) -> HandlerResult<ToolOutput> {
        (self.handler)(invocation).await.map(Into::into)
    }
}

/// Prompt handler backed by a synchronous closure.
pub struct FunctionPrompt<F, O> {
    handler: F,
    _output: PhantomData<fn() -> O>,
}

/// Wrap a synchronous closure as a [`PromptHandler`].
pub fn prompt_fn<F, O>(handler: F) -> FunctionPrompt<F, O>
where
    F: Fn(&Arguments) -> HandlerResult<O> + Send + Sync,
    O: Into<PromptOutput>,
{
    FunctionPrompt {
        handler,
        _output: PhantomData,
    }
}

#[async_trait]
impl<F, O> PromptHandler for FunctionPrompt<F, O>
where
    F: Fn(&Arguments) -> HandlerResult<O> + Send + Sync,
    O: Into<PromptOutput>,
{
    async fn render(&self, arguments: Arguments) -> HandlerResult<PromptOutput> {
        (self.handler)(&arguments).map(Into::into)
    }
}
