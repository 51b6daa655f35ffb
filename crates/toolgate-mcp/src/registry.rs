//! Tool, resource, and prompt catalogs.
//!
//! Registration happens once, at startup, through [`RegistryBuilder`]. Each
//! call introspects the handler's signature, generates its schema, and
//! rejects duplicates immediately; a failed registration leaves everything
//! registered before it intact. [`RegistryBuilder::build`] then freezes the
//! catalogs into an immutable [`Registry`] shared by every request.
//!
//! ```rust
//! use toolgate_mcp::handler::{from_fn, Invocation};
//! use toolgate_mcp::introspect::Signature;
//! use toolgate_mcp::registry::RegistryBuilder;
//!
//! let mut builder = RegistryBuilder::new();
//! builder
//!     .tool(
//!         "add",
//!         "Add two numbers",
//!         Signature::new().param::<f64>("a").param::<f64>("b"),
//!         from_fn(|inv: &Invocation| Ok(inv.arg::<f64>("a")? + inv.arg::<f64>("b")?)),
//!     )
//!     .unwrap();
//!
//! let registry = builder.build();
//! assert_eq!(registry.list_tools().len(), 1);
//! ```

use crate::clients::{Collaborator, CollaboratorSpec};
use crate::handler::{PromptHandler, ToolHandler};
use crate::introspect::{introspect, CollaboratorType, IntrospectionError, Signature, TypeDecl};
use crate::schema::{
    generate, CollaboratorParam, GeneratedSchema, ParameterDescriptor, SchemaGenerationError,
};
use crate::template::{TemplateError, UriTemplate};
use crate::types::{PromptArgument, PromptDefinition, ResourceDefinition, ToolDefinition};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Default MIME type of resource content.
pub const DEFAULT_RESOURCE_MIME_TYPE: &str = "text/plain";

/// The three catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Tool => f.write_str("Tool"),
            CatalogKind::Resource => f.write_str("Resource"),
            CatalogKind::Prompt => f.write_str("Prompt"),
        }
    }
}

/// Registration-time failures. Fatal to startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The handler's signature is invalid.
    #[error("Cannot register {kind} '{name}': {source}")]
    Introspection {
        /// Catalog.
        kind: CatalogKind,
        /// Handler name or URI template.
        name: String,
        /// Cause.
        #[source]
        source: IntrospectionError,
    },

    /// A parameter type has no schema mapping.
    #[error("Cannot register {kind} '{name}': {source}")]
    SchemaGeneration {
        /// Catalog.
        kind: CatalogKind,
        /// Handler name or URI template.
        name: String,
        /// Cause.
        #[source]
        source: SchemaGenerationError,
    },

    /// The name is already taken in its catalog.
    #[error("{kind} '{name}' is already registered")]
    DuplicateName {
        /// Catalog.
        kind: CatalogKind,
        /// Duplicate name.
        name: String,
    },

    /// The resource URI template is malformed or disagrees with the signature.
    #[error("Invalid URI template '{template}': {reason}")]
    InvalidUriTemplate {
        /// Template as written.
        template: String,
        /// What is wrong.
        reason: String,
    },

    /// A prompt declared a collaborator parameter.
    #[error("Prompt '{prompt}' declares collaborator parameter '{param}'; prompts cannot depend on collaborators")]
    PromptCollaborator {
        /// Prompt name.
        prompt: String,
        /// Parameter name.
        param: String,
    },
}

/// Lookup miss in one of the catalogs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} not found: {name}")]
pub struct NotFoundError {
    /// Catalog searched.
    pub kind: CatalogKind,
    /// Name or URI looked up.
    pub name: String,
}

impl NotFoundError {
    fn new(kind: CatalogKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

/// Immutable metadata and handler for a registered tool.
pub struct ToolDescriptor {
    name: String,
    description: String,
    schema: GeneratedSchema,
    input_schema: Value,
    returns: Option<TypeDecl>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// Tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Data parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.schema.parameters
    }

    /// Names of the required data parameters.
    pub fn required_parameters(&self) -> Vec<String> {
        self.schema.required()
    }

    /// Collaborator parameters in declaration order.
    pub fn collaborators(&self) -> &[CollaboratorParam] {
        &self.schema.collaborators
    }

    /// Declared return type.
    pub fn returns(&self) -> Option<&TypeDecl> {
        self.returns.as_ref()
    }

    /// Generated input schema.
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// The handler.
    pub fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }

    /// Wire definition for `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.schema.parameters)
            .field("collaborators", &self.schema.collaborators)
            .finish()
    }
}

/// Immutable metadata and handler for a registered resource.
pub struct ResourceDescriptor {
    template: UriTemplate,
    description: String,
    mime_type: String,
    schema: GeneratedSchema,
    handler: Arc<dyn ToolHandler>,
}

impl ResourceDescriptor {
    /// URI template.
    pub fn uri_template(&self) -> &UriTemplate {
        &self.template
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// MIME type of the content.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Data parameters, bound from placeholder segments.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.schema.parameters
    }

    /// Collaborator parameters in declaration order.
    pub fn collaborators(&self) -> &[CollaboratorParam] {
        &self.schema.collaborators
    }

    /// The handler.
    pub fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }

    /// Wire definition for `resources/list`.
    pub fn definition(&self) -> ResourceDefinition {
        let raw = self.template.as_str().to_string();
        let (uri, uri_template) = if self.template.is_templated() {
            (None, Some(raw.clone()))
        } else {
            (Some(raw.clone()), None)
        };
        ResourceDefinition {
            uri,
            uri_template,
            name: raw,
            description: self.description.clone(),
            mime_type: Some(self.mime_type.clone()),
        }
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("uri_template", &self.template.as_str())
            .field("parameters", &self.schema.parameters)
            .field("collaborators", &self.schema.collaborators)
            .finish()
    }
}

/// Immutable metadata and handler for a registered prompt.
pub struct PromptDescriptor {
    name: String,
    description: String,
    parameters: Vec<ParameterDescriptor>,
    handler: Arc<dyn PromptHandler>,
}

impl PromptDescriptor {
    /// Prompt name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// The handler.
    pub fn handler(&self) -> &dyn PromptHandler {
        self.handler.as_ref()
    }

    /// Wire definition for `prompts/list`.
    pub fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self
                .parameters
                .iter()
                .map(|p| PromptArgument {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    required: p.is_required(),
                })
                .collect(),
        }
    }
}

impl fmt::Debug for PromptDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// A resource matched against a concrete URI.
#[derive(Debug, Clone)]
pub struct ResourceMatch {
    /// The matched resource.
    pub descriptor: Arc<ResourceDescriptor>,
    /// Placeholder bindings as string arguments.
    pub arguments: Map<String, Value>,
}

/// An ordered catalog with a name index.
struct Catalog<T> {
    entries: Vec<Arc<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Catalog<T> {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn insert(&mut self, name: String, entry: T) {
        self.index.insert(name, self.entries.len());
        self.entries.push(Arc::new(entry));
    }

    fn get(&self, name: &str) -> Option<&Arc<T>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }
}

/// Mutable, startup-time registration.
#[derive(Default)]
pub struct RegistryBuilder {
    collaborators: Vec<CollaboratorSpec>,
    tools: Catalog<ToolDescriptor>,
    resources: Catalog<ResourceDescriptor>,
    prompts: Catalog<PromptDescriptor>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register collaborator type `C`. Registering a type twice is a no-op.
    pub fn collaborator<C: Collaborator>(&mut self) -> &mut Self {
        let spec = CollaboratorSpec::of::<C>();
        if !self.known_collaborators().contains(&spec.collaborator_type()) {
            debug!(
                collaborator = spec.collaborator_type().name(),
                "Registered collaborator type"
            );
            self.collaborators.push(spec);
        }
        self
    }

    /// Register a tool.
    pub fn tool(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        signature: Signature,
        handler: impl ToolHandler + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        let name = name.into();
        if self.tools.contains(&name) {
            return Err(self.reject(RegistrationError::DuplicateName {
                kind: CatalogKind::Tool,
                name,
            }));
        }

        let (schema, returns) = self.analyze(CatalogKind::Tool, &name, &signature)?;
        let input_schema = schema.input_schema();
        debug!(
            tool = %name,
            parameters = schema.parameters.len(),
            collaborators = schema.collaborators.len(),
            "Registered tool"
        );

        self.tools.insert(
            name.clone(),
            ToolDescriptor {
                name,
                description: description.into(),
                schema,
                input_schema,
                returns,
                handler: Arc::new(handler),
            },
        );
        Ok(self)
    }

    /// Register a resource with the default `text/plain` MIME type.
    pub fn resource(
        &mut self,
        uri_template: impl Into<String>,
        description: impl Into<String>,
        signature: Signature,
        handler: impl ToolHandler + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        self.resource_with_mime(
            uri_template,
            description,
            DEFAULT_RESOURCE_MIME_TYPE,
            signature,
            handler,
        )
    }

    /// Register a resource with an explicit MIME type.
    pub fn resource_with_mime(
        &mut self,
        uri_template: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        signature: Signature,
        handler: impl ToolHandler + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        let raw = uri_template.into();
        if self.resources.contains(&raw) {
            return Err(self.reject(RegistrationError::DuplicateName {
                kind: CatalogKind::Resource,
                name: raw,
            }));
        }

        let template = UriTemplate::parse(&raw).map_err(|e: TemplateError| {
            self.reject(RegistrationError::InvalidUriTemplate {
                template: raw.clone(),
                reason: e.to_string(),
            })
        })?;

        let (schema, _) = self.analyze(CatalogKind::Resource, &raw, &signature)?;
        self.check_template(&template, &schema)?;
        debug!(resource = %raw, "Registered resource");

        self.resources.insert(
            raw,
            ResourceDescriptor {
                template,
                description: description.into(),
                mime_type: mime_type.into(),
                schema,
                handler: Arc::new(handler),
            },
        );
        Ok(self)
    }

    /// Register a prompt.
    pub fn prompt(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        signature: Signature,
        handler: impl PromptHandler + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        let name = name.into();
        if self.prompts.contains(&name) {
            return Err(self.reject(RegistrationError::DuplicateName {
                kind: CatalogKind::Prompt,
                name,
            }));
        }

        let introspected = introspect(&signature).map_err(|source| {
            self.reject(RegistrationError::Introspection {
                kind: CatalogKind::Prompt,
                name: name.clone(),
                source,
            })
        })?;
        if let Some(param) = introspected
            .params
            .iter()
            .find(|p| matches!(p.ty, TypeDecl::Collaborator(_)))
        {
            return Err(self.reject(RegistrationError::PromptCollaborator {
                prompt: name,
                param: param.name.clone(),
            }));
        }

        let (schema, _) = self.analyze(CatalogKind::Prompt, &name, &signature)?;
        debug!(prompt = %name, "Registered prompt");

        self.prompts.insert(
            name.clone(),
            PromptDescriptor {
                name,
                description: description.into(),
                parameters: schema.parameters,
                handler: Arc::new(handler),
            },
        );
        Ok(self)
    }

    /// Freeze the catalogs.
    pub fn build(self) -> Registry {
        Registry {
            collaborators: self.collaborators,
            tools: self.tools,
            resources: self.resources,
            prompts: self.prompts,
        }
    }

    fn known_collaborators(&self) -> Vec<CollaboratorType> {
        self.collaborators
            .iter()
            .map(CollaboratorSpec::collaborator_type)
            .collect()
    }

    fn analyze(
        &self,
        kind: CatalogKind,
        name: &str,
        signature: &Signature,
    ) -> Result<(GeneratedSchema, Option<TypeDecl>), RegistrationError> {
        let introspected = introspect(signature).map_err(|source| {
            self.reject(RegistrationError::Introspection {
                kind,
                name: name.to_string(),
                source,
            })
        })?;

        let schema = generate(&introspected.params, &self.known_collaborators()).map_err(
            |source| {
                self.reject(RegistrationError::SchemaGeneration {
                    kind,
                    name: name.to_string(),
                    source,
                })
            },
        )?;

        Ok((schema, introspected.returns))
    }

    fn check_template(
        &self,
        template: &UriTemplate,
        schema: &GeneratedSchema,
    ) -> Result<(), RegistrationError> {
        let placeholders = template.placeholders();
        let invalid = |reason: String| {
            self.reject(RegistrationError::InvalidUriTemplate {
                template: template.as_str().to_string(),
                reason,
            })
        };

        for placeholder in &placeholders {
            if !schema.parameters.iter().any(|p| p.name == *placeholder) {
                return Err(invalid(format!(
                    "placeholder '{}' has no matching parameter",
                    placeholder
                )));
            }
        }
        for param in schema.parameters.iter().filter(|p| p.is_required()) {
            if !placeholders.contains(&param.name.as_str()) {
                return Err(invalid(format!(
                    "required parameter '{}' is not a placeholder",
                    param.name
                )));
            }
        }
        Ok(())
    }

    fn reject(&self, err: RegistrationError) -> RegistrationError {
        error!(error = %err, "Registration failed");
        err
    }
}

/// Immutable tool, resource, and prompt catalogs.
pub struct Registry {
    collaborators: Vec<CollaboratorSpec>,
    tools: Catalog<ToolDescriptor>,
    resources: Catalog<ResourceDescriptor>,
    prompts: Catalog<PromptDescriptor>,
}

impl Registry {
    /// Start a new registration.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registered collaborator types, in registration order.
    pub fn collaborators(&self) -> &[CollaboratorSpec] {
        &self.collaborators
    }

    /// All tools, in registration order.
    pub fn list_tools(&self) -> &[Arc<ToolDescriptor>] {
        &self.tools.entries
    }

    /// All resources, in registration order.
    pub fn list_resources(&self) -> &[Arc<ResourceDescriptor>] {
        &self.resources.entries
    }

    /// All prompts, in registration order.
    pub fn list_prompts(&self) -> &[Arc<PromptDescriptor>] {
        &self.prompts.entries
    }

    /// Tool by name.
    pub fn find_tool(&self, name: &str) -> Result<Arc<ToolDescriptor>, NotFoundError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new(CatalogKind::Tool, name))
    }

    /// Resource by exact URI or by placeholder match against a concrete URI.
    ///
    /// A static resource matches its own URI; otherwise templates are tried
    /// in registration order. The string of a templated resource is not a
    /// concrete URI and is not found.
    pub fn find_resource(&self, uri: &str) -> Result<ResourceMatch, NotFoundError> {
        if let Some(descriptor) = self.resources.get(uri) {
            if !descriptor.template.is_templated() {
                return Ok(ResourceMatch {
                    descriptor: descriptor.clone(),
                    arguments: Map::new(),
                });
            }
        }

        self.resources
            .entries
            .iter()
            .find_map(|descriptor| {
                descriptor.template.matches(uri).map(|bindings| ResourceMatch {
                    descriptor: descriptor.clone(),
                    arguments: bindings
                        .into_iter()
                        .map(|(name, value)| (name, Value::String(value)))
                        .collect(),
                })
            })
            .ok_or_else(|| NotFoundError::new(CatalogKind::Resource, uri))
    }

    /// Prompt by name.
    pub fn find_prompt(&self, name: &str) -> Result<Arc<PromptDescriptor>, NotFoundError> {
        self.prompts
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new(CatalogKind::Prompt, name))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("collaborators", &self.collaborators)
            .field("tools", &self.tools.entries)
            .field("resources", &self.resources.entries)
            .field("prompts", &self.prompts.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{from_fn, prompt_fn, Arguments, Invocation};
    use async_trait::async_trait;
    use serde_json::json;

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

    fn echo() -> impl ToolHandler {
        from_fn(|_: &Invocation| Ok("ok"))
    }

    #[test]
    fn test_duplicate_tool_keeps_first() {
        let mut builder = RegistryBuilder::new();
        builder
            .tool("add", "first", Signature::new().param::<f64>("a"), echo())
            .unwrap();

        let err = builder
            .tool("add", "second", Signature::new(), echo())
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateName {
                kind: CatalogKind::Tool,
                name: "add".into()
            }
        );

        let registry = builder.build();
        let tool = registry.find_tool("add").unwrap();
        assert_eq!(tool.description(), "first");
        assert_eq!(tool.required_parameters(), vec!["a"]);
        assert_eq!(registry.list_tools().len(), 1);
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut builder = RegistryBuilder::new();
        for name in ["zeta", "alpha", "mid"] {
            builder.tool(name, name, Signature::new(), echo()).unwrap();
        }
        let registry = builder.build();
        let names: Vec<_> = registry.list_tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_collaborator_must_be_registered_first() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .tool("t", "", Signature::new().client::<Ledger>("ledger"), echo())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::SchemaGeneration { .. }));

        builder.collaborator::<Ledger>().collaborator::<Ledger>();
        builder
            .tool("t", "", Signature::new().client::<Ledger>("ledger"), echo())
            .unwrap();
        let registry = builder.build();
        assert_eq!(registry.collaborators().len(), 1);
        assert_eq!(registry.find_tool("t").unwrap().collaborators()[0].name, "ledger");
    }

    #[test]
    fn test_untyped_parameter_is_fatal() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .tool("t", "", Signature::new().untyped("x"), echo())
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot register Tool 't': parameter 'x' has no declared type"
        );
    }

    #[test]
    fn test_resource_lookup() {
        let mut builder = RegistryBuilder::new();
        builder
            .resource(
                "calculator://operation/{id}",
                "One operation",
                Signature::new().param::<String>("id"),
                echo(),
            )
            .unwrap();
        let registry = builder.build();

        let matched = registry.find_resource("calculator://operation/42").unwrap();
        assert_eq!(matched.arguments.get("id"), Some(&json!("42")));

        let err = registry.find_resource("calculator://operation/{id}").unwrap_err();
        assert_eq!(err.name, "calculator://operation/{id}");

        let err = registry.find_resource("calculator://history").unwrap_err();
        assert_eq!(err.kind, CatalogKind::Resource);
    }

    #[test]
    fn test_resource_template_must_agree_with_signature() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .resource("calc://op/{id}", "", Signature::new(), echo())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidUriTemplate { .. }));

        let err = builder
            .resource("calc://history", "", Signature::new().param::<i64>("limit"), echo())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidUriTemplate { .. }));

        let err = builder
            .resource("calc://op-{id}", "", Signature::new().param::<i64>("id"), echo())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidUriTemplate { .. }));
    }

    #[test]
    fn test_resource_definitions() {
        let mut builder = RegistryBuilder::new();
        builder
            .resource("calc://history", "All operations", Signature::new(), echo())
            .unwrap()
            .resource_with_mime(
                "calc://op/{id}",
                "One operation",
                "application/json",
                Signature::new().param::<i64>("id"),
                echo(),
            )
            .unwrap();
        let registry = builder.build();

        let defs: Vec<_> = registry.list_resources().iter().map(|r| r.definition()).collect();
        assert_eq!(defs[0].uri.as_deref(), Some("calc://history"));
        assert!(defs[0].uri_template.is_none());
        assert_eq!(defs[1].uri_template.as_deref(), Some("calc://op/{id}"));
        assert_eq!(defs[1].mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_prompts_reject_collaborators() {
        let mut builder = RegistryBuilder::new();
        builder.collaborator::<Ledger>();
        let err = builder
            .prompt(
                "explain",
                "",
                Signature::new().client::<Ledger>("ledger"),
                prompt_fn(|_: &Arguments| Ok("x")),
            )
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::PromptCollaborator { .. }));
    }

    #[test]
    fn test_prompt_definition() {
        let mut builder = RegistryBuilder::new();
        builder
            .prompt(
                "explain",
                "Explain a calculation",
                Signature::new()
                    .param::<String>("expression")
                    .describe("The expression")
                    .param_with_default("audience", "student".to_string()),
                prompt_fn(|_: &Arguments| Ok("x")),
            )
            .unwrap();
        let registry = builder.build();

        let def = registry.find_prompt("explain").unwrap().definition();
        assert_eq!(def.arguments.len(), 2);
        assert!(def.arguments[0].required);
        assert_eq!(def.arguments[0].description.as_deref(), Some("The expression"));
        assert!(!def.arguments[1].required);
        assert!(registry.find_prompt("missing").is_err());
    }
}
