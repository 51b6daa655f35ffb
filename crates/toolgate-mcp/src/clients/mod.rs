//! Collaborator clients and their process-wide lifecycle.
//!
//! A collaborator is an auxiliary object a handler depends on, typically a
//! client for an external API. Handlers never receive collaborators from the
//! caller; they declare the type (`Arc<C>`) in their signature and the
//! [`ClientManager`] supplies the single per-process instance.
//!
//! Each collaborator type owns one slot. The slot is filled lazily on first
//! use through [`Collaborator::construct`], then checked with
//! [`Collaborator::authenticate`]. A failed authentication keeps the instance
//! cached so later resolutions re-check it instead of rebuilding it.

pub mod manager;

pub use manager::{ClientManager, CollaboratorSpec, ReauthPolicy, SlotStatus};

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Collaborator resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No slot exists for the requested type.
    #[error("Unknown collaborator type: {0}")]
    Unknown(String),

    /// The collaborator could not be constructed.
    #[error("Failed to construct collaborator {type_name}: {message}")]
    Construction {
        /// Collaborator type name.
        type_name: String,
        /// Construction failure.
        message: String,
    },

    /// The collaborator reported itself unauthenticated.
    #[error("Authentication failed for collaborator {0}")]
    Authentication(String),

    /// The handler asked for a collaborator it did not declare.
    #[error("Collaborator {0} was not declared by this handler")]
    NotDeclared(String),
}

/// An auxiliary object resolved by type and shared across invocations.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use toolgate_mcp::clients::Collaborator;
///
/// struct WeatherClient {
///     api_key: Option<String>,
/// }
///
/// #[async_trait]
/// impl Collaborator for WeatherClient {
///     fn construct() -> anyhow::Result<Self> {
///         Ok(Self { api_key: std::env::var("WEATHER_API_KEY").ok() })
///     }
///
///     async fn authenticate(&self) -> bool {
///         self.api_key.is_some()
///     }
/// }
/// ```
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// Zero-argument constructor, invoked at most once per process.
    fn construct() -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Whether the instance is currently usable.
    async fn authenticate(&self) -> bool;
}

/// Object-safe view of a [`Collaborator`] stored in a slot.
#[async_trait]
pub(crate) trait ErasedCollaborator: Send + Sync {
    async fn check(&self) -> bool;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<C: Collaborator> ErasedCollaborator for C {
    async fn check(&self) -> bool {
        self.authenticate().await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
