//! Collaborator slot table.
//!
//! [`ClientManager`] keeps one slot per collaborator type. Slots are created
//! empty when a type is registered and filled on first resolution. The
//! instance in a slot is never replaced while present; only [`ClientManager::reset`]
//! empties slots, and it exists for tests that need a fresh "process".

use super::{Collaborator, CollaboratorError, ErasedCollaborator};
use crate::introspect::CollaboratorType;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Process-wide client manager.
static PROCESS_CLIENTS: OnceLock<Arc<ClientManager>> = OnceLock::new();

type ConstructFn = fn() -> anyhow::Result<Arc<dyn ErasedCollaborator>>;

fn construct_erased<C: Collaborator>() -> anyhow::Result<Arc<dyn ErasedCollaborator>> {
    Ok(Arc::new(C::construct()?))
}

/// When a cached collaborator is re-authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReauthPolicy {
    /// Re-check only while the cached instance is unauthenticated.
    #[default]
    UntilAuthenticated,
    /// Re-check on every resolution.
    EveryResolution,
}

impl fmt::Display for ReauthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReauthPolicy::UntilAuthenticated => f.write_str("until-authenticated"),
            ReauthPolicy::EveryResolution => f.write_str("every-resolution"),
        }
    }
}

impl FromStr for ReauthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "until-authenticated" => Ok(ReauthPolicy::UntilAuthenticated),
            "every-resolution" => Ok(ReauthPolicy::EveryResolution),
            other => Err(format!("unknown re-authentication policy: {}", other)),
        }
    }
}

/// Registration record for a collaborator type.
///
/// Produced by the registry builder and installed into a [`ClientManager`]
/// when a server is assembled.
#[derive(Clone)]
pub struct CollaboratorSpec {
    ty: CollaboratorType,
    construct: ConstructFn,
}

impl CollaboratorSpec {
    /// Spec for `C`.
    pub fn of<C: Collaborator>() -> Self {
        Self {
            ty: CollaboratorType::of::<C>(),
            construct: construct_erased::<C>,
        }
    }

    /// The collaborator type.
    pub fn collaborator_type(&self) -> CollaboratorType {
        self.ty
    }
}

impl fmt::Debug for CollaboratorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaboratorSpec")
            .field("type", &self.ty.name())
            .finish()
    }
}

/// Snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    /// Collaborator type name.
    pub type_name: String,
    /// Whether an instance is cached.
    pub constructed: bool,
    /// Result of the last authentication check.
    pub authenticated: bool,
    /// How many times the constructor ran.
    pub constructions: u32,
}

struct Slot {
    ty: CollaboratorType,
    construct: ConstructFn,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    instance: Option<Arc<dyn ErasedCollaborator>>,
    authenticated: bool,
    constructions: u32,
}

#[derive(Default)]
struct SlotTable {
    order: Vec<Arc<Slot>>,
    by_type: HashMap<TypeId, Arc<Slot>>,
}

/// Owns at most one instance per collaborator type.
///
/// Slot construction is serialized by a per-slot lock, so concurrent first
/// use within one process never builds two instances.
///
/// The re-authentication policy belongs to the manager, not to a server:
/// every server sharing a manager (including the process-wide one) sees the
/// policy most recently set.
pub struct ClientManager {
    slots: RwLock<SlotTable>,
    every_resolution: AtomicBool,
    policy_set: AtomicBool,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientManager")
            .field("slots", &self.len())
            .field("policy", &self.policy())
            .finish()
    }
}

impl ClientManager {
    /// Create an isolated manager with the default policy.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(SlotTable::default()),
            every_resolution: AtomicBool::new(false),
            policy_set: AtomicBool::new(false),
        }
    }

    /// Create an isolated manager with the given policy.
    pub fn with_policy(policy: ReauthPolicy) -> Self {
        let manager = Self::new();
        manager.set_policy(policy);
        manager
    }

    /// The process-wide manager.
    ///
    /// Created on first call and kept until the process exits.
    pub fn process() -> Arc<Self> {
        PROCESS_CLIENTS
            .get_or_init(|| Arc::new(Self::new()))
            .clone()
    }

    /// Current re-authentication policy.
    pub fn policy(&self) -> ReauthPolicy {
        if self.every_resolution.load(Ordering::Relaxed) {
            ReauthPolicy::EveryResolution
        } else {
            ReauthPolicy::UntilAuthenticated
        }
    }

    /// Change the re-authentication policy, returning the previous one.
    ///
    /// Replacing a policy that was already set to something else is logged,
    /// since it changes resolution for every server sharing this manager.
    pub fn set_policy(&self, policy: ReauthPolicy) -> ReauthPolicy {
        let previous = if self
            .every_resolution
            .swap(policy == ReauthPolicy::EveryResolution, Ordering::Relaxed)
        {
            ReauthPolicy::EveryResolution
        } else {
            ReauthPolicy::UntilAuthenticated
        };

        let was_set = self.policy_set.swap(true, Ordering::Relaxed);
        if was_set && previous != policy {
            warn!(
                previous = %previous,
                policy = %policy,
                "Overriding re-authentication policy of a shared client manager"
            );
        }
        previous
    }

    /// Register `C`, creating an empty slot if none exists.
    pub fn register<C: Collaborator>(&self) -> CollaboratorType {
        let spec = CollaboratorSpec::of::<C>();
        self.install(&spec);
        spec.ty
    }

    /// Install a slot for `spec`. Existing slots are left untouched.
    pub fn install(&self, spec: &CollaboratorSpec) {
        let mut table = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if table.by_type.contains_key(&spec.ty.id()) {
            return;
        }

        debug!(collaborator = spec.ty.name(), "Installing collaborator slot");
        let slot = Arc::new(Slot {
            ty: spec.ty,
            construct: spec.construct,
            state: Mutex::new(SlotState::default()),
        });
        table.by_type.insert(spec.ty.id(), slot.clone());
        table.order.push(slot);
    }

    /// Whether a slot exists for `ty`.
    pub fn contains(&self, ty: &CollaboratorType) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .contains_key(&ty.id())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    /// Whether no slots exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the instance of `C`.
    pub async fn resolve<C: Collaborator>(&self) -> Result<Arc<C>, CollaboratorError> {
        let ty = CollaboratorType::of::<C>();
        self.resolve_type(&ty)
            .await?
            .into_any()
            .downcast::<C>()
            .map_err(|_| CollaboratorError::Unknown(ty.name().to_string()))
    }

    /// Resolve the instance for a collaborator type.
    #[instrument(skip(self, ty), fields(collaborator = %ty))]
    pub(crate) async fn resolve_type(
        &self,
        ty: &CollaboratorType,
    ) -> Result<Arc<dyn ErasedCollaborator>, CollaboratorError> {
        let slot = self
            .slot(ty)
            .ok_or_else(|| CollaboratorError::Unknown(ty.name().to_string()))?;

        let mut state = slot.state.lock().await;

        let instance = match state.instance.clone() {
            Some(instance) => {
                if state.authenticated && self.policy() == ReauthPolicy::UntilAuthenticated {
                    debug!("Reusing cached collaborator");
                    return Ok(instance);
                }
                instance
            }
            None => {
                let instance = (slot.construct)().map_err(|e| {
                    warn!(error = %e, "Collaborator construction failed");
                    CollaboratorError::Construction {
                        type_name: slot.ty.name().to_string(),
                        message: e.to_string(),
                    }
                })?;
                state.constructions += 1;
                state.instance = Some(instance.clone());
                info!("Constructed collaborator");
                instance
            }
        };

        state.authenticated = instance.check().await;
        if state.authenticated {
            Ok(instance)
        } else {
            warn!("Collaborator reported itself unauthenticated");
            Err(CollaboratorError::Authentication(
                slot.ty.short_name().to_string(),
            ))
        }
    }

    /// Snapshot of every slot, in registration order.
    pub async fn status(&self) -> Vec<SlotStatus> {
        let slots = self.ordered_slots();
        let mut statuses = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.lock().await;
            statuses.push(SlotStatus {
                type_name: slot.ty.name().to_string(),
                constructed: state.instance.is_some(),
                authenticated: state.authenticated,
                constructions: state.constructions,
            });
        }
        statuses
    }

    /// Empty every slot, as if the process had restarted.
    ///
    /// Slots themselves stay registered.
    pub async fn reset(&self) {
        for slot in self.ordered_slots() {
            let mut state = slot.state.lock().await;
            *state = SlotState::default();
        }
        info!("Collaborator slots reset");
    }

    fn slot(&self, ty: &CollaboratorType) -> Option<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .get(&ty.id())
            .cloned()
    }

    fn ordered_slots(&self) -> Vec<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }
}
