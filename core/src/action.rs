//! Actions, action creators, and the action-type registry.
//!
//! An [`Action`] is an immutable tagged record: a type string plus an
//! optional object payload. Actions are built through [`ActionCreator`]s,
//! which pin the type tag at definition time and enforce the payload
//! contract at creation time, so a malformed action cannot be constructed.
//!
//! Creator registration flows through an explicit [`ActionTypeRegistry`]
//! handle owned by the caller, so duplicate-type diagnostics are available
//! without process-global state and tests can reset counts
//! deterministically.
//!
//! # Examples
//!
//! ```
//! use statefold_core::action::{create_action, create_action_with_props, ActionTypeRegistry};
//! use statefold_core::obj;
//!
//! let registry = ActionTypeRegistry::default();
//! let increment = create_action(&registry, "[Counter] Increment");
//! let add = create_action_with_props(&registry, "[Counter] Add");
//!
//! let action = add.with(obj! { "amount" => 5 }).unwrap();
//! assert_eq!(action.ty(), "[Counter] Add");
//! assert_eq!(action.get("amount").and_then(|v| v.as_int()), Some(5));
//! # let _ = increment.create();
//! ```

use crate::error::ActionError;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Reserved prefix for the engine's internal bookkeeping actions.
///
/// Collaborators must never dispatch actions with this prefix; the store's
/// public dispatch entry rejects them, and the runtime invariant checkers
/// skip them.
pub const INTERNAL_ACTION_PREFIX: &str = "@statefold/";

/// An immutable tagged update request.
///
/// The type tag and payload are fixed at construction; there are no
/// mutators, so a dispatched action can never be altered after the fact.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    ty: Arc<str>,
    payload: Value,
}

impl Action {
    /// Build a payload-free action with the given type tag.
    #[must_use]
    pub fn new(ty: impl AsRef<str>) -> Self {
        Self {
            ty: Arc::from(ty.as_ref()),
            payload: Value::Null,
        }
    }

    /// Build an action with an explicit payload.
    ///
    /// Creator-built actions validate their payload contract; this raw
    /// constructor does not. It exists for engine bookkeeping actions and
    /// callers that assemble actions outside the creator API.
    #[must_use]
    pub fn with_payload(ty: impl AsRef<str>, payload: Value) -> Self {
        Self {
            ty: Arc::from(ty.as_ref()),
            payload,
        }
    }

    pub(crate) fn from_parts(ty: Arc<str>, payload: Value) -> Self {
        Self { ty, payload }
    }

    /// The action's type tag.
    #[must_use]
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// The action's payload: an object for props-carrying actions,
    /// `Null` otherwise.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Look up a payload field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Whether this is one of the engine's internal bookkeeping actions.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.ty.starts_with(INTERNAL_ACTION_PREFIX)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

/// Payload-mapping function for custom creators.
pub type PayloadFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone)]
enum CreatorKind {
    Empty,
    Props,
    Custom(PayloadFn),
}

/// A callable tagged with a constant action type.
///
/// Exactly one of three payload shapes, fixed at definition time:
/// payload-free ([`create_action`]), props-carrying
/// ([`create_action_with_props`]), or custom-mapped
/// ([`create_action_with`]).
#[derive(Clone)]
pub struct ActionCreator {
    ty: Arc<str>,
    kind: CreatorKind,
}

impl ActionCreator {
    /// The constant type tag this creator stamps onto its actions.
    #[must_use]
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// Build the payload-free form of this action.
    #[must_use]
    pub fn create(&self) -> Action {
        Action::from_parts(Arc::clone(&self.ty), Value::Null)
    }

    /// Build an action carrying the given payload.
    ///
    /// For props creators the payload is validated directly; for custom
    /// creators it is first routed through the creator's mapping
    /// function. Payload-free creators reject any payload.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the (mapped) payload is not an
    /// object, is an empty object, or contains a reserved `type` key.
    pub fn with(&self, payload: Value) -> Result<Action, ActionError> {
        let payload = match &self.kind {
            CreatorKind::Empty => return Err(ActionError::NotAnObject("no payload expected")),
            CreatorKind::Props => payload,
            CreatorKind::Custom(f) => f(payload),
        };
        validate_payload(&payload)?;
        Ok(Action::from_parts(Arc::clone(&self.ty), payload))
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CreatorKind::Empty => "empty",
            CreatorKind::Props => "props",
            CreatorKind::Custom(_) => "custom",
        };
        f.debug_struct("ActionCreator")
            .field("ty", &self.ty)
            .field("kind", &kind)
            .finish()
    }
}

fn validate_payload(payload: &Value) -> Result<(), ActionError> {
    match payload {
        Value::Array(_) => Err(ActionError::ArrayPayload),
        Value::Object(map) => {
            if map.is_empty() {
                return Err(ActionError::EmptyPayload);
            }
            if map.contains_key("type") {
                return Err(ActionError::ReservedTypeKey);
            }
            Ok(())
        },
        other => Err(ActionError::NotAnObject(other.kind())),
    }
}

/// Registration counter for action types.
///
/// Every creator construction increments the count for its type; a count
/// above one usually means two modules defined creators with the same
/// tag. The registry is a cheap cloneable handle: pass clones wherever
/// creators are defined and inspect one snapshot from the test harness.
#[derive(Clone, Default)]
pub struct ActionTypeRegistry {
    counts: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl ActionTypeRegistry {
    fn register(&self, ty: &str) {
        let mut counts = self
            .counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *counts.entry(ty.to_string()).or_insert(0) += 1;
    }

    /// Snapshot copy of the per-type registration counts.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Clear all registrations.
    pub fn reset(&self) {
        self.counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for ActionTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTypeRegistry")
            .field("types", &self.counts().len())
            .finish()
    }
}

/// Define a payload-free action creator.
#[must_use]
pub fn create_action(registry: &ActionTypeRegistry, ty: &str) -> ActionCreator {
    registry.register(ty);
    ActionCreator {
        ty: Arc::from(ty),
        kind: CreatorKind::Empty,
    }
}

/// Define a props-carrying action creator.
///
/// The creator's [`ActionCreator::with`] merges an object payload into
/// the action after validating the payload contract.
#[must_use]
pub fn create_action_with_props(registry: &ActionTypeRegistry, ty: &str) -> ActionCreator {
    registry.register(ty);
    ActionCreator {
        ty: Arc::from(ty),
        kind: CreatorKind::Props,
    }
}

/// Define an action creator with a custom payload-mapping function.
///
/// The function's output is validated like a props payload before the
/// type tag is merged in.
#[must_use]
pub fn create_action_with(
    registry: &ActionTypeRegistry,
    ty: &str,
    f: impl Fn(Value) -> Value + Send + Sync + 'static,
) -> ActionCreator {
    registry.register(ty);
    ActionCreator {
        ty: Arc::from(ty),
        kind: CreatorKind::Custom(Arc::new(f)),
    }
}

/// Payload shape of one event in an action group.
#[derive(Clone)]
pub enum GroupEvent {
    /// The event's actions carry no payload.
    Empty,
    /// The event's actions carry a validated object payload.
    Props,
    /// The event's actions route their payload through a custom mapping
    /// function.
    Custom(PayloadFn),
}

/// Marker for a payload-free group event.
#[must_use]
pub const fn empty_props() -> GroupEvent {
    GroupEvent::Empty
}

/// Marker for a props-carrying group event.
#[must_use]
pub const fn props() -> GroupEvent {
    GroupEvent::Props
}

/// A bundle of creators sharing one event source.
///
/// Creators are addressed by their derived method name; see
/// [`create_action_group`] for the derivation rule.
#[derive(Clone, Debug)]
pub struct ActionGroup {
    source: String,
    creators: BTreeMap<String, ActionCreator>,
}

impl ActionGroup {
    /// The group's event source label.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Look up a creator by derived method name (e.g. `loginSuccess`).
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&ActionCreator> {
        self.creators.get(method)
    }

    /// Iterate over `(method name, creator)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionCreator)> {
        self.creators.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Derive a group method name from an event label.
///
/// Trim, split on single spaces, lower-case the first token, capitalize
/// the rest, concatenate: `"Login Success"` becomes `loginSuccess`.
fn event_method_name(label: &str) -> String {
    let mut out = String::new();
    for (index, token) in label.trim().split(' ').filter(|t| !t.is_empty()).enumerate() {
        if index == 0 {
            out.push_str(&token.to_lowercase());
        } else {
            let mut chars = token.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Bulk-create action creators named `"[source] Label"`.
///
/// Each event label maps to a creator addressed by its derived method
/// name; the payload shape comes from the event's [`GroupEvent`] marker.
///
/// # Errors
///
/// Returns [`ActionError::DuplicateEvent`] when two labels derive the
/// same method name.
pub fn create_action_group(
    registry: &ActionTypeRegistry,
    source: &str,
    events: &[(&str, GroupEvent)],
) -> Result<ActionGroup, ActionError> {
    let mut creators = BTreeMap::new();
    for (label, event) in events {
        let ty = format!("[{source}] {label}");
        let method = event_method_name(label);
        let creator = match event {
            GroupEvent::Empty => create_action(registry, &ty),
            GroupEvent::Props => create_action_with_props(registry, &ty),
            GroupEvent::Custom(f) => {
                let f = Arc::clone(f);
                create_action_with(registry, &ty, move |payload| f(payload))
            },
        };
        if creators.insert(method.clone(), creator).is_some() {
            return Err(ActionError::DuplicateEvent((*label).to_string(), method));
        }
    }
    Ok(ActionGroup {
        source: source.to_string(),
        creators,
    })
}
