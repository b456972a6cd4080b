//! Error types for the authoring API and the runtime invariant checkers.

use thiserror::Error;

/// Errors raised by action creators when a payload violates its contract.
///
/// The original payload contracts are enforced at creation time so a
/// malformed action can never reach the dispatch pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The payload was not an object.
    #[error("action payload must be an object, got {0}")]
    NotAnObject(&'static str),

    /// The payload was an array.
    #[error("action payload must be an object, not an array")]
    ArrayPayload,

    /// The payload object had no keys.
    #[error("action payload must not be an empty object")]
    EmptyPayload,

    /// The payload object carried a `type` key, which is reserved for
    /// the action's own tag.
    #[error("action payload must not contain a `type` key")]
    ReservedTypeKey,

    /// Two events in an action group derived the same method name.
    #[error("action group event `{0}` derives a duplicate method name `{1}`")]
    DuplicateEvent(String, String),
}

/// Errors raised inside a reducer call by the runtime invariant checkers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    /// A value that cannot be serialized was found in the action or the
    /// state produced by a reducer.
    #[error("detected unserializable value of type `{found}` at `{path}`")]
    NotSerializable {
        /// Dotted property path to the first violating value.
        path: String,
        /// Structural type tag of the violating value.
        found: String,
    },

    /// An opaque leaf that may hide interior-mutable data was found
    /// while strict immutability checking is enabled.
    #[error("detected opaque (potentially mutable) value of type `{type_name}` at `{path}`")]
    MutableValue {
        /// Dotted property path to the offending leaf.
        path: String,
        /// Rust type name captured when the leaf was constructed.
        type_name: String,
    },
}
