//! Runtime invariant checkers: development-mode meta-reducers auditing
//! actions and state.
//!
//! Two checkers exist, each gated by a pair of flags in
//! [`RuntimeChecks`]:
//!
//! - the **immutability checker** guards the one hole in the engine's
//!   immutable-by-construction value model: opaque leaves, which can
//!   smuggle interior-mutable data into the tree. Everything else is
//!   `Arc`-shared value data that simply cannot be written to.
//! - the **serializability checker** audits the action/state graph for
//!   values that cannot round-trip through serialization: opaque leaves,
//!   non-finite numbers, and a `Null` root.
//!
//! Both walk the graph recursively, fail on the first violation with the
//! dotted property path and the violating value's type tag, and skip the
//! engine's internal bookkeeping actions. Opaque leaves marked as
//! view-component markers are exempt from both.

use statefold_core::action::Action;
use statefold_core::error::ReduceError;
use statefold_core::reducer::{MetaReducer, Reducer};
use statefold_core::value::Value;
use std::sync::Arc;

/// Flags toggling the runtime invariant checkers.
///
/// Defaults follow build profile: in debug builds the immutability
/// checks are on and the serializability checks off; in release builds
/// everything is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeChecks {
    /// Audit reducer-produced state for opaque (potentially mutable)
    /// leaves.
    pub strict_state_immutability: bool,
    /// Audit dispatched actions for opaque (potentially mutable) leaves.
    pub strict_action_immutability: bool,
    /// Audit reducer-produced state for unserializable values.
    pub strict_state_serializability: bool,
    /// Audit dispatched actions for unserializable values.
    pub strict_action_serializability: bool,
}

impl RuntimeChecks {
    /// All checks disabled.
    #[must_use]
    pub const fn off() -> Self {
        Self {
            strict_state_immutability: false,
            strict_action_immutability: false,
            strict_state_serializability: false,
            strict_action_serializability: false,
        }
    }

    /// All checks enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            strict_state_immutability: true,
            strict_action_immutability: true,
            strict_state_serializability: true,
            strict_action_serializability: true,
        }
    }

    pub(crate) const fn wants_immutability(self) -> bool {
        self.strict_state_immutability || self.strict_action_immutability
    }

    pub(crate) const fn wants_serializability(self) -> bool {
        self.strict_state_serializability || self.strict_action_serializability
    }
}

impl Default for RuntimeChecks {
    fn default() -> Self {
        let debug = cfg!(debug_assertions);
        Self {
            strict_state_immutability: debug,
            strict_action_immutability: debug,
            strict_state_serializability: false,
            strict_action_serializability: false,
        }
    }
}

fn push_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Walk a graph looking for values that cannot be serialized.
///
/// Scalars, strings, and arrays are accepted without descending into
/// array elements; objects are recursed into; opaque leaves (except
/// component markers) and non-finite numbers are violations.
fn check_serializable(value: &Value, path: &str) -> Result<(), ReduceError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::String(_) | Value::Array(_) => Ok(()),
        Value::Float(n) => {
            if n.is_finite() {
                Ok(())
            } else {
                Err(ReduceError::NotSerializable {
                    path: path.to_string(),
                    found: "non-finite number".to_string(),
                })
            }
        },
        Value::Object(map) => {
            for (key, child) in map.iter() {
                check_serializable(child, &push_path(path, key))?;
            }
            Ok(())
        },
        Value::Opaque(opaque) => {
            if opaque.is_component() {
                Ok(())
            } else {
                Err(ReduceError::NotSerializable {
                    path: path.to_string(),
                    found: opaque.type_name().to_string(),
                })
            }
        },
    }
}

fn check_serializable_root(value: &Value, root: &str) -> Result<(), ReduceError> {
    if value.is_null() {
        return Err(ReduceError::NotSerializable {
            path: root.to_string(),
            found: "null".to_string(),
        });
    }
    check_serializable(value, root)
}

/// Walk a graph looking for opaque leaves that may hide interior-mutable
/// data. Unlike the serializability walk this descends into arrays;
/// component markers are exempt.
fn check_immutable(value: &Value, path: &str) -> Result<(), ReduceError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => Ok(()),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                check_immutable(item, &push_path(path, &index.to_string()))?;
            }
            Ok(())
        },
        Value::Object(map) => {
            for (key, child) in map.iter() {
                check_immutable(child, &push_path(path, key))?;
            }
            Ok(())
        },
        Value::Opaque(opaque) => {
            if opaque.is_component() {
                Ok(())
            } else {
                Err(ReduceError::MutableValue {
                    path: path.to_string(),
                    type_name: opaque.type_name().to_string(),
                })
            }
        },
    }
}

/// Meta-reducer enforcing the serializability invariant.
///
/// Audits the action before the wrapped reducer runs and the produced
/// state after; internal actions are skipped entirely.
#[must_use]
pub fn serialization_check_meta_reducer(checks: RuntimeChecks) -> MetaReducer {
    Arc::new(move |reducer: Reducer| -> Reducer {
        Arc::new(move |state: Option<&Value>, action: &Action| {
            if action.is_internal() {
                return reducer(state, action);
            }
            // A payload-free action carries Null; only a Null *state*
            // root is a violation.
            if checks.strict_action_serializability && !action.payload().is_null() {
                check_serializable_root(action.payload(), "action")?;
            }
            let next = reducer(state, action)?;
            if checks.strict_state_serializability {
                check_serializable_root(&next, "state")?;
            }
            Ok(next)
        })
    })
}

/// Meta-reducer enforcing the immutability invariant.
///
/// Audits the action before the wrapped reducer runs and the produced
/// state after; internal actions are skipped entirely.
#[must_use]
pub fn immutability_check_meta_reducer(checks: RuntimeChecks) -> MetaReducer {
    Arc::new(move |reducer: Reducer| -> Reducer {
        Arc::new(move |state: Option<&Value>, action: &Action| {
            if action.is_internal() {
                return reducer(state, action);
            }
            if checks.strict_action_immutability {
                check_immutable(action.payload(), "action")?;
            }
            let next = reducer(state, action)?;
            if checks.strict_state_immutability {
                check_immutable(&next, "state")?;
            }
            Ok(next)
        })
    })
}

/// Assemble the meta-reducers the given flags call for, in the order
/// they wrap the reducer (immutability outermost, matching the default
/// flag priorities).
#[must_use]
pub fn meta_reducers_for(checks: RuntimeChecks) -> Vec<MetaReducer> {
    let mut metas = Vec::new();
    if checks.wants_immutability() {
        metas.push(immutability_check_meta_reducer(checks));
    }
    if checks.wants_serializability() {
        metas.push(serialization_check_meta_reducer(checks));
    }
    metas
}
