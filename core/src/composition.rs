//! Reducer composition utilities.
//!
//! This module provides the two composition primitives the store runtime
//! is built from:
//! - **[`combine_reducers`]**: merge a map of per-slice reducers into one
//!   whole-state reducer with a referential-stability guarantee
//! - **[`create_reducer_factory`]**: wrap a root factory with
//!   meta-reducers and initial-state defaulting
//!
//! # Referential stability
//!
//! The combined reducer returns the previous root object *by reference*
//! when no slice produced a new reference and no previously-present state
//! key lost its reducer. Downstream change detection (subscriptions,
//! selector memo cells) leans entirely on this guarantee.
//!
//! # Examples
//!
//! ```
//! use statefold_core::action::Action;
//! use statefold_core::composition::{combine_reducers, ReducerMap};
//! use statefold_core::reducer::create_reducer;
//! use statefold_core::{obj, value::Value};
//!
//! let mut map = ReducerMap::new();
//! map.insert(
//!     "counter".to_string(),
//!     create_reducer(obj! { "count" => 0 }, vec![]).into_reducer(),
//! );
//! let combined = combine_reducers(&map, None);
//!
//! let state = combined(None, &Action::new("noop")).unwrap();
//! let again = combined(Some(&state), &Action::new("noop")).unwrap();
//! assert!(Value::ref_eq(&state, &again));
//! ```

use crate::action::Action;
use crate::error::ReduceError;
use crate::reducer::{MetaReducer, Reducer};
use crate::value::{Value, ValueMap};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named per-slice reducers, keyed by their root state key.
pub type ReducerMap = BTreeMap<String, Reducer>;

/// A function building one whole-state reducer from a reducer map and an
/// optional initial state.
pub type ReducerFactory = Arc<dyn Fn(&ReducerMap, Option<&Value>) -> Reducer + Send + Sync>;

/// Merge a map of per-slice reducers into one whole-state reducer.
///
/// For each key the next per-slice state is computed and compared by
/// reference to the previous one. A brand-new parent object is returned
/// if and only if at least one slice changed reference, or at least one
/// previously-present state key no longer has a reducer (feature removal
/// must break referential equality even when nothing else changed).
/// Otherwise the previous parent is returned unchanged.
///
/// `initial_state` seeds per-slice state for keys absent from the
/// incoming state.
#[must_use]
pub fn combine_reducers(reducers: &ReducerMap, initial_state: Option<&ValueMap>) -> Reducer {
    let reducers = reducers.clone();
    let seed: Option<ValueMap> = initial_state.cloned();

    Arc::new(move |state: Option<&Value>, action: &Action| {
        let prev_map = state.and_then(Value::as_object);
        let mut next = ValueMap::new();
        let mut changed = prev_map.is_none();

        for (key, reducer) in &reducers {
            let prev_slice = prev_map
                .and_then(|m| m.get(key))
                .or_else(|| seed.as_ref().and_then(|m| m.get(key)));
            let next_slice = reducer(prev_slice, action)?;
            changed = changed || prev_slice.is_none_or(|prev| !Value::ref_eq(prev, &next_slice));
            next.insert(key.clone(), next_slice);
        }

        // A state key whose reducer was removed must force a new root.
        if let Some(prev) = prev_map {
            changed = changed || prev.keys().any(|key| !reducers.contains_key(key));
        }

        if changed {
            Ok(Value::object(next))
        } else {
            // Reuse the previous root: same Arc, same reference.
            Ok(state.cloned().unwrap_or_else(|| Value::object(next)))
        }
    })
}

/// The default root factory: [`combine_reducers`] over the map.
#[must_use]
pub fn combine_factory() -> ReducerFactory {
    Arc::new(|map, initial| combine_reducers(map, initial.and_then(Value::as_object)))
}

/// Compose meta-reducers right-to-left around a root factory, and default
/// `None` incoming state to the caller's initial state before the wrapped
/// reducer runs.
///
/// The first listed meta-reducer wraps outermost.
#[must_use]
pub fn create_reducer_factory(root: ReducerFactory, metas: &[MetaReducer]) -> ReducerFactory {
    let metas: Vec<MetaReducer> = metas.to_vec();
    Arc::new(move |map: &ReducerMap, initial: Option<&Value>| {
        let mut reducer = root(map, initial);
        for meta in metas.iter().rev() {
            reducer = meta(reducer);
        }
        let initial: Option<Value> = initial.cloned();
        Arc::new(
            move |state: Option<&Value>, action: &Action| -> Result<Value, ReduceError> {
                let state = state.or(initial.as_ref());
                reducer(state, action)
            },
        )
    })
}
