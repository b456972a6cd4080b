//! # Statefold Core
//!
//! Core types and authoring API for the statefold state-container engine.
//!
//! This crate holds everything a collaborator needs to *define* state
//! management (actions, reducers, selectors, features) without touching
//! the runtime. The store itself lives in `statefold-runtime`.
//!
//! ## Core Concepts
//!
//! - **Value**: the dynamic, immutable, serializable state tree
//! - **Action**: a tagged update request built by an action creator
//! - **Reducer**: pure transition function `(Option<&Value>, &Action) -> Result<Value, _>`
//! - **Meta-Reducer**: decorator around a reducer for cross-cutting behavior
//! - **Selector**: memoized pure projection over state
//! - **Feature**: named `{reducer, selectors}` bundle mounted at one root key
//!
//! ## Architecture Principles
//!
//! - Single source of truth, unidirectional data flow
//! - Immutability by construction: state containers are `Arc`-shared
//!   values with no mutators
//! - Referential stability: unchanged subtrees keep their pointer
//!   identity, so change detection is a pointer comparison
//!
//! ## Example
//!
//! ```
//! use statefold_core::action::{create_action, ActionTypeRegistry};
//! use statefold_core::reducer::{create_reducer, on};
//! use statefold_core::selector::{create_feature_selector, create_selector};
//! use statefold_core::{obj, value::Value};
//!
//! let registry = ActionTypeRegistry::default();
//! let increment = create_action(&registry, "[Counter] Increment");
//!
//! let counter = create_reducer(
//!     obj! { "count" => 0 },
//!     vec![on(&[&increment], |state, _| {
//!         let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
//!         obj! { "count" => count + 1 }
//!     })],
//! );
//!
//! let select_counter = create_feature_selector("counter");
//! let select_count = create_selector(&[&select_counter], |slices| {
//!     slices[0].get("count").cloned().unwrap_or(Value::Null)
//! });
//!
//! let state = obj! { "counter" => counter.reduce(None, &increment.create()) };
//! assert_eq!(select_count.eval(&state), Value::Int(1));
//! ```

pub mod action;
pub mod composition;
pub mod error;
pub mod feature;
pub mod reducer;
pub mod selector;
pub mod value;

pub use action::{
    create_action, create_action_group, create_action_with, create_action_with_props, empty_props,
    props, Action, ActionCreator, ActionGroup, ActionTypeRegistry, INTERNAL_ACTION_PREFIX,
};
pub use composition::{combine_factory, combine_reducers, create_reducer_factory, ReducerMap};
pub use error::{ActionError, ReduceError};
pub use feature::{create_feature, Feature};
pub use reducer::{create_reducer, on, reducer_fn, MetaReducer, Reducer, SliceReducer};
pub use selector::{
    create_feature_selector, create_selector, default_memoize, result_memoize, Memoized, Selector,
};
pub use value::{Value, ValueMap};

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
