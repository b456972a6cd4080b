//! # Statefold Runtime
//!
//! The store runtime for the statefold state-container engine.
//!
//! This crate provides the [`Store`] that coordinates reducer execution:
//! the reentrancy-safe dispatch pipeline, the hot-swappable reducer
//! registry, the replay-one state and action streams, and the
//! development-mode runtime invariant checkers.
//!
//! ## Core Components
//!
//! - **Store**: the public facade for dispatch, select, subscribe,
//!   dynamic reducer topology, and destroy
//! - **`ReducerManager`**: the mutable registry of named reducers,
//!   recomposing and republishing the combined reducer on every change
//! - **Dispatch Pipeline**: FIFO-queued, reentrancy-safe action
//!   processing joined with the latest published reducer
//! - **Runtime Checks**: meta-reducers auditing actions and state for
//!   mutability escape hatches and unserializable values
//!
//! ## Execution model
//!
//! Everything runs synchronously on the dispatching call stack: the
//! reducer, the checkers, selector projectors, and subscriber callbacks.
//! Actions dispatched from inside a subscriber are queued and processed
//! strictly after the in-flight action completes, never interleaved.
//!
//! ## Example
//!
//! ```
//! use statefold_core::action::{create_action, ActionTypeRegistry};
//! use statefold_core::composition::ReducerMap;
//! use statefold_core::reducer::{create_reducer, on};
//! use statefold_core::{obj, value::Value};
//! use statefold_runtime::{Store, StoreConfig};
//!
//! let registry = ActionTypeRegistry::default();
//! let increment = create_action(&registry, "[Counter] Increment");
//!
//! let mut reducers = ReducerMap::new();
//! reducers.insert(
//!     "counter".to_string(),
//!     create_reducer(
//!         obj! { "count" => 0 },
//!         vec![on(&[&increment], |state, _| {
//!             let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
//!             obj! { "count" => count + 1 }
//!         })],
//!     )
//!     .into_reducer(),
//! );
//!
//! let store = Store::new(reducers, StoreConfig::default()).unwrap();
//! store.dispatch(increment.create()).unwrap();
//!
//! let state = store.state();
//! assert_eq!(state.at_path(&["counter", "count"]), Some(&Value::Int(1)));
//! ```

/// Runtime invariant checkers (immutability and serializability audits)
pub mod checks;

/// The dispatch pipeline and state accumulator
pub mod dispatch;

/// The reducer manager (mutable reducer registry)
pub mod manager;

/// The store façade and configuration
pub mod store;

/// Replay-one broadcast subjects and subscription handles
pub mod subject;

/// Error types for the store runtime
pub mod error {
    use statefold_core::error::ReduceError;
    use thiserror::Error;

    /// Errors that can occur during store operations.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// A dispatched action violated the dispatch contract.
        #[error("invalid action: {0}")]
        InvalidAction(&'static str),

        /// A caller dispatched an action carrying the engine's reserved
        /// internal prefix.
        #[error("action type `{0}` uses the reserved internal prefix")]
        ReservedActionType(String),

        /// The store was destroyed and no longer accepts actions.
        #[error("store has been destroyed")]
        Destroyed,

        /// A select path was empty or deeper than six keys.
        #[error("select path must have between 1 and 6 keys, got {0}")]
        InvalidSelectorPath(usize),

        /// A runtime invariant checker rejected the action or the
        /// produced state.
        #[error(transparent)]
        Check(#[from] ReduceError),
    }
}

pub use checks::{
    immutability_check_meta_reducer, serialization_check_meta_reducer, RuntimeChecks,
};
pub use dispatch::INIT;
pub use error::StoreError;
pub use manager::{ReducerManager, UPDATE_REDUCERS};
pub use store::{StateSelection, Store, StoreConfig};
pub use subject::{Subject, Subscription};
