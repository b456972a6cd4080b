//! The store façade: the public surface composing the whole engine.
//!
//! A [`Store`] wires together the reducer manager, the runtime invariant
//! checkers, and the dispatch pipeline, and exposes
//! dispatch/select/subscribe plus dynamic reducer topology. Cloning a
//! store clones a handle; all clones share one state.

use crate::checks::{meta_reducers_for, RuntimeChecks};
use crate::dispatch::{DispatchPipeline, INIT};
use crate::error::StoreError;
use crate::manager::ReducerManager;
use crate::subject::Subscription;
use statefold_core::action::Action;
use statefold_core::composition::{combine_factory, create_reducer_factory, ReducerFactory, ReducerMap};
use statefold_core::feature::Feature;
use statefold_core::reducer::{MetaReducer, Reducer};
use statefold_core::selector::Selector;
use statefold_core::value::Value;
use std::sync::{Arc, Mutex, Weak};

/// Configuration for [`Store`] construction.
///
/// # Example
///
/// ```ignore
/// let config = StoreConfig::default()
///     .with_initial_state(obj! { "counter" => obj! { "count" => 5 } })
///     .with_runtime_checks(RuntimeChecks::all());
/// let store = Store::new(reducers, config)?;
/// ```
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// State seeding slices before their reducers first run.
    pub initial_state: Option<Value>,
    /// User meta-reducers, first listed outermost (inside the runtime
    /// checks).
    pub meta_reducers: Vec<MetaReducer>,
    /// Runtime invariant checker flags.
    pub runtime_checks: RuntimeChecks,
    /// Root reducer factory; defaults to
    /// [`combine_factory`](statefold_core::composition::combine_factory).
    pub reducer_factory: Option<ReducerFactory>,
}

impl StoreConfig {
    /// Set the initial state.
    #[must_use]
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Append a user meta-reducer.
    #[must_use]
    pub fn with_meta_reducer(mut self, meta: MetaReducer) -> Self {
        self.meta_reducers.push(meta);
        self
    }

    /// Replace the runtime invariant checker flags.
    #[must_use]
    pub fn with_runtime_checks(mut self, checks: RuntimeChecks) -> Self {
        self.runtime_checks = checks;
        self
    }

    /// Replace the root reducer factory.
    #[must_use]
    pub fn with_reducer_factory(mut self, factory: ReducerFactory) -> Self {
        self.reducer_factory = Some(factory);
        self
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("runtime_checks", &self.runtime_checks)
            .field("meta_reducers", &self.meta_reducers.len())
            .finish_non_exhaustive()
    }
}

/// The reactive state container.
///
/// See the crate docs for the execution model. All methods take `&self`;
/// the store is a cheap cloneable handle.
#[derive(Clone)]
pub struct Store {
    pipeline: Arc<DispatchPipeline>,
    manager: Arc<ReducerManager>,
}

impl Store {
    /// Build a store from a reducer map and configuration, seeding state
    /// with the internal INIT action.
    ///
    /// Runtime-check meta-reducers wrap outermost, then the configured
    /// user meta-reducers, around the combined reducer produced by the
    /// root factory.
    ///
    /// # Errors
    ///
    /// Fails when folding the INIT action errors, for instance when a
    /// runtime check rejects the initial state.
    pub fn new(reducers: ReducerMap, config: StoreConfig) -> Result<Self, StoreError> {
        let mut metas = meta_reducers_for(config.runtime_checks);
        metas.extend(config.meta_reducers.iter().cloned());

        let root = config.reducer_factory.unwrap_or_else(combine_factory);
        let factory = create_reducer_factory(root, &metas);

        let manager = Arc::new(ReducerManager::new(
            reducers,
            config.initial_state,
            factory,
        ));
        let pipeline = Arc::new(DispatchPipeline::new(Arc::clone(&manager)));

        // Topology changes re-enter the pipeline through a weak handle;
        // the manager must not keep the pipeline alive.
        let weak: Weak<DispatchPipeline> = Arc::downgrade(&pipeline);
        manager.set_emitter(Arc::new(move |action: Action| match weak.upgrade() {
            Some(pipeline) => pipeline.dispatch_internal(action),
            None => Ok(()),
        }));

        pipeline.dispatch_internal(Action::new(INIT))?;
        tracing::debug!(checks = ?config.runtime_checks, "store created");

        Ok(Self { pipeline, manager })
    }

    /// Dispatch an action through the pipeline.
    ///
    /// Actions dispatched from within a subscriber callback are queued
    /// and processed after the in-flight action completes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidAction`] for an empty type tag
    /// - [`StoreError::ReservedActionType`] for the engine's internal
    ///   prefix
    /// - [`StoreError::Destroyed`] after [`Store::destroy`]
    /// - [`StoreError::Check`] when a runtime invariant checker rejects
    ///   the action or the produced state
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.pipeline.dispatch(action)
    }

    /// Observer-protocol alias for [`Store::dispatch`].
    ///
    /// # Errors
    ///
    /// See [`Store::dispatch`].
    pub fn next(&self, action: Action) -> Result<(), StoreError> {
        self.dispatch(action)
    }

    /// Snapshot of the current state tree.
    #[must_use]
    pub fn state(&self) -> Value {
        self.pipeline.state.value()
    }

    /// Read the current state through a closure.
    #[must_use]
    pub fn with_state<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        f(&self.pipeline.state.value())
    }

    /// Subscribe to the full state tree.
    ///
    /// The callback fires immediately with the current state, then on
    /// every change. Re-publications of an unchanged root (an action no
    /// reducer handled) are suppressed by reference comparison.
    pub fn subscribe(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        let last: Mutex<Option<Value>> = Mutex::new(None);
        self.pipeline.state.subscribe(move |state| {
            let mut last = last
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let changed = last.as_ref().is_none_or(|prev| !Value::ref_eq(prev, state));
            if changed {
                *last = Some(state.clone());
                drop(last);
                callback(state);
            }
        })
    }

    /// Subscribe to the processed-actions stream (replay-one, seeded
    /// with the internal INIT action). Diagnostics surface: every action
    /// the accumulator has applied, in order.
    pub fn subscribe_actions(
        &self,
        callback: impl Fn(&Action) + Send + Sync + 'static,
    ) -> Subscription {
        self.pipeline.actions.subscribe(callback)
    }

    /// Derive a change-deduplicated view of state through a selector.
    ///
    /// The selection shares the selector's memo cells, so multiple
    /// consumers of one selector share one cache.
    #[must_use]
    pub fn select(&self, selector: &Selector) -> StateSelection {
        StateSelection {
            pipeline: Arc::clone(&self.pipeline),
            selector: selector.clone(),
        }
    }

    /// Derive a change-deduplicated view through a plain projection.
    ///
    /// Shorthand for lifting the closure with
    /// [`Selector::from_fn`] and calling [`Store::select`].
    #[must_use]
    pub fn select_fn(&self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> StateSelection {
        self.select(&Selector::from_fn(f))
    }

    /// Derive a view reading a fixed key path, one to six levels deep.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSelectorPath`] for an empty path or
    /// one deeper than six keys.
    pub fn select_path(&self, keys: &[&str]) -> Result<StateSelection, StoreError> {
        if keys.is_empty() || keys.len() > 6 {
            return Err(StoreError::InvalidSelectorPath(keys.len()));
        }
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        let selector = Selector::from_fn(move |state| {
            let mut current = state.clone();
            for key in &keys {
                let Some(child) = current.get(key) else {
                    return Value::Null;
                };
                current = child.clone();
            }
            current
        });
        Ok(self.select(&selector))
    }

    /// Register a reducer under a root state key.
    ///
    /// Takes effect immediately: the emitted update action folds the new
    /// topology into state before this returns.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn add_reducer(&self, key: &str, reducer: Reducer) -> Result<(), StoreError> {
        self.manager.add_reducer(key, reducer)
    }

    /// Remove the reducer registered under a key; its slice disappears
    /// from state on the emitted update action.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::remove_reducer`].
    pub fn remove_reducer(&self, key: &str) -> Result<(), StoreError> {
        self.manager.remove_reducer(key)
    }

    /// Install a feature bundle.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_feature`].
    pub fn add_feature(&self, feature: &Feature) -> Result<(), StoreError> {
        self.manager.add_feature(feature)
    }

    /// Remove a feature by name.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::remove_feature`].
    pub fn remove_feature(&self, name: &str) -> Result<(), StoreError> {
        self.manager.remove_feature(name)
    }

    /// The reducer manager backing this store.
    #[must_use]
    pub fn reducer_manager(&self) -> &Arc<ReducerManager> {
        &self.manager
    }

    /// Whether [`Store::destroy`] has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.pipeline.is_destroyed()
    }

    /// Complete the state and action streams. Idempotent; subsequent
    /// dispatches fail with [`StoreError::Destroyed`].
    pub fn destroy(&self) {
        self.pipeline.destroy();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("destroyed", &self.is_destroyed())
            .field("reducers", &self.manager.reducer_keys())
            .finish()
    }
}

/// A change-deduplicated derived view of store state.
///
/// Produced by [`Store::select`] / [`Store::select_path`].
#[derive(Clone)]
pub struct StateSelection {
    pipeline: Arc<DispatchPipeline>,
    selector: Selector,
}

impl StateSelection {
    /// Evaluate the selector against the current state.
    #[must_use]
    pub fn value(&self) -> Value {
        self.selector.eval(&self.pipeline.state.value())
    }

    /// The underlying selector.
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Subscribe to the derived value.
    ///
    /// The callback fires immediately with the current derived value,
    /// then only when the derived value changes (compared by
    /// [`Value::ref_eq`]); emissions for unchanged values are suppressed.
    pub fn subscribe(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        let selector = self.selector.clone();
        let last: Mutex<Option<Value>> = Mutex::new(None);
        self.pipeline.state.subscribe(move |state| {
            let value = selector.eval(state);
            let mut last = last
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let changed = last
                .as_ref()
                .is_none_or(|prev| !Value::ref_eq(prev, &value));
            if changed {
                *last = Some(value.clone());
                drop(last);
                callback(&value);
            }
        })
    }
}

impl std::fmt::Debug for StateSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSelection").finish_non_exhaustive()
    }
}
