//! The reducer manager: the only mutable registry in the system.
//!
//! Holds the named reducer map and the currently-published combined
//! reducer. Every topology change (adding or removing reducers or
//! features) recomposes the combined reducer through the configured
//! factory, publishes it, and emits the internal
//! `@statefold/store/update-reducers` bookkeeping action so the pipeline
//! folds the new topology into state immediately.

use crate::error::StoreError;
use statefold_core::action::Action;
use statefold_core::composition::{ReducerFactory, ReducerMap};
use statefold_core::feature::Feature;
use statefold_core::reducer::Reducer;
use statefold_core::obj;
use statefold_core::value::Value;
use std::sync::{Arc, Mutex};

/// Internal action emitted after every reducer-topology change.
pub const UPDATE_REDUCERS: &str = "@statefold/store/update-reducers";

/// Sink for the manager's bookkeeping actions; wired to the dispatch
/// pipeline by the store façade.
pub(crate) type ActionEmitter = Arc<dyn Fn(Action) -> Result<(), StoreError> + Send + Sync>;

struct ManagerInner {
    reducers: ReducerMap,
    initial_state: Option<Value>,
    factory: ReducerFactory,
    emitter: Option<ActionEmitter>,
}

/// Mutable registry of named reducers.
///
/// All mutations are atomic with respect to the engine's single-threaded
/// execution model; the published combined reducer is replaced as a
/// whole, so in-flight dispatches keep the topology they started with.
pub struct ReducerManager {
    inner: Mutex<ManagerInner>,
    current: Mutex<Reducer>,
}

impl ReducerManager {
    pub(crate) fn new(
        reducers: ReducerMap,
        initial_state: Option<Value>,
        factory: ReducerFactory,
    ) -> Self {
        let current = factory(&reducers, initial_state.as_ref());
        Self {
            inner: Mutex::new(ManagerInner {
                reducers,
                initial_state,
                factory,
                emitter: None,
            }),
            current: Mutex::new(current),
        }
    }

    pub(crate) fn set_emitter(&self, emitter: ActionEmitter) {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .emitter = Some(emitter);
    }

    /// The currently-published combined reducer.
    #[must_use]
    pub fn current_reducer(&self) -> Reducer {
        Arc::clone(
            &self
                .current
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Keys currently registered in the reducer map.
    #[must_use]
    pub fn reducer_keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .reducers
            .keys()
            .cloned()
            .collect()
    }

    /// Register one reducer under a root state key.
    ///
    /// # Errors
    ///
    /// Propagates any error from folding the bookkeeping action through
    /// the new topology (e.g. a runtime-check violation).
    pub fn add_reducer(&self, key: &str, reducer: Reducer) -> Result<(), StoreError> {
        let mut map = ReducerMap::new();
        map.insert(key.to_string(), reducer);
        self.add_reducers(map)
    }

    /// Register several reducers at once.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn add_reducers(&self, reducers: ReducerMap) -> Result<(), StoreError> {
        let features: Vec<String> = reducers.keys().cloned().collect();
        let update = {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.reducers.extend(reducers);
            self.recompose(&mut inner, features)
        };
        update()
    }

    /// Remove the reducer registered under a key.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn remove_reducer(&self, key: &str) -> Result<(), StoreError> {
        self.remove_reducers(&[key])
    }

    /// Remove several reducers at once.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn remove_reducers(&self, keys: &[&str]) -> Result<(), StoreError> {
        let features: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        let update = {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for key in keys {
                inner.reducers.remove(*key);
            }
            self.recompose(&mut inner, features)
        };
        update()
    }

    /// Install a feature bundle: its reducer, wrapped by the feature's
    /// own meta-reducers (first listed outermost), under the feature's
    /// name.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn add_feature(&self, feature: &Feature) -> Result<(), StoreError> {
        let mut reducer = feature.reducer().clone().into_reducer();
        for meta in feature.meta_reducers().iter().rev() {
            reducer = meta(reducer);
        }
        self.add_reducer(feature.name(), reducer)
    }

    /// Remove a feature's reducer by name.
    ///
    /// # Errors
    ///
    /// See [`ReducerManager::add_reducer`].
    pub fn remove_feature(&self, name: &str) -> Result<(), StoreError> {
        self.remove_reducer(name)
    }

    /// Recompose the combined reducer and publish it, returning a
    /// deferred emission of the bookkeeping action.
    ///
    /// The emission runs after the registry lock is released: the update
    /// action re-enters the dispatch pipeline, whose subscribers may call
    /// back into the manager.
    fn recompose(
        &self,
        inner: &mut ManagerInner,
        features: Vec<String>,
    ) -> impl FnOnce() -> Result<(), StoreError> + use<> {
        let combined = (inner.factory)(&inner.reducers, inner.initial_state.as_ref());
        {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = combined;
        }

        tracing::debug!(features = ?features, "reducer topology changed");
        metrics::counter!("store.topology.updates").increment(1);

        let emitter = inner.emitter.clone();
        move || match emitter {
            Some(emit) => {
                let names: Vec<Value> = features.into_iter().map(Value::from).collect();
                let action = Action::with_payload(
                    UPDATE_REDUCERS,
                    obj! { "features" => Value::array(names) },
                );
                emit(action)
            },
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ReducerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerManager")
            .field("keys", &self.reducer_keys())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use statefold_core::composition::{combine_factory, create_reducer_factory};
    use statefold_core::reducer::create_reducer;

    fn manager() -> ReducerManager {
        let factory = create_reducer_factory(combine_factory(), &[]);
        ReducerManager::new(ReducerMap::new(), None, factory)
    }

    #[test]
    fn add_reducer_publishes_new_topology() {
        let manager = manager();
        let counter = create_reducer(obj! { "count" => 0 }, vec![]).into_reducer();
        manager.add_reducer("counter", counter).unwrap();

        let reducer = manager.current_reducer();
        let state = reducer(None, &Action::new(UPDATE_REDUCERS)).unwrap();
        assert_eq!(
            state.at_path(&["counter", "count"]).unwrap(),
            &Value::Int(0)
        );
        assert_eq!(manager.reducer_keys(), vec!["counter".to_string()]);
    }

    #[test]
    fn remove_reducer_drops_key_from_topology() {
        let manager = manager();
        let counter = create_reducer(obj! { "count" => 0 }, vec![]).into_reducer();
        manager.add_reducer("counter", counter).unwrap();
        manager.remove_reducer("counter").unwrap();

        let reducer = manager.current_reducer();
        let state = reducer(None, &Action::new(UPDATE_REDUCERS)).unwrap();
        assert!(state.get("counter").is_none());
        assert!(manager.reducer_keys().is_empty());
    }

    #[test]
    fn emitter_receives_update_action() {
        let manager = manager();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.set_emitter(Arc::new(move |action: Action| {
            sink.lock().unwrap().push(action.ty().to_string());
            Ok(())
        }));

        let counter = create_reducer(obj! { "count" => 0 }, vec![]).into_reducer();
        manager.add_reducer("counter", counter).unwrap();

        assert_eq!(&*seen.lock().unwrap(), &[UPDATE_REDUCERS.to_string()]);
    }
}
