//! Recording subscriber sinks.
//!
//! A recorder hands out a callback suitable for `Store::subscribe` /
//! `StateSelection::subscribe` and collects every delivered value, so
//! tests can assert on full emission sequences: ordering, immediacy of
//! the replay emission, and deduplication.

use statefold_core::action::Action;
use statefold_core::value::Value;
use std::sync::{Arc, Mutex};

/// Collects state (or derived-value) emissions.
#[derive(Clone, Default)]
pub struct StateRecorder {
    values: Arc<Mutex<Vec<Value>>>,
}

impl StateRecorder {
    /// New, empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback pushing every delivered value into this recorder.
    #[must_use]
    pub fn callback(&self) -> impl Fn(&Value) + Send + Sync + 'static + use<> {
        let values = Arc::clone(&self.values);
        move |value: &Value| {
            values
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(value.clone());
        }
    }

    /// Everything recorded so far, in delivery order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of emissions recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for StateRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRecorder")
            .field("len", &self.len())
            .finish()
    }
}

/// Collects processed-action emissions.
#[derive(Clone, Default)]
pub struct ActionRecorder {
    actions: Arc<Mutex<Vec<Action>>>,
}

impl ActionRecorder {
    /// New, empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback pushing every delivered action into this recorder.
    #[must_use]
    pub fn callback(&self) -> impl Fn(&Action) + Send + Sync + 'static + use<> {
        let actions = Arc::clone(&self.actions);
        move |action: &Action| {
            actions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(action.clone());
        }
    }

    /// Type tags of everything recorded, in delivery order.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.actions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|a| a.ty().to_string())
            .collect()
    }

    /// Everything recorded so far, in delivery order.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for ActionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRecorder")
            .field("len", &self.actions().len())
            .finish()
    }
}
