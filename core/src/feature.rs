//! Feature bundles: a named reducer plus its derived selectors.
//!
//! A [`Feature`] mounts one slice reducer at a root state key and carries
//! ready-made selectors for it: the feature selector reading the slice,
//! and one composed selector per top-level key of the reducer's declared
//! initial state. The initial-state object the author passes to
//! [`create_reducer`](crate::reducer::create_reducer) doubles as the
//! slice's schema; no runtime reflection is involved.

use crate::reducer::{MetaReducer, SliceReducer};
use crate::selector::{create_feature_selector, create_selector, Selector};
use crate::value::Value;
use std::collections::BTreeMap;

/// A named bundle of reducer and selectors, mounted at one root key.
#[derive(Clone)]
pub struct Feature {
    name: String,
    reducer: SliceReducer,
    feature_selector: Selector,
    key_selectors: BTreeMap<String, Selector>,
    meta_reducers: Vec<MetaReducer>,
}

impl Feature {
    /// The root state key this feature mounts at.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The feature's slice reducer.
    #[must_use]
    pub const fn reducer(&self) -> &SliceReducer {
        &self.reducer
    }

    /// The selector reading this feature's whole slice.
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.feature_selector
    }

    /// A derived selector for one top-level key of the slice, if the
    /// initial state declared it.
    #[must_use]
    pub fn select(&self, key: &str) -> Option<&Selector> {
        self.key_selectors.get(key)
    }

    /// Keys for which per-key selectors were derived.
    pub fn selector_keys(&self) -> impl Iterator<Item = &str> {
        self.key_selectors.keys().map(String::as_str)
    }

    /// Meta-reducers applied around this feature's reducer when it is
    /// installed.
    #[must_use]
    pub fn meta_reducers(&self) -> &[MetaReducer] {
        &self.meta_reducers
    }

    /// Attach feature-local meta-reducers, first listed outermost.
    #[must_use]
    pub fn with_meta_reducers(mut self, metas: Vec<MetaReducer>) -> Self {
        self.meta_reducers = metas;
        self
    }
}

impl std::fmt::Debug for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("name", &self.name)
            .field("selectors", &self.key_selectors.len())
            .finish_non_exhaustive()
    }
}

/// Bundle a slice reducer under a name, deriving its selectors.
///
/// Per-key selectors are derived only when the reducer's initial state is
/// an object; scalar-state features get the feature selector alone.
#[must_use]
pub fn create_feature(name: &str, reducer: SliceReducer) -> Feature {
    let feature_selector = create_feature_selector(name);

    let mut key_selectors = BTreeMap::new();
    if let Some(map) = reducer.initial_state().as_object() {
        for key in map.keys() {
            let key_owned = key.clone();
            let selector = create_selector(&[&feature_selector], move |slices| {
                slices[0].get(&key_owned).cloned().unwrap_or(Value::Null)
            });
            key_selectors.insert(key.clone(), selector);
        }
    }

    Feature {
        name: name.to_string(),
        reducer,
        feature_selector,
        key_selectors,
        meta_reducers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::action::{create_action, ActionTypeRegistry};
    use crate::obj;
    use crate::reducer::{create_reducer, on};

    fn counter_feature() -> Feature {
        let registry = ActionTypeRegistry::default();
        let increment = create_action(&registry, "[Counter] Increment");
        let reducer = create_reducer(
            obj! { "count" => 0, "step" => 1 },
            vec![on(&[&increment], |state, _| {
                let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
                let step = state.get("step").and_then(Value::as_int).unwrap_or(1);
                obj! { "count" => count + step, "step" => step }
            })],
        );
        create_feature("counter", reducer)
    }

    #[test]
    fn derives_one_selector_per_initial_state_key() {
        let feature = counter_feature();
        let keys: Vec<_> = feature.selector_keys().collect();
        assert_eq!(keys, vec!["count", "step"]);
    }

    #[test]
    fn derived_selectors_read_through_the_feature_root() {
        let feature = counter_feature();
        let state = obj! { "counter" => obj! { "count" => 12, "step" => 3 } };

        assert_eq!(
            feature.select("count").unwrap().eval(&state),
            Value::Int(12)
        );
        assert_eq!(feature.select("step").unwrap().eval(&state), Value::Int(3));
        assert_eq!(
            feature.selector().eval(&state),
            obj! { "count" => 12, "step" => 3 }
        );
    }

    #[test]
    fn scalar_initial_state_derives_no_key_selectors() {
        let reducer = create_reducer(Value::Int(0), vec![]);
        let feature = create_feature("version", reducer);
        assert_eq!(feature.selector_keys().count(), 0);
        assert!(feature.select("anything").is_none());
    }
}
