//! Reducer and meta-reducer types, and the slice-reducer builder.
//!
//! A [`Reducer`] is a pure transition function over the dynamic state
//! tree: `(Option<&Value>, &Action) -> Result<Value, ReduceError>`. `None`
//! incoming state means "produce your initial state". The `Result` return
//! is what lets the runtime invariant checkers participate as ordinary
//! meta-reducers and propagate violations with `?`.
//!
//! [`create_reducer`] builds a slice reducer from typed handler bindings
//! ([`on`]); authors who prefer a single exhaustive `match` over action
//! tags can pass any closure to [`reducer_fn`] instead.

use crate::action::{Action, ActionCreator};
use crate::error::ReduceError;
use crate::value::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// A pure state-transition function for one slice or the whole tree.
pub type Reducer =
    Arc<dyn Fn(Option<&Value>, &Action) -> Result<Value, ReduceError> + Send + Sync>;

/// A higher-order decorator around a [`Reducer`].
///
/// Meta-reducers are composed once at store construction; the first
/// listed wraps outermost.
pub type MetaReducer = Arc<dyn Fn(Reducer) -> Reducer + Send + Sync>;

/// Lift a closure into a [`Reducer`].
#[must_use]
pub fn reducer_fn(
    f: impl Fn(Option<&Value>, &Action) -> Result<Value, ReduceError> + Send + Sync + 'static,
) -> Reducer {
    Arc::new(f)
}

type Handler = Arc<dyn Fn(&Value, &Action) -> Value + Send + Sync>;

/// One handler binding inside a slice reducer.
///
/// Built by [`on`]; matches any of the bound creators' type tags.
#[derive(Clone)]
pub struct On {
    types: SmallVec<[Arc<str>; 2]>,
    handler: Handler,
}

impl On {
    fn matches(&self, ty: &str) -> bool {
        self.types.iter().any(|t| &**t == ty)
    }
}

/// Bind a handler to one or more action creators.
///
/// Handlers are matched through the creators' type tags, so a handler
/// cannot be registered for an action that has no creator.
#[must_use]
pub fn on(
    creators: &[&ActionCreator],
    handler: impl Fn(&Value, &Action) -> Value + Send + Sync + 'static,
) -> On {
    On {
        types: creators.iter().map(|c| Arc::from(c.ty())).collect(),
        handler: Arc::new(handler),
    }
}

/// A slice reducer: declared initial state plus ordered handler bindings.
///
/// All handlers matching a dispatched action run in declaration order.
/// An action no handler matches returns the previous state by reference,
/// which is what keeps unchanged slices referentially stable.
#[derive(Clone)]
pub struct SliceReducer {
    initial: Value,
    ons: Arc<Vec<On>>,
}

impl SliceReducer {
    /// The state this reducer produces when given `None`.
    #[must_use]
    pub const fn initial_state(&self) -> &Value {
        &self.initial
    }

    /// Run the reducer.
    #[must_use]
    pub fn reduce(&self, state: Option<&Value>, action: &Action) -> Value {
        let mut next = state.cloned().unwrap_or_else(|| self.initial.clone());
        for binding in self.ons.iter() {
            if binding.matches(action.ty()) {
                next = (binding.handler)(&next, action);
            }
        }
        next
    }

    /// Erase into the plain [`Reducer`] function type.
    #[must_use]
    pub fn into_reducer(self) -> Reducer {
        Arc::new(move |state, action| Ok(self.reduce(state, action)))
    }
}

impl std::fmt::Debug for SliceReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceReducer")
            .field("initial", &self.initial)
            .field("handlers", &self.ons.len())
            .finish()
    }
}

/// Build a slice reducer from an initial state and handler bindings.
#[must_use]
pub fn create_reducer(initial: Value, ons: Vec<On>) -> SliceReducer {
    SliceReducer {
        initial,
        ons: Arc::new(ons),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::action::{create_action, create_action_with_props, ActionTypeRegistry};
    use crate::obj;

    fn counter() -> (SliceReducer, ActionCreator, ActionCreator) {
        let registry = ActionTypeRegistry::default();
        let increment = create_action(&registry, "[Counter] Increment");
        let add = create_action_with_props(&registry, "[Counter] Add");
        let reducer = create_reducer(
            obj! { "count" => 0 },
            vec![
                on(&[&increment], |state, _| {
                    let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
                    obj! { "count" => count + 1 }
                }),
                on(&[&add], |state, action| {
                    let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
                    let amount = action.get("amount").and_then(Value::as_int).unwrap_or(0);
                    obj! { "count" => count + amount }
                }),
            ],
        );
        (reducer, increment, add)
    }

    #[test]
    fn none_state_yields_initial() {
        let (reducer, increment, _) = counter();
        let state = reducer.reduce(None, &increment.create());
        assert_eq!(state.get("count").and_then(Value::as_int), Some(1));
    }

    #[test]
    fn unmatched_action_returns_previous_state_by_reference() {
        let (reducer, _, _) = counter();
        let state = obj! { "count" => 4 };
        let next = reducer.reduce(Some(&state), &Action::new("[Other] Noop"));
        assert!(Value::ref_eq(&state, &next));
    }

    #[test]
    fn matching_handlers_run_in_declaration_order() {
        let registry = ActionTypeRegistry::default();
        let bump = create_action(&registry, "[X] Bump");
        let reducer = create_reducer(
            obj! { "n" => 0 },
            vec![
                on(&[&bump], |state, _| {
                    let n = state.get("n").and_then(Value::as_int).unwrap_or(0);
                    obj! { "n" => n + 1 }
                }),
                on(&[&bump], |state, _| {
                    let n = state.get("n").and_then(Value::as_int).unwrap_or(0);
                    obj! { "n" => n * 10 }
                }),
            ],
        );
        let next = reducer.reduce(None, &bump.create());
        assert_eq!(next.get("n").and_then(Value::as_int), Some(10));
    }

    #[test]
    fn props_payload_reaches_handler() {
        let (reducer, _, add) = counter();
        let action = add.with(obj! { "amount" => 7 }).unwrap();
        let state = reducer.reduce(None, &action);
        assert_eq!(state.get("count").and_then(Value::as_int), Some(7));
    }
}
