//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable
//! Given-When-Then syntax.

use statefold_core::action::Action;
use statefold_core::reducer::Reducer;
use statefold_core::value::Value;

/// Type alias for state assertion functions
type StateAssertion = Box<dyn FnOnce(&Value)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use statefold_testing::ReducerTest;
///
/// ReducerTest::new(counter_reducer)
///     .given_state(obj! { "count" => 0 })
///     .when(increment.create())
///     .then_state(|state| {
///         assert_eq!(state.get("count").and_then(Value::as_int), Some(1));
///     })
///     .run();
/// ```
pub struct ReducerTest {
    reducer: Reducer,
    initial_state: Option<Value>,
    actions: Vec<Action>,
    state_assertions: Vec<StateAssertion>,
}

impl ReducerTest {
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub fn new(reducer: Reducer) -> Self {
        Self {
            reducer,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
        }
    }

    /// Set the starting state (Given)
    #[must_use]
    pub fn given_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Start from the reducer's own initial state (Given)
    #[must_use]
    pub fn given_initial(mut self) -> Self {
        self.initial_state = None;
        self
    }

    /// Add an action to fold over the state (When)
    ///
    /// May be called repeatedly; actions run in order.
    #[must_use]
    pub fn when(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&Value) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Run the fold and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if no action was set, if the reducer errors, or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when()"
        );

        let mut state = self.initial_state;
        for action in &self.actions {
            let next = (self.reducer)(state.as_ref(), action)
                .expect("reducer returned an error during ReducerTest::run");
            state = Some(next);
        }

        let state = state.expect("actions were folded, state must exist");
        for assertion in self.state_assertions {
            assertion(&state);
        }
    }

    /// Run the fold and return the error the reducer produced
    ///
    /// # Panics
    ///
    /// Panics if no action was set or if every action succeeds.
    #[allow(clippy::panic)] // Test code can panic
    #[must_use]
    pub fn run_expecting_error(self) -> statefold_core::error::ReduceError {
        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when()"
        );

        let mut state = self.initial_state;
        for action in &self.actions {
            match (self.reducer)(state.as_ref(), action) {
                Ok(next) => state = Some(next),
                Err(error) => return error,
            }
        }
        panic!("expected the reducer to error, but every action succeeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statefold_core::action::{create_action, ActionTypeRegistry};
    use statefold_core::obj;
    use statefold_core::reducer::{create_reducer, on};

    #[test]
    fn fold_runs_actions_in_order() {
        let registry = ActionTypeRegistry::default();
        let increment = create_action(&registry, "[Counter] Increment");
        let reducer = create_reducer(
            obj! { "count" => 0 },
            vec![on(&[&increment], |state, _| {
                let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
                obj! { "count" => count + 1 }
            })],
        );

        ReducerTest::new(reducer.into_reducer())
            .given_initial()
            .when(increment.create())
            .when(increment.create())
            .then_state(|state| {
                assert_eq!(state.get("count").and_then(Value::as_int), Some(2));
            })
            .run();
    }

    #[test]
    fn given_state_overrides_initial() {
        let reducer = create_reducer(obj! { "count" => 0 }, vec![]);

        ReducerTest::new(reducer.into_reducer())
            .given_state(obj! { "count" => 40 })
            .when(Action::new("[Counter] Unhandled"))
            .then_state(|state| {
                assert_eq!(state.get("count").and_then(Value::as_int), Some(40));
            })
            .run();
    }
}
