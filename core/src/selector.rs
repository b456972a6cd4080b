//! Memoized selectors: pure, change-detected projections over state.
//!
//! A [`Selector`] maps the root state tree to a derived value while
//! skipping recomputation whenever its inputs are unchanged by reference.
//! Selectors compose into a DAG: [`create_selector`] layers a memoized
//! projector over any number of input selectors, and the state-level memo
//! short-circuits the whole evaluation when the root reference is the
//! same as last time.
//!
//! Memo cells are shared across clones of a selector, so every consumer
//! of the same selector benefits from one cache.
//!
//! # Examples
//!
//! ```
//! use statefold_core::selector::{create_feature_selector, create_selector};
//! use statefold_core::{obj, value::Value};
//!
//! let counter = create_feature_selector("counter");
//! let count = create_selector(&[&counter], |slices| {
//!     slices[0].get("count").cloned().unwrap_or(Value::Null)
//! });
//! let double = create_selector(&[&count], |values| {
//!     Value::Int(values[0].as_int().unwrap_or(0) * 2)
//! });
//!
//! let state = obj! { "counter" => obj! { "count" => 21 } };
//! assert_eq!(double.eval(&state), Value::Int(42));
//! ```

use crate::value::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Raw projection over a list of input values.
pub type ProjectorFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Equality predicate used by memo cells.
pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

#[derive(Default)]
struct MemoState {
    last_args: Option<SmallVec<[Value; 4]>>,
    last_result: Option<Value>,
    override_result: Option<Value>,
}

/// A memoization cell around a projection function.
///
/// Skips recomputation when every argument is pairwise-equal (by
/// [`Value::ref_eq`] unless overridden) to the previous call's arguments.
/// Cells are cheap cloneable handles sharing one cache.
#[derive(Clone)]
pub struct Memoized {
    f: ProjectorFn,
    cell: Arc<Mutex<MemoState>>,
    result_eq: Option<EqualityFn>,
}

impl Memoized {
    fn with_result_eq(f: ProjectorFn, result_eq: Option<EqualityFn>) -> Self {
        Self {
            f,
            cell: Arc::new(Mutex::new(MemoState::default())),
            result_eq,
        }
    }

    /// Evaluate the cell, reusing the previous result when the arguments
    /// are unchanged.
    #[must_use]
    pub fn call(&self, args: &[Value]) -> Value {
        {
            let cell = self
                .cell
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(value) = &cell.override_result {
                return value.clone();
            }
            if let (Some(last_args), Some(last_result)) = (&cell.last_args, &cell.last_result) {
                let unchanged = last_args.len() == args.len()
                    && last_args
                        .iter()
                        .zip(args)
                        .all(|(a, b)| Value::ref_eq(a, b));
                if unchanged {
                    return last_result.clone();
                }
            }
        }

        // The projection is pure, so it runs outside the lock.
        let computed = (self.f)(args);

        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let result = match (&self.result_eq, &cell.last_result) {
            // Keep returning the previous result object when the newly
            // computed one is equal under the caller-supplied predicate.
            (Some(eq), Some(previous)) if eq(previous, &computed) => previous.clone(),
            _ => computed,
        };
        cell.last_args = Some(args.iter().cloned().collect());
        cell.last_result = Some(result.clone());
        result
    }

    /// Clear the cached arguments and result.
    ///
    /// The override, if any, survives; only [`Memoized::clear_result`]
    /// removes it.
    pub fn reset(&self) {
        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cell.last_args = None;
        cell.last_result = None;
    }

    /// Force the cell to return `value` without computing.
    pub fn set_result(&self, value: Value) {
        self.cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .override_result = Some(value);
    }

    /// Remove a forced result installed by [`Memoized::set_result`].
    pub fn clear_result(&self) {
        self.cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .override_result = None;
    }
}

impl fmt::Debug for Memoized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").finish_non_exhaustive()
    }
}

/// Memoize a projection with reference-equality argument comparison.
#[must_use]
pub fn default_memoize(f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Memoized {
    Memoized::with_result_eq(Arc::new(f), None)
}

/// Memoize a projection, additionally comparing each newly computed
/// result to the previous one with `eq` and keeping the previous result
/// object when they are equal.
///
/// This gives referential stability to consumers that themselves memoize
/// on reference.
#[must_use]
pub fn result_memoize(
    f: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    eq: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
) -> Memoized {
    Memoized::with_result_eq(Arc::new(f), Some(Arc::new(eq)))
}

struct SelectorInner {
    /// Memoizes the whole `state -> value` mapping on the state reference.
    state_memo: Memoized,
    /// Memoizes the projector on the input selectors' outputs; `None` for
    /// root selectors, whose projector is the state function itself.
    projector_memo: Option<Memoized>,
    /// The raw combining function, exposed for direct testing.
    projector: ProjectorFn,
    inputs: SmallVec<[Selector; 4]>,
}

/// A memoized, composable projection over the state tree.
///
/// Cloning a selector shares its memo cells. See the module docs for the
/// evaluation model.
#[derive(Clone)]
pub struct Selector {
    inner: Arc<SelectorInner>,
}

impl Selector {
    /// Lift a plain projection into a root selector.
    ///
    /// The result is memoized on the state reference.
    #[must_use]
    pub fn from_fn(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        let projector: ProjectorFn = Arc::new(move |args: &[Value]| {
            args.first().map_or(Value::Null, |state| f(state))
        });
        Self {
            inner: Arc::new(SelectorInner {
                state_memo: Memoized::with_result_eq(Arc::clone(&projector), None),
                projector_memo: None,
                projector,
                inputs: SmallVec::new(),
            }),
        }
    }

    /// Evaluate the selector against the given root state.
    #[must_use]
    pub fn eval(&self, state: &Value) -> Value {
        self.inner.state_memo.call(std::slice::from_ref(state))
    }

    /// Invoke the raw combining function, bypassing all memoization.
    ///
    /// For composed selectors the arguments are the input selectors'
    /// values; for root selectors the single argument is the state.
    #[must_use]
    pub fn project(&self, args: &[Value]) -> Value {
        (self.inner.projector)(args)
    }

    /// Reset this selector's memo cells and, transitively, every input
    /// selector's cells.
    pub fn release(&self) {
        self.inner.state_memo.reset();
        if let Some(memo) = &self.inner.projector_memo {
            memo.reset();
        }
        for input in &self.inner.inputs {
            input.release();
        }
    }

    /// Force this selector to yield `value`, bypassing computation.
    ///
    /// Intended for tests that pin a selector's output without building
    /// the corresponding state.
    pub fn set_result(&self, value: Value) {
        self.inner.state_memo.set_result(value);
    }

    /// Remove a forced result installed by [`Selector::set_result`].
    pub fn clear_result(&self) {
        self.inner.state_memo.clear_result();
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("inputs", &self.inner.inputs.len())
            .finish()
    }
}

/// Compose a memoized selector from input selectors and a projector.
///
/// Builds two memo layers: the projector is memoized over the inputs'
/// current values, and the whole state mapping is memoized on the state
/// reference, so evaluating twice with the same root reference invokes
/// the projector exactly once.
#[must_use]
pub fn create_selector(
    inputs: &[&Selector],
    projector: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
) -> Selector {
    let projector: ProjectorFn = Arc::new(projector);
    let projector_memo = Memoized::with_result_eq(Arc::clone(&projector), None);
    let inputs: SmallVec<[Selector; 4]> = inputs.iter().map(|s| (*s).clone()).collect();

    let state_fn: ProjectorFn = {
        let inputs = inputs.clone();
        let projector_memo = projector_memo.clone();
        Arc::new(move |args: &[Value]| {
            let Some(state) = args.first() else {
                return Value::Null;
            };
            let values: SmallVec<[Value; 4]> =
                inputs.iter().map(|input| input.eval(state)).collect();
            projector_memo.call(&values)
        })
    };

    Selector {
        inner: Arc::new(SelectorInner {
            state_memo: Memoized::with_result_eq(state_fn, None),
            projector_memo: Some(projector_memo),
            projector,
            inputs,
        }),
    }
}

/// Build a selector reading one root key of the state tree.
///
/// An absent key is a non-fatal misconfiguration: in debug builds a
/// warning is logged, and the selector yields `Null`.
#[must_use]
pub fn create_feature_selector(name: &str) -> Selector {
    let name = name.to_string();
    Selector::from_fn(move |state| {
        state.get(&name).cloned().unwrap_or_else(|| {
            if cfg!(debug_assertions) {
                tracing::warn!(
                    feature = %name,
                    "feature selector read a key absent from state; \
                     was the feature's reducer added to the store?"
                );
            }
            Value::Null
        })
    })
}
