//! The dispatch pipeline: reentrancy-safe scheduling and the state
//! accumulator.
//!
//! Dispatched actions enter a FIFO queue guarded by a draining flag.
//! The first dispatch on the stack drains the queue; an action dispatched
//! synchronously from inside a subscriber callback is enqueued and
//! processed strictly after the in-flight action completes its full
//! reduce-and-publish cycle. This ordering is the pipeline's central
//! correctness property.
//!
//! Each queued action is paired with the reducer manager's most recently
//! published combined reducer at the moment it is processed, so a
//! topology change between two actions reduces the second one under the
//! new topology.
//!
//! The accumulator publishes the produced state to the state subject and
//! the just-applied action to the processed-actions subject. On a
//! reducer error it publishes neither, drops the rest of the queue, and
//! surfaces the error to the outermost dispatching caller.

use crate::error::StoreError;
use crate::manager::ReducerManager;
use crate::subject::Subject;
use statefold_core::action::Action;
use statefold_core::value::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Internal action seeding the pipeline at store construction.
pub const INIT: &str = "@statefold/store/init";

/// RAII guard clearing the draining flag even when a reducer errors.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) struct DispatchPipeline {
    queue: Mutex<VecDeque<Action>>,
    draining: AtomicBool,
    /// Whether the INIT action has produced the first state.
    initialized: AtomicBool,
    destroyed: AtomicBool,
    manager: Arc<ReducerManager>,
    pub(crate) state: Subject<Value>,
    pub(crate) actions: Subject<Action>,
}

impl DispatchPipeline {
    pub(crate) fn new(manager: Arc<ReducerManager>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            manager,
            state: Subject::new(Value::Null),
            actions: Subject::new(Action::new(INIT)),
        }
    }

    /// Public dispatch entry: validates the action's shape before it is
    /// enqueued.
    pub(crate) fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        if action.ty().is_empty() {
            return Err(StoreError::InvalidAction(
                "action type must be a non-empty string",
            ));
        }
        if action.is_internal() {
            return Err(StoreError::ReservedActionType(action.ty().to_string()));
        }
        self.dispatch_internal(action)
    }

    /// Dispatch entry for the engine's own bookkeeping actions.
    pub(crate) fn dispatch_internal(&self, action: Action) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(StoreError::Destroyed);
        }

        metrics::counter!("store.dispatch.total").increment(1);
        {
            let mut queue = self
                .queue
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            queue.push_back(action);
        }

        // Someone further up the stack is already draining; that call
        // will process the action we just queued.
        if self.draining.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _guard = DrainGuard(&self.draining);

        loop {
            let next = {
                let mut queue = self
                    .queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                queue.pop_front()
            };
            let Some(action) = next else {
                return Ok(());
            };
            if self.destroyed.load(Ordering::Acquire) {
                return Ok(());
            }
            if let Err(error) = self.process(&action) {
                // Nothing was published for the failed action; drop
                // whatever reentrant dispatches queued behind it.
                self.queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clear();
                return Err(error);
            }
        }
    }

    /// Reduce one action and publish the result.
    fn process(&self, action: &Action) -> Result<(), StoreError> {
        // Join with the latest published topology.
        let reducer = self.manager.current_reducer();

        let previous = self.state.value();
        let previous = self
            .initialized
            .load(Ordering::Acquire)
            .then_some(&previous);

        let span = tracing::debug_span!("reduce", action = %action.ty());
        let _enter = span.enter();

        let start = std::time::Instant::now();
        let next = reducer(previous, action)?;
        metrics::histogram!("store.reducer.duration_seconds").record(start.elapsed().as_secs_f64());

        self.initialized.store(true, Ordering::Release);
        self.state.next(next);
        self.actions.next(action.clone());
        tracing::trace!(action = %action.ty(), "action processed");
        Ok(())
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Complete the state and action streams exactly once.
    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.complete();
        self.actions.complete();
        metrics::counter!("store.destroyed").increment(1);
        tracing::debug!("store destroyed");
    }
}

impl std::fmt::Debug for DispatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPipeline")
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use statefold_core::composition::{combine_factory, create_reducer_factory, ReducerMap};
    use statefold_core::obj;
    use statefold_core::reducer::reducer_fn;

    fn pipeline_with_counter() -> Arc<DispatchPipeline> {
        let mut map = ReducerMap::new();
        map.insert(
            "counter".to_string(),
            reducer_fn(|state, action| {
                let count = state
                    .and_then(|s| s.get("count"))
                    .and_then(Value::as_int)
                    .unwrap_or(0);
                let next = match action.ty() {
                    "increment" => count + 1,
                    _ => count,
                };
                Ok(obj! { "count" => next })
            }),
        );
        let factory = create_reducer_factory(combine_factory(), &[]);
        let manager = Arc::new(ReducerManager::new(map, None, factory));
        let pipeline = Arc::new(DispatchPipeline::new(manager));
        pipeline.dispatch_internal(Action::new(INIT)).unwrap();
        pipeline
    }

    #[test]
    fn init_seeds_state_and_action_streams() {
        let pipeline = pipeline_with_counter();
        assert_eq!(
            pipeline.state.value().at_path(&["counter", "count"]),
            Some(&Value::Int(0))
        );
        assert_eq!(pipeline.actions.value().ty(), INIT);
    }

    #[test]
    fn public_dispatch_rejects_reserved_and_empty_types() {
        let pipeline = pipeline_with_counter();
        assert!(matches!(
            pipeline.dispatch(Action::new("@statefold/store/init")),
            Err(StoreError::ReservedActionType(_))
        ));
        assert!(matches!(
            pipeline.dispatch(Action::new("")),
            Err(StoreError::InvalidAction(_))
        ));
    }

    #[test]
    fn reentrant_dispatch_is_processed_after_the_in_flight_action() {
        let pipeline = pipeline_with_counter();
        let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&pipeline);
        let sink = Arc::clone(&seen);
        let redispatched = AtomicBool::new(false);
        let _sub = pipeline.state.subscribe(move |state| {
            let count = state
                .at_path(&["counter", "count"])
                .and_then(Value::as_int)
                .unwrap_or(-1);
            sink.lock().unwrap().push(count);
            if count == 1 && !redispatched.swap(true, Ordering::SeqCst) {
                // Dispatching from inside a subscriber must queue, not
                // interleave.
                inner.dispatch(Action::new("increment")).unwrap();
            }
        });

        pipeline.dispatch(Action::new("increment")).unwrap();
        // Emissions: replay(0), first increment(1), queued increment(2).
        assert_eq!(&*seen.lock().unwrap(), &[0, 1, 2]);
    }

    #[test]
    fn destroyed_pipeline_rejects_dispatch() {
        let pipeline = pipeline_with_counter();
        pipeline.destroy();
        pipeline.destroy(); // idempotent
        assert!(matches!(
            pipeline.dispatch(Action::new("increment")),
            Err(StoreError::Destroyed)
        ));
    }
}
