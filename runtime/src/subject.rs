//! Replay-one broadcast primitive and subscription handles.
//!
//! A [`Subject`] holds a current value and a list of synchronous
//! subscriber callbacks. New subscribers immediately receive the current
//! value; every [`Subject::next`] delivers to all live subscribers on the
//! calling stack. A subject can be completed exactly once, by its owner;
//! a [`Subscription`] handle can only remove its own callback, so no
//! downstream consumer can kill the stream for everyone else.
//!
//! The subscriber list is snapshotted before callbacks run, so callbacks
//! may subscribe, unsubscribe, or dispatch reentrantly without holding
//! any lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SubEntry<T> {
    id: u64,
    callback: Callback<T>,
}

type SubscriberList<T> = Arc<Mutex<Vec<SubEntry<T>>>>;

/// A replay-one broadcast stream.
pub struct Subject<T> {
    current: Mutex<T>,
    subscribers: SubscriberList<T>,
    next_id: AtomicU64,
    completed: AtomicBool,
}

impl<T: Clone + 'static> Subject<T> {
    /// Create a subject seeded with an initial current value.
    #[must_use]
    pub fn new(seed: T) -> Self {
        Self {
            current: Mutex::new(seed),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            completed: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn value(&self) -> T {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Publish a new value to all subscribers.
    ///
    /// Ignored after completion.
    pub fn next(&self, value: T) {
        if self.completed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = value.clone();
        }
        // Snapshot so callbacks run without the list lock held.
        let callbacks: Vec<Callback<T>> = {
            let subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            subscribers.iter().map(|s| Arc::clone(&s.callback)).collect()
        };
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Register a subscriber and immediately replay the current value.
    ///
    /// After completion this returns an inert handle and delivers
    /// nothing.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        if self.completed.load(Ordering::Acquire) {
            return Subscription::inert();
        }
        let callback: Callback<T> = Arc::new(callback);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            subscribers.push(SubEntry {
                id,
                callback: Arc::clone(&callback),
            });
        }

        callback(&self.value());

        let list: Weak<Mutex<Vec<SubEntry<T>>>> = Arc::downgrade(&self.subscribers);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                let mut subscribers = list
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                subscribers.retain(|entry| entry.id != id);
            }
        })
    }

    /// Complete the subject: drop all subscribers and ignore further
    /// values. Idempotent.
    pub fn complete(&self) {
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Whether the subject has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Handle for cancelling one subscription.
///
/// Dropping the handle does *not* cancel: a subscription stays live for
/// the stream's lifetime unless [`Subscription::unsubscribe`] is called.
/// Unsubscribing affects no other subscriber.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that cancels nothing, for already-completed streams.
    #[must_use]
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Remove this subscriber from the stream.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn recording_subject() -> (Arc<Subject<i64>>, Arc<Mutex<Vec<i64>>>) {
        let subject = Arc::new(Subject::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        (subject, seen)
    }

    #[test]
    fn subscribe_replays_current_value() {
        let (subject, seen) = recording_subject();
        subject.next(5);

        let sink = Arc::clone(&seen);
        let _sub = subject.subscribe(move |v| sink.lock().unwrap().push(*v));
        assert_eq!(&*seen.lock().unwrap(), &[5]);
    }

    #[test]
    fn next_broadcasts_to_all_subscribers() {
        let (subject, seen) = recording_subject();
        let sink_a = Arc::clone(&seen);
        let sink_b = Arc::clone(&seen);
        let _a = subject.subscribe(move |v| sink_a.lock().unwrap().push(*v));
        let _b = subject.subscribe(move |v| sink_b.lock().unwrap().push(*v * 10));

        subject.next(2);
        assert_eq!(&*seen.lock().unwrap(), &[0, 0, 2, 20]);
    }

    #[test]
    fn unsubscribe_stops_delivery_without_affecting_others() {
        let (subject, seen) = recording_subject();
        let sink_a = Arc::clone(&seen);
        let sink_b = Arc::clone(&seen);
        let sub_a = subject.subscribe(move |v| sink_a.lock().unwrap().push(*v));
        let _sub_b = subject.subscribe(move |v| sink_b.lock().unwrap().push(*v + 100));

        sub_a.unsubscribe();
        subject.next(1);
        assert_eq!(&*seen.lock().unwrap(), &[0, 100, 101]);
        assert_eq!(subject.subscriber_count(), 1);
    }

    #[test]
    fn complete_is_idempotent_and_final() {
        let (subject, seen) = recording_subject();
        let sink = Arc::clone(&seen);
        let _sub = subject.subscribe(move |v| sink.lock().unwrap().push(*v));

        subject.complete();
        subject.complete();
        subject.next(9);

        assert_eq!(&*seen.lock().unwrap(), &[0]);
        assert!(subject.is_completed());
        assert!(matches!(
            subject.subscribe(|_| {}),
            Subscription { cancel: None }
        ));
    }
}
