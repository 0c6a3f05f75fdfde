//! Callback registrations shared by session subscriptions and auth-change observers.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use tokio::task::AbortHandle;

type Listener<T> = Box<dyn FnMut(T) + Send>;

/// Holds a registered callback until it is detached.
///
/// Once detached, `notify` never reaches the callback again and the callback
/// itself is dropped as soon as no invocation is running.
pub struct ListenerSlot<T> {
    listener: Mutex<Option<Listener<T>>>,
    closed: AtomicBool,
}

impl<T> ListenerSlot<T> {
    /// Register `listener`.
    pub fn new(listener: impl FnMut(T) + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            listener: Mutex::new(Some(Box::new(listener))),
            closed: AtomicBool::new(false),
        })
    }

    /// Invoke the callback with `value` unless the slot was detached.
    ///
    /// Returns `false` once the slot is detached so forwarders can stop.
    pub fn notify(&self, value: T) -> bool {
        if self.is_closed() {
            return false;
        }

        let mut guard = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            guard.take();
            return false;
        }
        let Some(listener) = guard.as_mut() else {
            return false;
        };
        listener(value);

        // the callback may have detached itself while running
        if self.is_closed() {
            guard.take();
            return false;
        }
        true
    }

    /// Whether the slot was detached.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Detach the slot: no later `notify` reaches the callback, which is dropped
    /// unless an invocation is running.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Busy means an invocation is running, possibly the one detaching us;
        // `notify` drops the callback when it returns.
        if let Ok(mut guard) = self.listener.try_lock() {
            guard.take();
        }
    }
}

trait Detach: Send + Sync {
    fn detach(&self);
    fn is_detached(&self) -> bool;
}

impl<T: 'static> Detach for ListenerSlot<T> {
    fn detach(&self) {
        self.close();
    }

    fn is_detached(&self) -> bool {
        self.is_closed()
    }
}

/// Handle returned by every subscribe-style operation.
///
/// `unsubscribe` is idempotent and may be called from inside the callback.
/// Dropping the handle unsubscribes as well.
pub struct Subscription {
    slot: Arc<dyn Detach>,
    task: Option<AbortHandle>,
}

impl Subscription {
    /// Handle for a slot notified synchronously by its owner.
    pub fn new<T: 'static>(slot: Arc<ListenerSlot<T>>) -> Self {
        Self { slot, task: None }
    }

    /// Handle for a slot fed by a background task, aborted on unsubscribe.
    pub fn with_task<T: 'static>(slot: Arc<ListenerSlot<T>>, task: AbortHandle) -> Self {
        Self {
            slot,
            task: Some(task),
        }
    }

    /// Whether deliveries may still arrive.
    ///
    /// Turns false after `unsubscribe`, and also once the feeding task has
    /// ended on its own because its source closed or failed.
    pub fn is_active(&self) -> bool {
        !self.slot.is_detached() && !self.task.as_ref().is_some_and(AbortHandle::is_finished)
    }

    /// Stop deliveries and release the callback.
    pub fn unsubscribe(&self) {
        self.slot.detach();
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("task", &self.task.as_ref().map(AbortHandle::id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn notify_reaches_listener_until_unsubscribed() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let slot = ListenerSlot::new(move |value: usize| {
            counter.fetch_add(value, Ordering::SeqCst);
        });
        let subscription = Subscription::new(slot.clone());

        assert!(slot.notify(2));
        assert!(subscription.is_active());
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        subscription.unsubscribe();
        assert!(!slot.notify(5));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_releases_the_callback() {
        let captured = Arc::new(());
        let held = captured.clone();
        let slot = ListenerSlot::new(move |_: ()| {
            let _ = &held;
        });
        assert_eq!(Arc::strong_count(&captured), 2);

        drop(Subscription::new(slot.clone()));
        assert_eq!(Arc::strong_count(&captured), 1);
        assert!(slot.is_closed());
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let handle: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = handle.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let slot = ListenerSlot::new(move |_: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = inner.lock().unwrap().as_ref() {
                subscription.unsubscribe();
            }
        });
        *handle.lock().unwrap() = Some(Subscription::new(slot.clone()));

        assert!(!slot.notify(()));
        assert!(!slot.notify(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
