//! Observable values with synchronous delivery.
//!
//! A [`Signal`] holds a current value and an ordered list of observers. Every
//! [`Signal::set`] stores the new value and then calls each observer on the
//! calling thread, in the order the observers were registered. Observers run
//! outside the signal's locks, so they may read the signal (or the object
//! that owns it) without deadlocking.
//!
//! Async consumers use [`Signal::watch`] / [`Signal::wait_for`], which are
//! backed by a [`tokio::sync::watch`] channel updated on every `set`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    next_id: AtomicU64,
    watch_tx: watch::Sender<T>,
}

/// A shared, observable value.
///
/// Cloning a `Signal` yields another handle to the same value and observer
/// list.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.inner.value.read())
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a signal holding `initial`.
    pub fn new(initial: T) -> Self {
        let (watch_tx, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                watch_tx,
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Store `value` and notify every observer, in registration order.
    ///
    /// Observers are notified even when the value did not change.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        let _ = self.inner.watch_tx.send_replace(value.clone());

        let observers: Vec<Observer<T>> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&value);
        }
    }

    /// Register an observer and immediately call it with the current value.
    pub fn subscribe<F>(&self, observer: F) -> Observation
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);
        observer(&self.get());
        self.register(observer)
    }

    /// Register an observer that only sees future values.
    pub fn observe<F>(&self, observer: F) -> Observation
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(observer))
    }

    /// Async view of the signal. The receiver starts at the current value.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.inner.watch_tx.subscribe()
    }

    /// Wait until the value satisfies `predicate` and return it.
    pub async fn wait_for<F>(&self, predicate: F) -> T
    where
        F: Fn(&T) -> bool,
    {
        let mut rx = self.watch();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        match rx.wait_for(|value| predicate(value)).await {
            Ok(value) => value.clone(),
            Err(_) => self.get(),
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    fn register(&self, observer: Observer<T>) -> Observation {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, observer));

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Observation::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.lock().retain(|(oid, _)| *oid != id);
            }
        })
    }
}

/// Handle to a registered observer.
///
/// Dropping the handle does **not** cancel the observer; call
/// [`Observation::cancel`] explicitly. Cancelling is idempotent.
pub struct Observation {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Observation {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Stop delivering values to this observer.
    pub fn cancel(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether the observer is still registered through this handle.
    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("active", &self.is_active())
            .finish()
    }
}
