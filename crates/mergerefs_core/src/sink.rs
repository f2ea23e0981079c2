//! Ref sinks and the assignment primitive
//!
//! A ref sink is whatever a component hands to an element to learn about its
//! host node. Two shapes exist, mirroring what retained UI frameworks accept:
//!
//! - [`RefCallback`]: called with `Some(node)` on attach. It may return a
//!   [`Cleanup`]; if it does not, it is called again with `None` on detach.
//! - [`RefObject`]: a shared cell whose `current` slot is written on attach
//!   and reset to `None` on detach.
//!
//! Sink identity is the identity of the shared allocation behind the handle,
//! so cloning a handle keeps it "the same ref" while building a new one from
//! the same closure does not.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A cleanup action produced by assigning a value to a ref
pub struct Cleanup(Box<dyn FnOnce() + Send>);

impl Cleanup {
    /// Wrap a closure as a cleanup action
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Run the cleanup, consuming it
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

type CallbackFn<T> = dyn Fn(Option<T>) -> Option<Cleanup> + Send + Sync;

/// A callback ref
///
/// Cloning shares the underlying callback, so clones compare as the same ref.
pub struct RefCallback<T> {
    inner: Arc<CallbackFn<T>>,
}

impl<T> RefCallback<T> {
    /// Create a callback ref that may return a cleanup when attached
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<T>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Create a callback ref without cleanup; it receives `None` on detach
    pub fn simple<F>(f: F) -> Self
    where
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        Self::new(move |value| {
            f(value);
            None
        })
    }

    /// Create a callback ref that returns a cleanup from its setup
    ///
    /// The setup closure only ever sees attached values; detaching runs the
    /// returned cleanup instead of calling back with `None`.
    pub fn with_cleanup<S, C>(setup: S) -> Self
    where
        S: Fn(T) -> C + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self::new(move |value| value.map(|v| Cleanup::new(setup(v))))
    }

    /// Invoke the callback directly
    pub fn call(&self, value: Option<T>) -> Option<Cleanup> {
        (self.inner)(value)
    }

    /// Whether both handles point at the same callback
    pub fn ptr_eq(&self, other: &Self) -> bool {
        // Data address only; vtable pointers may differ for the same closure.
        Arc::as_ptr(&self.inner) as *const () == Arc::as_ptr(&other.inner) as *const ()
    }
}

impl<T> Clone for RefCallback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for RefCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCallback")
            .field("ptr", &(Arc::as_ptr(&self.inner) as *const ()))
            .finish()
    }
}

/// An object ref with a `current` slot
///
/// Cloning shares the slot.
pub struct RefObject<T> {
    current: Arc<Mutex<Option<T>>>,
}

impl<T> RefObject<T> {
    /// Create an empty object ref
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an object ref holding an initial value
    pub fn with_value(value: T) -> Self {
        Self {
            current: Arc::new(Mutex::new(Some(value))),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a copy of the current value
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot().clone()
    }

    /// Access the current value by reference
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.slot().as_ref())
    }

    /// Overwrite the current value
    pub fn set(&self, value: Option<T>) {
        *self.slot() = value;
    }

    /// Whether the slot currently holds a value
    pub fn is_set(&self) -> bool {
        self.slot().is_some()
    }

    /// Whether both handles share the same slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.current, &other.current)
    }
}

impl<T> Default for RefObject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RefObject<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RefObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefObject")
            .field("current", &*self.slot())
            .finish()
    }
}

/// Any ref a component can pass to an element
pub enum RefSink<T> {
    Callback(RefCallback<T>),
    Object(RefObject<T>),
}

impl<T> RefSink<T> {
    /// Identity comparison: same shape and same shared allocation
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (RefSink::Callback(a), RefSink::Callback(b)) => a.ptr_eq(b),
            (RefSink::Object(a), RefSink::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl<T> Clone for RefSink<T> {
    fn clone(&self) -> Self {
        match self {
            RefSink::Callback(cb) => RefSink::Callback(cb.clone()),
            RefSink::Object(obj) => RefSink::Object(obj.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RefSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSink::Callback(cb) => cb.fmt(f),
            RefSink::Object(obj) => obj.fmt(f),
        }
    }
}

impl<T> From<RefCallback<T>> for RefSink<T> {
    fn from(cb: RefCallback<T>) -> Self {
        RefSink::Callback(cb)
    }
}

impl<T> From<RefObject<T>> for RefSink<T> {
    fn from(obj: RefObject<T>) -> Self {
        RefSink::Object(obj)
    }
}

/// Assign `value` to `sink` and return the matching cleanup
///
/// Must not be called again on the same sink before the returned cleanup
/// has run.
pub fn assign_to_ref<T>(sink: &RefSink<T>, value: T) -> Cleanup
where
    T: Send + 'static,
{
    match sink {
        RefSink::Callback(cb) => match cb.call(Some(value)) {
            Some(cleanup) => cleanup,
            None => {
                let cb = cb.clone();
                Cleanup::new(move || {
                    // A cleanup handed back on detach has nothing left to clean.
                    drop(cb.call(None));
                })
            }
        },
        RefSink::Object(obj) => {
            obj.set(Some(value));
            let obj = obj.clone();
            Cleanup::new(move || obj.set(None))
        }
    }
}
