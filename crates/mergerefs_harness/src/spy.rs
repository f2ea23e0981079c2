//! Recording refs for diagnostics
//!
//! A spy hands out refs that record every call into a shared log. Each call
//! to [`RefSpy::callback`] or [`RefSpy::callback_with_cleanup`] builds a new
//! ref identity; cache the result to model a stable ref, or call again on
//! every rebuild to model an unstable one.

use mergerefs_core::{Cleanup, RefCallback, RefObject};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One observed call on a spied ref
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefCall<T> {
    /// Attached with a value
    Set(T),
    /// Called with the absence value
    Null,
    /// The returned cleanup ran
    Cleanup,
}

/// Records the calls made on refs handed out by this spy
pub struct RefSpy<T> {
    name: String,
    calls: Arc<Mutex<Vec<RefCall<T>>>>,
}

impl<T> Clone for RefSpy<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> RefSpy<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn log(&self) -> MutexGuard<'_, Vec<RefCall<T>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A new callback ref that is called with `None` on detach
    pub fn callback(&self) -> RefCallback<T> {
        let calls = Arc::clone(&self.calls);
        RefCallback::simple(move |value: Option<T>| {
            let call = match value {
                Some(value) => RefCall::Set(value),
                None => RefCall::Null,
            };
            calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
        })
    }

    /// A new callback ref that returns a cleanup
    pub fn callback_with_cleanup(&self) -> RefCallback<T> {
        let calls = Arc::clone(&self.calls);
        RefCallback::new(move |value: Option<T>| {
            let mut log = calls.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(value) = value else {
                log.push(RefCall::Null);
                return None;
            };
            log.push(RefCall::Set(value));
            let calls = Arc::clone(&calls);
            Some(Cleanup::new(move || {
                calls
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(RefCall::Cleanup);
            }))
        })
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<RefCall<T>> {
        self.log().clone()
    }

    /// Number of attach calls
    pub fn setups(&self) -> usize {
        self.log()
            .iter()
            .filter(|call| matches!(call, RefCall::Set(_)))
            .count()
    }

    /// Number of detach calls, whether through `None` or a cleanup
    pub fn cleanups(&self) -> usize {
        self.log()
            .iter()
            .filter(|call| matches!(call, RefCall::Null | RefCall::Cleanup))
            .count()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

/// An object ref under a diagnostic name
pub struct ObjectSpy<T> {
    name: String,
    object: RefObject<T>,
}

impl<T> Clone for ObjectSpy<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            object: self.object.clone(),
        }
    }
}

impl<T: Clone> ObjectSpy<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: RefObject::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The spied object ref
    pub fn object(&self) -> &RefObject<T> {
        &self.object
    }

    /// Point the spy at a new object ref, as an unstable consumer would
    pub fn renew(&mut self) -> &RefObject<T> {
        self.object = RefObject::new();
        &self.object
    }

    pub fn current(&self) -> Option<T> {
        self.object.get()
    }
}
