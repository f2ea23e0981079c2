//! Stored refs
//!
//! A [`StoredRef`] pairs a sink with the cleanup produced by its last
//! assignment. The cleanup is present exactly while the sink holds the
//! attached host value.

use crate::maybe::MaybeValue;
use crate::sink::{assign_to_ref, Cleanup, RefSink};

/// A ref sink plus the cleanup of its outstanding assignment, if any
#[derive(Debug)]
pub struct StoredRef<T> {
    sink: RefSink<T>,
    cleanup: Option<Cleanup>,
}

impl<T> StoredRef<T>
where
    T: Clone + Send + 'static,
{
    /// Store `sink`, assigning the host value right away if there is one
    pub fn new(sink: RefSink<T>, maybe_value: &MaybeValue<T>) -> Self {
        let cleanup = maybe_value
            .as_present()
            .map(|value| assign_to_ref(&sink, value.clone()));
        Self { sink, cleanup }
    }

    /// Assign `value`, replacing the stored cleanup
    ///
    /// The previous cleanup is not run. Callers guarantee it already ran or
    /// that this record is fresh.
    pub fn assign(&mut self, value: T) {
        let cleanup = assign_to_ref(&self.sink, value);
        self.set_cleanup(cleanup);
    }

    /// Run the outstanding cleanup, if any
    pub fn cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.run();
        }
    }
}

impl<T> StoredRef<T> {
    /// Store `sink` without assigning anything
    pub fn unassigned(sink: RefSink<T>) -> Self {
        Self {
            sink,
            cleanup: None,
        }
    }

    pub fn sink(&self) -> &RefSink<T> {
        &self.sink
    }

    /// Record the cleanup of an assignment made outside this record
    ///
    /// Like [`StoredRef::assign`], an outstanding cleanup is dropped without
    /// running.
    pub fn set_cleanup(&mut self, cleanup: Cleanup) {
        if self.cleanup.is_some() {
            tracing::warn!("assigning a ref that still holds an attached value");
        }
        self.cleanup = Some(cleanup);
    }

    /// Take the outstanding cleanup without running it
    pub fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }

    /// Whether the sink currently holds an attached value
    pub fn is_assigned(&self) -> bool {
        self.cleanup.is_some()
    }
}
