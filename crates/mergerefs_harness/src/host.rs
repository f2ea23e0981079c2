//! Simulated host element
//!
//! [`HostElement`] applies the framework's native ref handling to a single
//! element: on every commit, if the node or the ref changed identity, the
//! outstanding assignment is cleaned up and the (new) ref is assigned the
//! (new) node. This is the behaviour a merged ref has to reproduce for each
//! of its inner refs, and it is also how a merged ref is itself driven.

use mergerefs_core::{assign_to_ref, Cleanup, RefSink};
use thiserror::Error;

/// Host contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("element is already mounted")]
    AlreadyMounted,

    #[error("element is not mounted")]
    NotMounted,
}

pub type Result<T> = std::result::Result<T, HostError>;

/// One element with a node slot and a ref prop
pub struct HostElement<T> {
    node: Option<T>,
    sink: Option<RefSink<T>>,
    attached: Option<Cleanup>,
    commits: u64,
}

impl<T> Default for HostElement<T> {
    fn default() -> Self {
        Self {
            node: None,
            sink: None,
            attached: None,
            commits: 0,
        }
    }
}

impl<T> HostElement<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the node and attach `sink` to it
    pub fn mount(&mut self, node: T, sink: Option<RefSink<T>>) -> Result<()> {
        if self.node.is_some() {
            return Err(HostError::AlreadyMounted);
        }
        self.commit(Some(node), sink);
        Ok(())
    }

    /// Re-render with a possibly different ref prop
    ///
    /// Before mount this only records the prop.
    pub fn render(&mut self, sink: Option<RefSink<T>>) {
        let node = self.node.clone();
        self.commit(node, sink);
    }

    /// Swap the underlying node, keeping the current ref prop
    pub fn replace_node(&mut self, node: T) -> Result<()> {
        if self.node.is_none() {
            return Err(HostError::NotMounted);
        }
        let sink = self.sink.clone();
        self.commit(Some(node), sink);
        Ok(())
    }

    /// Destroy the node, detaching the ref
    pub fn unmount(&mut self) -> Result<()> {
        if self.node.is_none() {
            return Err(HostError::NotMounted);
        }
        let sink = self.sink.clone();
        self.commit(None, sink);
        Ok(())
    }

    pub fn node(&self) -> Option<&T> {
        self.node.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.node.is_some()
    }

    /// Whether a ref currently holds the node
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Number of commits that changed the node or the ref
    pub fn commits(&self) -> u64 {
        self.commits
    }

    fn commit(&mut self, node: Option<T>, sink: Option<RefSink<T>>) {
        let node_changed = self.node != node;
        let sink_changed = match (&self.sink, &sink) {
            (Some(old), Some(new)) => !old.same_as(new),
            (None, None) => false,
            _ => true,
        };

        if node_changed || sink_changed {
            if let Some(cleanup) = self.attached.take() {
                cleanup.run();
            }
            if let (Some(node), Some(sink)) = (&node, &sink) {
                self.attached = Some(assign_to_ref(sink, node.clone()));
            }
            self.commits += 1;
            tracing::trace!(node_changed, sink_changed, "host commit touched ref");
        }

        self.node = node;
        self.sink = sink;
    }
}
