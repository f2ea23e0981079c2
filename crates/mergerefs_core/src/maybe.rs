//! Optional host value
//!
//! The host value type may itself be nullable (`T = Option<Node>`), so
//! "never observed" cannot be folded into `None`.

/// A host value that may or may not have been observed yet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaybeValue<T> {
    /// No host value observed, or the last one was detached
    Absent,
    /// The currently attached host value
    Present(T),
}

impl<T> Default for MaybeValue<T> {
    fn default() -> Self {
        MaybeValue::Absent
    }
}

impl<T> MaybeValue<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, MaybeValue::Present(_))
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            MaybeValue::Present(value) => Some(value),
            MaybeValue::Absent => None,
        }
    }

    /// Take the value out, leaving `Absent`
    pub fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            MaybeValue::Present(value) => Some(value),
            MaybeValue::Absent => None,
        }
    }
}
