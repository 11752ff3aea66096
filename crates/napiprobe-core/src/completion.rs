//! What a probe hands back to the managed caller.

/// Outcome of a probe that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion<V> {
    /// A JS-visible value.
    Return(V),
    /// The success marker (`undefined`). An exception the probe deliberately
    /// left pending still propagates to the caller.
    Success,
    /// No JS-visible value; the probe threw into the managed environment.
    Throw,
}

impl<V> Completion<V> {
    #[must_use]
    pub fn value(self) -> Option<V> {
        match self {
            Self::Return(value) => Some(value),
            Self::Success | Self::Throw => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Return(_) => "return",
            Self::Success => "success",
            Self::Throw => "throw",
        }
    }
}
