//! Registry update semantics
//!
//! Engine setters take a [`Patch`]: plain values merge into the current
//! registry, while a function replaces it with whatever it returns.

/// Merging behavior for a registry type
pub trait Merge: Sized {
    /// Combine `self` with `next`, with `next` winning on conflicts
    fn merge(self, next: Self) -> Self;
}

/// An update to a registry: a value to merge in, or a function computing
/// the replacement from the current state
pub enum Patch<T> {
    Merge(T),
    Apply(Box<dyn FnOnce(T) -> T + Send>),
}

impl<T: Merge> Patch<T> {
    /// Build a replacing patch from a function over the current registry
    pub fn apply<F>(f: F) -> Self
    where
        F: FnOnce(T) -> T + Send + 'static,
    {
        Patch::Apply(Box::new(f))
    }

    /// Produce the next registry state from the current one
    pub fn resolve(self, current: T) -> T {
        match self {
            Patch::Merge(value) => current.merge(value),
            Patch::Apply(f) => f(current),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Merge(value)
    }
}
