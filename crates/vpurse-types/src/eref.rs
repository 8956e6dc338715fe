//! Eventual references
//!
//! An [`ERef`] is either a settled value or a future that will produce one.
//! APIs that must reject unsettled input can inspect [`ERef::is_pending`]
//! before doing any work.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// A value that may still be awaiting resolution
pub enum ERef<T> {
    /// Resolved to its final object
    Ready(T),
    /// Awaiting resolution
    Pending(BoxFuture<'static, T>),
}

impl<T> ERef<T> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Wait for the final value
    pub async fn resolve(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }

    /// Take the settled value, or hand the reference back if still pending
    pub fn into_ready(self) -> std::result::Result<T, Self> {
        match self {
            Self::Ready(value) => Ok(value),
            pending => Err(pending),
        }
    }
}

impl<T> From<T> for ERef<T> {
    fn from(value: T) -> Self {
        Self::Ready(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for ERef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
