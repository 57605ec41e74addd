// File: autogram-core/src/cache/resolver.rs

use std::future::Future;

use async_trait::async_trait;

/// Result of resolving a cache miss.
///
/// A non-cacheable resolution is still a valid answer for the caller (for
/// example a placeholder payload after a failed download); it is simply not
/// retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<E> {
    pub entry: E,
    pub cacheable: bool,
}

impl<E> Resolution<E> {
    pub fn cached(entry: E) -> Self {
        Self { entry, cacheable: true }
    }

    pub fn transient(entry: E) -> Self {
        Self { entry, cacheable: false }
    }
}

/// Produces entries for identifiers the cache does not hold.
///
/// Implementations must not fail: errors are turned into a transient
/// resolution by the implementor. The returned entry must carry the
/// requested id; the cache serves a mismatched entry but never keeps it.
#[async_trait]
pub trait Resolver<E>: Send + Sync + 'static {
    async fn resolve(&self, id: &str) -> Resolution<E>;
}

/// A resolver backed by an async closure taking the owned identifier.
pub struct FnResolver<F>(pub F);

#[async_trait]
impl<E, F, Fut> Resolver<E> for FnResolver<F>
where
    E: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Resolution<E>> + Send + 'static,
{
    async fn resolve(&self, id: &str) -> Resolution<E> {
        (self.0)(id.to_string()).await
    }
}
