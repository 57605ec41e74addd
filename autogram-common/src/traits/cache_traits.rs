// File: autogram-common/src/traits/cache_traits.rs

/// Minimal contract for anything the weighted cache can hold.
pub trait Weighted {
    /// Key under which the item is stored.
    fn id(&self) -> &str;

    /// Capacity cost counted against the cache limit.
    fn weight(&self) -> u64;
}
