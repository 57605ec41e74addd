//! Attachment cache.
//!
//! A weight-bounded cache run as a single serialized actor:
//!
//! - [`Store`] keeps the entries together with hit counts and access stamps
//!   and picks eviction victims (fewest hits first, oldest access among those).
//! - [`Resolver`] produces entries on a miss, with a verdict on whether the
//!   result may be kept.
//! - [`Cache`] is the handle callers use; it only offers `get` and `stats`.

pub mod actor;
pub mod resolver;
pub mod store;

pub use actor::{Cache, CacheConfig, DEFAULT_QUEUE_CAPACITY};
pub use resolver::{FnResolver, Resolution, Resolver};
pub use store::{Admission, Store};
pub use autogram_common::models::CacheStats;
