pub mod cache_traits;

pub use cache_traits::Weighted;
