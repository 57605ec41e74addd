// src/lib.rs

pub mod cache;
pub mod eventbus;
pub mod media_server;
pub mod platforms;
pub mod services;

pub use autogram_common::error::Error;
pub use cache::{Cache, CacheConfig};
