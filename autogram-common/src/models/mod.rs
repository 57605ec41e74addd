// File: autogram-common/src/models/mod.rs
pub mod cache;
pub mod media;
pub mod platform;
pub mod settings;

pub use cache::CacheStats;
pub use media::MediaFile;
pub use platform::Platform;
pub use settings::Settings;
