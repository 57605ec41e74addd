pub mod media_resolver;
pub mod relay;
pub mod settings_store;

pub use media_resolver::{MediaResolver, MediaSource};
pub use relay::RelayService;
pub use settings_store::SettingsStore;
