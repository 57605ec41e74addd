pub mod client;
pub mod models;
pub mod runtime;

pub use client::TelegramClient;
pub use models::{Message, Update};
pub use runtime::TelegramPlatform;
