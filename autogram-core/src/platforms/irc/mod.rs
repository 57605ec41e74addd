pub mod client;
pub mod runtime;

pub use client::{IrcClient, IrcConnectConfig, IrcIncomingEvent, IrcMessage};
pub use runtime::{IrcPlatform, IrcSender};
