// File: autogram-common/src/models/platform.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// The two chat networks the bridge sits between.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Irc,
    Telegram,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Irc => write!(f, "irc"),
            Platform::Telegram => write!(f, "telegram"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "irc" => Ok(Platform::Irc),
            "telegram" => Ok(Platform::Telegram),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}
