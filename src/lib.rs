pub mod commands;
pub mod config;
pub mod discord;
pub mod emoji;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod relay;
pub mod storage;
pub mod transcode;
pub mod twitch;

#[cfg(test)]
mod testing;

pub use error::{RelayError, Result};
