pub mod auth;
pub mod client;
pub mod config;
pub mod detect;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod providers;
pub mod snapshots;

pub use config::Config;
pub use error::{Result, SnapshotError};
