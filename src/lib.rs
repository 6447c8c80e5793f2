//! sampler-sync - state synchronizer for the sampler plugin
//!
//! Keeps a local copy of the plugin's state in sync over a WebSocket,
//! exposes typed reads and fire-and-forget commands through [`SyncHandle`],
//! and notifies subscribers with [`UiEvent`]s.
//!
//! ```no_run
//! use sampler_sync::{AppConfig, Endpoint, SyncHandle, SyncSettings};
//! # async fn demo() -> anyhow::Result<()> {
//! let config = AppConfig::load("sampler-sync.yaml").await?;
//! let handle = SyncHandle::connect(
//!     Endpoint::from(&config.connection),
//!     std::time::Duration::from_millis(config.sync.reconnect_delay_ms),
//!     SyncSettings::from(&config.sync),
//! );
//! handle.play_sound("some-uuid");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod state;
pub mod sync;

pub use config::AppConfig;
pub use connection::{ConnectionStatus, Endpoint, TransportMode};
pub use sync::{SyncHandle, SyncSettings, UiEvent};
