//! Docker discovery provider.
//!
//! Connects to a Docker daemon (standalone engine or swarm manager),
//! enumerates running workloads into [`DiscoveryRecord`]s and streams full
//! snapshots to a consumer, re-enumerating whenever daemon events say the
//! set may have changed.

pub mod backoff;
pub mod config;
pub mod discovery;
pub mod error;
pub mod provider;
pub mod publish;
pub mod runtime;
pub mod types;
pub mod watcher;

pub use config::Config;
pub use error::{ConnectionError, ProviderError};
pub use provider::Provider;
pub use types::{ConfigMessage, DiscoveryRecord, ProviderHints};
