use std::sync::Arc;

use log::debug;
use tokio::sync::{mpsc, Mutex};

use crate::error::ProviderError;
use crate::types::{ConfigMessage, DiscoveryRecord, ProviderHints};

/// Single logical writer of the snapshot channel.
///
/// The initial pass and the watcher both publish through clones of the same
/// publisher; the mutex is held across the send so snapshots leave in the
/// order they were computed and never interleave.
#[derive(Clone)]
pub struct Publisher {
    tx: Arc<Mutex<mpsc::Sender<ConfigMessage>>>,
    hints: ProviderHints,
}

impl Publisher {
    pub fn new(tx: mpsc::Sender<ConfigMessage>, hints: ProviderHints) -> Self {
        Self {
            tx: Arc::new(Mutex::new(tx)),
            hints,
        }
    }

    /// Send a full-replacement snapshot, empty ones included.
    pub async fn publish(&self, records: Vec<DiscoveryRecord>) -> Result<(), ProviderError> {
        let count = records.len();
        let message = ConfigMessage::new(records, self.hints.clone());
        let tx = self.tx.lock().await;
        tx.send(message)
            .await
            .map_err(|_| ProviderError::ChannelClosed)?;
        debug!("Published snapshot with {} records", count);
        Ok(())
    }
}
