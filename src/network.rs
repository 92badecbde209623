//! # Network & Policy Monitor
//!
//! Tracks connectivity transitions and decides whether the user's upload
//! policy allows syncing on the current connection.
//!
//! The platform layer (or the reachability probe in the binary) reports
//! connectivity through [`NetworkMonitor::set`]; the sync driver subscribes
//! and starts a cycle as soon as connectivity is regained.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Offline,
    Wifi,
    Cellular,
}

impl Connectivity {
    pub fn is_online(&self) -> bool {
        !matches!(self, Connectivity::Offline)
    }
}

/// The user's "cellular data saving" setting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadPolicy {
    #[serde(default)]
    pub wifi_only: bool,
}

impl UploadPolicy {
    /// Whether uploads may run on the given connection
    pub fn allows(&self, connectivity: Connectivity) -> bool {
        match connectivity {
            Connectivity::Offline => false,
            Connectivity::Wifi => true,
            Connectivity::Cellular => !self.wifi_only,
        }
    }

    /// Reason shown when a cycle is deferred
    pub fn deferral_reason(&self, connectivity: Connectivity) -> Option<&'static str> {
        match connectivity {
            Connectivity::Offline => Some("offline"),
            Connectivity::Cellular if self.wifi_only => Some("waiting for Wi-Fi"),
            _ => None,
        }
    }
}

/// Shared connectivity state; clones observe the same channel
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl NetworkMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// Reports a connectivity observation; returns true on an offline → online transition
    pub fn set(&self, connectivity: Connectivity) -> bool {
        let previous = self.tx.send_replace(connectivity);
        let regained = !previous.is_online() && connectivity.is_online();
        if previous != connectivity {
            log::info!("Connectivity changed: {:?} -> {:?}", previous, connectivity);
        }
        regained
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}
