//! Torrent client backends the reconciliation engine pushes updates into.

pub mod transmission;

use crate::config::RpcSettings;
use crate::core::record::TorrentRecord;
use crate::error::BackendError;
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub use transmission::TransmissionBackend;

/// Backend-specific parameters of a live torrent, carried over to its replacement.
pub type TorrentParams = BTreeMap<String, serde_json::Value>;

/// Download location parameter, understood by every backend.
pub const PARAM_DOWNLOAD_TO: &str = "download_to";

/// A torrent as the backend currently holds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTorrent {
    pub hash: String,
    pub name: String,
    /// Torrent comment, usually the tracker page URL.
    pub comment: Option<String>,
    pub params: TorrentParams,
}

#[async_trait]
pub trait RpcBackend: Send + Sync {
    fn alias(&self) -> &str;

    /// Torrents with the given hashes; all torrents when `hashes` is empty.
    async fn list_torrents(&self, hashes: &[String]) -> Result<Vec<LiveTorrent>, BackendError>;

    async fn add_torrent(&self, record: &TorrentRecord, params: &TorrentParams) -> Result<(), BackendError>;

    async fn remove_torrent(&self, hash: &str, with_data: bool) -> Result<(), BackendError>;

    async fn test_configuration(&self) -> bool;
}

/// Enabled backends, in registration order.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn RpcBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend; a backend with the same alias is replaced in place.
    pub fn register(&mut self, backend: Arc<dyn RpcBackend>) {
        debug!("Registering `{}` RPC backend ...", backend.alias());

        match self.backends.iter().position(|b| b.alias() == backend.alias()) {
            Some(index) => self.backends[index] = backend,
            None => self.backends.push(backend),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&Arc<dyn RpcBackend>> {
        self.backends.iter().find(|backend| backend.alias() == alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RpcBackend>> {
        self.backends.iter()
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.backends.iter().map(|backend| backend.alias()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Builds the bundled backend known under `alias`.
pub fn spawn(alias: &str, settings: &RpcSettings, timeout: Duration) -> Result<Arc<dyn RpcBackend>, BackendError> {
    match alias {
        transmission::ALIAS => Ok(Arc::new(TransmissionBackend::new(settings, timeout)?)),
        _ => Err(BackendError::Unknown(alias.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, u8);

    #[async_trait]
    impl RpcBackend for Named {
        fn alias(&self) -> &str {
            self.0
        }

        async fn list_torrents(&self, _hashes: &[String]) -> Result<Vec<LiveTorrent>, BackendError> {
            Ok(vec![LiveTorrent {
                hash: self.1.to_string(),
                ..Default::default()
            }])
        }

        async fn add_torrent(&self, _record: &TorrentRecord, _params: &TorrentParams) -> Result<(), BackendError> {
            Ok(())
        }

        async fn remove_torrent(&self, _hash: &str, _with_data: bool) -> Result<(), BackendError> {
            Ok(())
        }

        async fn test_configuration(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_registration_order_and_replacement() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(Named("transmission", 1)));
        registry.register(Arc::new(Named("deluge", 2)));
        registry.register(Arc::new(Named("transmission", 3)));

        assert_eq!(registry.aliases(), vec!["transmission", "deluge"]);
        let listed = registry.get("transmission").unwrap().list_torrents(&[]).await.unwrap();
        assert_eq!(listed[0].hash, "3");
    }

    #[test]
    fn test_spawn_unknown_backend() {
        let result = spawn("utorrent", &RpcSettings::default(), Duration::from_secs(5));
        assert!(matches!(result, Err(BackendError::Unknown(_))));
        assert!(spawn("transmission", &RpcSettings::default(), Duration::from_secs(5)).is_ok());
    }
}
