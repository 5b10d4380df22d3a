#![allow(dead_code)]
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use torrent_refresher::config::{MemoryStore, Settings};
use torrent_refresher::core::magnet::MagnetHash;
use torrent_refresher::core::record::{PersistedTorrent, TorrentRecord};
use torrent_refresher::error::{BackendError, TrackerError};
use torrent_refresher::rpc::{LiveTorrent, RpcBackend, TorrentParams};
use torrent_refresher::tracker::{Tracker, TrackerIdentity};

pub const PAGE_URL: &str = "http://a.com/x?id=7";
pub const OLD_HASH: &str = "1111111111111111111111111111111111111111";
pub const NEW_HASH: &str = "2222222222222222222222222222222222222222";

/// Tracker serving canned records per page URL and recording every resolution.
pub struct FakeTracker {
    identity: TrackerIdentity,
    published: HashMap<String, Result<TorrentRecord, TrackerError>>,
    resolved: Arc<Mutex<Vec<String>>>,
}

impl FakeTracker {
    pub fn new(alias: &str) -> Self {
        FakeTracker {
            identity: TrackerIdentity::new(alias, &[]),
            published: HashMap::new(),
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn publish(mut self, url: &str, hash: &str, name: &str) -> Self {
        let mut record = TorrentRecord::default();
        record.source_url = url.to_string();
        record.download_file_url = format!("{}&download", url);
        record.raw = b"d4:infod4:name4:showee".to_vec();
        record.set_hash(hash);
        record.set_name(name);
        self.published.insert(url.to_string(), Ok(record));
        self
    }

    pub fn fail(mut self, url: &str, error: TrackerError) -> Self {
        self.published.insert(url.to_string(), Err(error));
        self
    }

    /// URLs resolved so far, shared with the boxed tracker.
    pub fn resolved(&self) -> Arc<Mutex<Vec<String>>> {
        self.resolved.clone()
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    fn identity(&self) -> &TrackerIdentity {
        &self.identity
    }

    async fn resolve_torrent(&mut self, url: &str) -> Result<TorrentRecord, TrackerError> {
        self.resolved.lock().unwrap().push(url.to_string());
        match self.published.get(url) {
            Some(Ok(record)) => Ok(record.clone()),
            Some(Err(TrackerError::ConsecutiveLogin(alias))) => Err(TrackerError::ConsecutiveLogin(alias.clone())),
            _ => Err(TrackerError::Unresolvable(url.to_string())),
        }
    }

    async fn resolve_magnet(&mut self, url: &str) -> Result<MagnetHash, TrackerError> {
        Err(TrackerError::Unresolvable(url.to_string()))
    }

    async fn resolve_download_url(&mut self, url: &str) -> Result<String, TrackerError> {
        Err(TrackerError::Unresolvable(url.to_string()))
    }

    async fn test_configuration(&mut self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Add(String, TorrentParams),
    Remove(String, bool),
}

/// In-memory torrent client recording every call.
pub struct FakeBackend {
    alias: String,
    torrents: Mutex<Vec<LiveTorrent>>,
    calls: Mutex<Vec<Call>>,
    reject_add: bool,
}

impl FakeBackend {
    pub fn new(alias: &str, torrents: Vec<LiveTorrent>) -> Arc<Self> {
        Arc::new(FakeBackend {
            alias: alias.to_string(),
            torrents: Mutex::new(torrents),
            calls: Mutex::new(Vec::new()),
            reject_add: false,
        })
    }

    pub fn rejecting(alias: &str, torrents: Vec<LiveTorrent>) -> Arc<Self> {
        Arc::new(FakeBackend {
            alias: alias.to_string(),
            torrents: Mutex::new(torrents),
            calls: Mutex::new(Vec::new()),
            reject_add: true,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn hashes(&self) -> Vec<String> {
        self.torrents.lock().unwrap().iter().map(|t| t.hash.clone()).collect()
    }
}

#[async_trait]
impl RpcBackend for FakeBackend {
    fn alias(&self) -> &str {
        &self.alias
    }

    async fn list_torrents(&self, hashes: &[String]) -> Result<Vec<LiveTorrent>, BackendError> {
        self.calls.lock().unwrap().push(Call::List);
        Ok(self
            .torrents
            .lock()
            .unwrap()
            .iter()
            .filter(|t| hashes.is_empty() || hashes.contains(&t.hash))
            .cloned()
            .collect())
    }

    async fn add_torrent(&self, record: &TorrentRecord, params: &TorrentParams) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Add(record.hash().to_string(), params.clone()));
        if self.reject_add {
            return Err(BackendError::Rejected("duplicate torrent".to_string()));
        }
        self.torrents.lock().unwrap().push(LiveTorrent {
            hash: record.hash().to_string(),
            name: record.name().to_string(),
            comment: Some(record.source_url.clone()),
            params: params.clone(),
        });
        Ok(())
    }

    async fn remove_torrent(&self, hash: &str, with_data: bool) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Remove(hash.to_string(), with_data));
        self.torrents.lock().unwrap().retain(|t| t.hash != hash);
        Ok(())
    }

    async fn test_configuration(&self) -> bool {
        true
    }
}

pub fn live(hash: &str, comment: Option<&str>) -> LiveTorrent {
    LiveTorrent {
        hash: hash.to_string(),
        name: "show".to_string(),
        comment: comment.map(str::to_string),
        params: TorrentParams::new(),
    }
}

pub fn persisted(hash: &str, source_url: &str) -> PersistedTorrent {
    PersistedTorrent {
        hash: hash.to_string(),
        name: "show".to_string(),
        source_url: source_url.to_string(),
        ..Default::default()
    }
}

pub const THIRD_HASH: &str = "3333333333333333333333333333333333333333";
pub const FOURTH_HASH: &str = "4444444444444444444444444444444444444444";

/// Registered index of `(hash, page URL)` pairs.
pub fn index(entries: &[(&str, &str)]) -> BTreeMap<String, PersistedTorrent> {
    entries
        .iter()
        .map(|(hash, url)| (hash.to_string(), persisted(hash, url)))
        .collect()
}

/// Store holding one registered torrent at [`PAGE_URL`].
pub fn store_with_registered(hash: &str) -> Arc<MemoryStore> {
    store_with(&[(hash, PAGE_URL)])
}

pub fn store_with(entries: &[(&str, &str)]) -> Arc<MemoryStore> {
    let settings = Settings {
        torrents: index(entries),
        ..Default::default()
    };
    Arc::new(MemoryStore::new(settings))
}
