pub mod store;

use crate::core::record::PersistedTorrent;
use crate::network::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use store::{ConfigStore, JsonFileStore, MemoryStore};

/// The settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub trackers: BTreeMap<String, TrackerSettings>,

    #[serde(default)]
    pub rpc: BTreeMap<String, RpcSettings>,

    /// Registered torrents keyed by info hash.
    #[serde(default)]
    pub torrents: BTreeMap<String, PersistedTorrent>,

    #[serde(default = "default_walk_interval")]
    pub walk_interval_hours: u64,

    /// Unix timestamp of the last walk attempt.
    #[serde(default)]
    pub time_last_check: i64,

    #[serde(default)]
    pub http: HttpSettings,
}

/// Credentials and session artifact of one tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cookies: CookieJar,
    #[serde(default)]
    pub query_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub proxy: Option<String>,
    /// When false any proxy, including one from the environment, is bypassed.
    #[serde(default = "default_true")]
    pub tunnel: bool,
    /// Raise request errors instead of logging them; meant for debugging extraction.
    #[serde(default)]
    pub raise_on_error: bool,
    #[serde(default)]
    pub dump_into: Option<PathBuf>,
}

/// Top-level sections that hold keyed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realm {
    Trackers,
    Rpc,
    Torrents,
}

fn default_walk_interval() -> u64 {
    1
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            trackers: BTreeMap::new(),
            rpc: BTreeMap::new(),
            torrents: BTreeMap::new(),
            walk_interval_hours: default_walk_interval(),
            time_last_check: 0,
            http: HttpSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            proxy: None,
            tunnel: true,
            raise_on_error: false,
            dump_into: None,
        }
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        RpcSettings {
            url: "http://localhost:9091/transmission/rpc".to_string(),
            username: None,
            password: None,
            enabled: true,
        }
    }
}

impl Settings {
    /// Removes an entry from a section. Returns whether it existed.
    pub fn drop_section(&mut self, realm: Realm, key: &str) -> bool {
        match realm {
            Realm::Trackers => self.trackers.remove(key).is_some(),
            Realm::Rpc => self.rpc.remove(key).is_some(),
            Realm::Torrents => self.torrents.remove(key).is_some(),
        }
    }
}
