use crate::core::torrent_info::ParsedTorrent;
use serde::{Deserialize, Serialize};

/// Descriptive data extracted from a torrent page. Fields are empty when extraction fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "cover")]
    pub cover_url: String,
    #[serde(default)]
    pub date_updated: String,
}

/// A torrent resolved from a tracker page (or rebuilt from the persisted index).
///
/// `hash` and `name` may be set explicitly; otherwise they are derived from the parsed
/// torrent file. See [`TorrentRecord::hash`] and [`TorrentRecord::name`].
#[derive(Debug, Clone, Default)]
pub struct TorrentRecord {
    hash: String,
    name: String,
    pub source_url: String,
    pub download_file_url: String,
    pub raw: Vec<u8>,
    pub parsed: Option<ParsedTorrent>,
    pub page: Option<PageMetadata>,
    pub download_to: Option<String>,
}

/// Serialized form of a [`TorrentRecord`] kept under `torrents` in the settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTorrent {
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "url")]
    pub source_url: String,
    #[serde(default, alias = "url_file")]
    pub download_file_url: String,
    #[serde(default)]
    pub page: PageMetadata,
    #[serde(default)]
    pub download_to: Option<String>,
}

impl TorrentRecord {
    pub fn from_parsed(
        source_url: &str,
        download_file_url: &str,
        raw: Vec<u8>,
        parsed: ParsedTorrent,
        page: PageMetadata,
    ) -> Self {
        TorrentRecord {
            source_url: source_url.to_string(),
            download_file_url: download_file_url.to_string(),
            raw,
            parsed: Some(parsed),
            page: Some(page),
            ..Default::default()
        }
    }

    /// Explicit hash wins, then the parsed torrent's info hash, else empty.
    pub fn hash(&self) -> &str {
        if !self.hash.is_empty() {
            return &self.hash;
        }
        self.parsed
            .as_ref()
            .map(|parsed| parsed.info_hash.as_str())
            .unwrap_or("")
    }

    pub fn set_hash(&mut self, hash: impl Into<String>) {
        self.hash = hash.into();
    }

    /// Explicit name wins, then the name declared in the parsed torrent, else empty.
    pub fn name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.parsed
            .as_ref()
            .map(|parsed| parsed.name.as_str())
            .unwrap_or("")
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_resolved(&self) -> bool {
        !self.hash().is_empty()
    }

    /// Unresolved records (no hash) have no persisted form.
    pub fn to_persisted(&self) -> Option<PersistedTorrent> {
        if !self.is_resolved() {
            return None;
        }
        Some(PersistedTorrent {
            hash: self.hash().to_string(),
            name: self.name().to_string(),
            source_url: self.source_url.clone(),
            download_file_url: self.download_file_url.clone(),
            page: self.page.clone().unwrap_or_default(),
            download_to: self.download_to.clone(),
        })
    }

    pub fn from_persisted(persisted: &PersistedTorrent) -> Self {
        TorrentRecord {
            hash: persisted.hash.clone(),
            name: persisted.name.clone(),
            source_url: persisted.source_url.clone(),
            download_file_url: persisted.download_file_url.clone(),
            page: Some(persisted.page.clone()),
            download_to: persisted.download_to.clone(),
            ..Default::default()
        }
    }
}
