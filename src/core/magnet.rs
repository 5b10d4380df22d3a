use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RE_MAGNET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^magnet:\?(?:.*&)?xt=urn:btih:([0-9a-z]+)").expect("magnet pattern is valid")
});

/// Info hash taken from a tracker page without downloading the torrent file.
///
/// Stored lowercase. Both 40-char hex and 32-char base32 forms are accepted as they
/// appear in magnet links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MagnetHash(String);

impl MagnetHash {
    pub fn new(hash: &str) -> Option<Self> {
        let hash = hash.trim();
        let valid = match hash.len() {
            40 => hash.chars().all(|c| c.is_ascii_hexdigit()),
            32 => hash.chars().all(|c| matches!(c.to_ascii_lowercase(), 'a'..='z' | '2'..='7')),
            _ => false,
        };
        valid.then(|| MagnetHash(hash.to_ascii_lowercase()))
    }

    /// Extracts the btih hash from a `magnet:?xt=urn:btih:...` link.
    pub fn from_uri(uri: &str) -> Option<Self> {
        RE_MAGNET
            .captures(uri.trim())
            .and_then(|captures| captures.get(1))
            .and_then(|m| Self::new(m.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_uri(&self) -> String {
        format!("magnet:?xt=urn:btih:{}", self.0)
    }
}

impl fmt::Display for MagnetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
