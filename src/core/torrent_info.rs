use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_bencode::value::Value;
use serde_bytes::ByteBuf;
use sha1::{Digest, Sha1};

/// Top-level dictionary of a Metainfo (.torrent) file.
///
/// The `info` dictionary is kept as a raw bencode value so that re-encoding it for the
/// info hash keeps every key the publisher put there (private flags, source tags and the
/// like).
#[derive(Debug, Deserialize)]
struct Metainfo {
    info: Value,
}

/// The typed view of the 'info' dictionary.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Info {
    /// Suggested name for the file (single-file) or root directory (multi-file).
    pub name: String,

    #[serde(rename = "piece length")]
    pub piece_length: usize,

    /// Concatenated 20-byte SHA-1 piece hashes.
    pub pieces: ByteBuf,

    /// Present only in single-file mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
}

/// What the rest of the crate needs to know about a downloaded torrent file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTorrent {
    /// Lowercase hex SHA-1 of the bencoded info dictionary.
    pub info_hash: String,
    pub name: String,
}

/// Parses torrent file contents into `{hash, name}`.
pub fn parse_torrent(contents: &[u8]) -> Result<ParsedTorrent, ParseError> {
    let metainfo: Metainfo = serde_bencode::from_bytes(contents)?;

    if !matches!(metainfo.info, Value::Dict(_)) {
        return Err(ParseError::InvalidInfo("not a dictionary".to_string()));
    }

    let info_bytes = serde_bencode::to_bytes(&metainfo.info)?;
    let info: Info = serde_bencode::from_bytes(&info_bytes)
        .map_err(|e| ParseError::InvalidInfo(e.to_string()))?;

    if info.name.is_empty() {
        return Err(ParseError::InvalidInfo("empty name".to_string()));
    }

    Ok(ParsedTorrent {
        info_hash: calculate_info_hash(&info_bytes),
        name: info.name,
    })
}

/// SHA-1 of the bencoded info dictionary, hex encoded.
pub fn calculate_info_hash(info_bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(info_bytes);
    hex::encode(hasher.finalize())
}
