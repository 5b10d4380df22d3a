use crate::config::RpcSettings;
use crate::core::record::TorrentRecord;
use crate::error::BackendError;
use crate::rpc::{LiveTorrent, PARAM_DOWNLOAD_TO, RpcBackend, TorrentParams};
use async_trait::async_trait;
use base64::prelude::*;
use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::time::Duration;

pub const ALIAS: &str = "transmission";

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const FIELDS: [&str; 4] = ["hashString", "name", "comment", "downloadDir"];

/// Transmission JSON-RPC client.
pub struct TransmissionBackend {
    url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
}

impl TransmissionBackend {
    pub fn new(settings: &RpcSettings, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(TransmissionBackend {
            url: settings.url.clone(),
            username: settings.username.clone().filter(|u| !u.trim().is_empty()),
            password: settings.password.clone(),
            client,
            session_id: Mutex::new(None),
        })
    }

    fn current_session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|id| id.clone())
    }

    fn store_session_id(&self, id: Option<String>) {
        if let Ok(mut current) = self.session_id.lock() {
            *current = id;
        }
    }

    /// Runs `method`, negotiating the session id on 409. Returns the `arguments` object.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, BackendError> {
        let payload = json!({ "method": method, "arguments": arguments });
        debug!("Transmission RPC `{}` at {} ...", method, self.url);

        for _ in 0..3 {
            let mut request = self.client.post(&self.url).json(&payload);
            if let Some(id) = self.current_session_id() {
                request = request.header(SESSION_HEADER, id);
            }
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }

            let response = request.send().await?;
            if response.status() == StatusCode::CONFLICT {
                let id = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                self.store_session_id(id);
                continue;
            }

            let body: Value = response.error_for_status()?.json().await?;
            return unwrap_response(body);
        }

        Err(BackendError::Session(self.url.clone()))
    }
}

/// `arguments` of a successful response; anything but `"result": "success"` is a rejection.
fn unwrap_response(body: Value) -> Result<Value, BackendError> {
    match body.get("result").and_then(Value::as_str) {
        Some("success") => Ok(body.get("arguments").cloned().unwrap_or(Value::Null)),
        Some(other) => Err(BackendError::Rejected(other.to_string())),
        None => Err(BackendError::Rejected("response carries no result".to_string())),
    }
}

fn parse_torrents(arguments: &Value) -> Vec<LiveTorrent> {
    let Some(torrents) = arguments.get("torrents").and_then(Value::as_array) else {
        return Vec::new();
    };

    torrents
        .iter()
        .filter_map(|torrent| {
            let hash = torrent.get("hashString").and_then(Value::as_str)?.to_lowercase();
            let text = |key: &str| torrent.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

            let mut params = TorrentParams::new();
            if let Some(dir) = torrent.get("downloadDir").filter(|dir| dir.is_string()) {
                params.insert(PARAM_DOWNLOAD_TO.to_string(), dir.clone());
            }

            Some(LiveTorrent {
                hash,
                name: text("name"),
                comment: Some(text("comment")).filter(|comment| !comment.is_empty()),
                params,
            })
        })
        .collect()
}

fn add_arguments(record: &TorrentRecord, params: &TorrentParams) -> Result<Value, BackendError> {
    if record.raw.is_empty() {
        return Err(BackendError::Rejected(format!(
            "no torrent contents for `{}`",
            record.name()
        )));
    }

    let mut arguments = json!({ "metainfo": BASE64_STANDARD.encode(&record.raw) });
    let download_to = params
        .get(PARAM_DOWNLOAD_TO)
        .and_then(Value::as_str)
        .or(record.download_to.as_deref());
    if let Some(dir) = download_to {
        arguments["download-dir"] = json!(dir);
    }
    Ok(arguments)
}

#[async_trait]
impl RpcBackend for TransmissionBackend {
    fn alias(&self) -> &str {
        ALIAS
    }

    async fn list_torrents(&self, hashes: &[String]) -> Result<Vec<LiveTorrent>, BackendError> {
        let mut arguments = json!({ "fields": FIELDS });
        if !hashes.is_empty() {
            arguments["ids"] = json!(hashes);
        }
        let response = self.call("torrent-get", arguments).await?;
        Ok(parse_torrents(&response))
    }

    async fn add_torrent(&self, record: &TorrentRecord, params: &TorrentParams) -> Result<(), BackendError> {
        let arguments = add_arguments(record, params)?;
        self.call("torrent-add", arguments).await?;
        Ok(())
    }

    async fn remove_torrent(&self, hash: &str, with_data: bool) -> Result<(), BackendError> {
        self.call(
            "torrent-remove",
            json!({ "ids": [hash], "delete-local-data": with_data }),
        )
        .await?;
        Ok(())
    }

    async fn test_configuration(&self) -> bool {
        match self.call("session-get", json!({})).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Transmission at {} is unavailable: {}", self.url, e);
                false
            }
        }
    }
}
