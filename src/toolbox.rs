//! Top-level operations: what the command line exposes.

use crate::config::{ConfigStore, HttpSettings, Realm, RpcSettings, TrackerSettings};
use crate::core::manager::{TorrentManager, WalkOutcome};
use crate::core::record::TorrentRecord;
use crate::error::{AppError, BackendError, TrackerError};
use crate::network::transport::ReqwestTransport;
use crate::network::{HttpClient, HttpClientOptions, Transport};
use crate::rpc::{self, BackendRegistry, PARAM_DOWNLOAD_TO, TorrentParams};
use crate::tracker::{Tracker, TrackerRegistry};
use crate::tracker::sites::{self, SiteEntry};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

pub struct Toolbox {
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    http: HttpSettings,
    trackers: TrackerRegistry,
    backends: BackendRegistry,
}

impl Toolbox {
    /// Loads settings and spawns every configured tracker and enabled backend.
    pub fn bootstrap(store: Arc<dyn ConfigStore>) -> Result<Self, AppError> {
        let settings = store.load()?;
        let transport = Arc::new(ReqwestTransport::new(&settings.http)?);
        Self::with_transport(store, transport)
    }

    /// Same as [`Toolbox::bootstrap`] over a caller-provided transport.
    pub fn with_transport(store: Arc<dyn ConfigStore>, transport: Arc<dyn Transport>) -> Result<Self, AppError> {
        let settings = store.load()?;

        let mut toolbox = Toolbox {
            store,
            transport,
            http: settings.http.clone(),
            trackers: TrackerRegistry::new(),
            backends: BackendRegistry::new(),
        };

        for entry in sites::catalogue() {
            let tracker_settings = match settings.trackers.get(entry.alias) {
                Some(tracker_settings) => tracker_settings.clone(),
                None if entry.private => {
                    debug!("Tracker `{}` is not configured, skipped", entry.alias);
                    continue;
                }
                None => TrackerSettings::default(),
            };
            let tracker = toolbox.spawn_tracker(&entry, tracker_settings);
            toolbox.trackers.register(tracker);
        }

        for (alias, rpc_settings) in settings.rpc.iter().filter(|(_, rpc)| rpc.enabled) {
            match rpc::spawn(alias, rpc_settings, toolbox.timeout()) {
                Ok(backend) => toolbox.backends.register(backend),
                Err(e) => warn!("RPC backend `{}` is not available: {}", alias, e),
            }
        }

        Ok(toolbox)
    }

    pub fn trackers_mut(&mut self) -> &mut TrackerRegistry {
        &mut self.trackers
    }

    pub fn backends_mut(&mut self) -> &mut BackendRegistry {
        &mut self.backends
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    fn spawn_tracker(&self, entry: &SiteEntry, settings: TrackerSettings) -> Box<dyn Tracker> {
        let client = HttpClient::new(
            self.transport.clone(),
            HttpClientOptions {
                silence_errors: !self.http.raise_on_error,
                dump_into: self.http.dump_into.clone(),
                ..Default::default()
            },
        );
        entry.spawn(client, settings, Some(self.store.clone()))
    }

    /// Runs a walk now if due (or `forced`).
    pub async fn walk(&mut self, forced: bool, remove_outdated: bool) -> Result<WalkOutcome, AppError> {
        self.walk_at(chrono::Utc::now().timestamp(), forced, remove_outdated).await
    }

    pub async fn walk_at(&mut self, now: i64, forced: bool, remove_outdated: bool) -> Result<WalkOutcome, AppError> {
        let mut manager = TorrentManager::new(&mut self.trackers, &self.backends);
        manager.walk(self.store.as_ref(), now, forced, remove_outdated).await
    }

    /// Resolves the torrent at `url`, adds it to every backend and registers it.
    pub async fn add_torrent_from_url(
        &mut self,
        url: &str,
        download_to: Option<String>,
    ) -> Result<TorrentRecord, AppError> {
        let mut record = self.trackers.resolve_torrent(url).await?;
        record.download_to = download_to;

        let mut params = TorrentParams::new();
        if let Some(dir) = &record.download_to {
            params.insert(PARAM_DOWNLOAD_TO.to_string(), serde_json::Value::from(dir.as_str()));
        }

        let mut last_error: Option<BackendError> = None;
        let mut added = 0;
        for backend in self.backends.iter() {
            match backend.add_torrent(&record, &params).await {
                Ok(()) => added += 1,
                Err(e) => {
                    warn!("Unable to add torrent to `{}`: {}", backend.alias(), e);
                    last_error = Some(e);
                }
            }
        }
        if added == 0 {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        let persisted = record
            .to_persisted()
            .ok_or_else(|| TrackerError::Unresolvable(url.to_string()))?;
        self.store.update(&mut |document| {
            document.torrents.insert(persisted.hash.clone(), persisted.clone());
        })?;

        info!("Torrent `{}` ({}) is registered", record.name(), record.hash());
        Ok(record)
    }

    /// Removes the torrent from every backend and unregisters it.
    pub async fn remove_torrent(&self, hash: &str, with_data: bool) -> Result<(), AppError> {
        for backend in self.backends.iter() {
            if let Err(e) = backend.remove_torrent(hash, with_data).await {
                warn!("Unable to remove torrent {} from `{}`: {}", hash, backend.alias(), e);
            }
        }

        let mut existed = false;
        self.store.update(&mut |document| existed = document.drop_section(Realm::Torrents, hash))?;
        if existed {
            info!("Torrent {} is unregistered", hash);
        }
        Ok(())
    }

    /// Checks tracker settings and saves them when the check passes.
    pub async fn configure_tracker(&mut self, alias: &str, settings: TrackerSettings) -> Result<bool, AppError> {
        let entry = sites::find(alias).ok_or_else(|| TrackerError::NotRegistered(alias.to_string()))?;

        let mut tracker = self.spawn_tracker(&entry, settings.clone());
        if !tracker.test_configuration().await {
            warn!("Tracker `{}` configuration test failed, settings are not saved", alias);
            return Ok(false);
        }

        // A successful login has already saved the settings with the session artifact.
        if !entry.private {
            self.store.update(&mut |document| {
                document.trackers.insert(alias.to_string(), settings.clone());
            })?;
        }

        self.trackers.register(tracker);
        info!("Tracker `{}` is configured", alias);
        Ok(true)
    }

    /// Checks backend settings and saves them when the backend answers.
    pub async fn configure_rpc(&mut self, alias: &str, settings: RpcSettings) -> Result<bool, AppError> {
        let backend = rpc::spawn(alias, &settings, self.timeout())?;
        if !backend.test_configuration().await {
            warn!("RPC `{}` configuration test failed, settings are not saved", alias);
            return Ok(false);
        }

        self.store.update(&mut |document| {
            document.rpc.insert(alias.to_string(), settings.clone());
        })?;

        self.backends.register(backend);
        info!("RPC `{}` is configured", alias);
        Ok(true)
    }

    pub fn set_walk_interval(&self, hours: u64) -> Result<(), AppError> {
        self.store.update(&mut |document| document.walk_interval_hours = hours)?;
        info!("Walk interval is set to {} hour(s)", hours);
        Ok(())
    }
}
