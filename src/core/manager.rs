use crate::config::{ConfigStore, Settings};
use crate::core::record::{PersistedTorrent, TorrentRecord};
use crate::core::schedule::should_run;
use crate::error::AppError;
use crate::rpc::{BackendRegistry, LiveTorrent};
use crate::tracker::{Tracker, TrackerRegistry};
use crate::utils::get_url_from_string;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The record replacing one registered torrent.
#[derive(Debug, Clone)]
pub struct StagedUpdate {
    pub record: TorrentRecord,
    /// Some backend refused the replacement and still runs the old torrent.
    pub keep_old: bool,
}

/// Old hash to its replacement, collected during one update pass.
pub type StagedUpdates = BTreeMap<String, StagedUpdate>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The walk interval has not elapsed yet.
    NotDue,
    Done(WalkReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// `(old hash, new hash)` of every torrent swapped in at least one backend.
    pub updated: Vec<(String, String)>,
}

/// Drives update walks: finds stale torrents in the backends and swaps in their
/// replacements from the trackers.
pub struct TorrentManager<'a> {
    trackers: &'a mut TrackerRegistry,
    backends: &'a BackendRegistry,
}

impl<'a> TorrentManager<'a> {
    pub fn new(trackers: &'a mut TrackerRegistry, backends: &'a BackendRegistry) -> Self {
        TorrentManager { trackers, backends }
    }

    /// One walk: gated by the interval unless `forced`, persists the check time before
    /// updating and the index changes in a single write after all backends are done.
    pub async fn walk(
        &mut self,
        store: &dyn ConfigStore,
        now: i64,
        forced: bool,
        remove_outdated: bool,
    ) -> Result<WalkOutcome, AppError> {
        let settings = store.load()?;

        if !should_run(now, settings.time_last_check, settings.walk_interval_hours, forced) {
            debug!(
                "Walk is not due: last check at {}, interval {}h",
                settings.time_last_check, settings.walk_interval_hours
            );
            return Ok(WalkOutcome::NotDue);
        }

        info!("Torrents walk is started");
        store.update(&mut |document| document.time_last_check = now)?;

        let staged = self.update(&settings.torrents, remove_outdated).await;

        let report = WalkReport {
            updated: staged
                .iter()
                .map(|(old, update)| (old.clone(), update.record.hash().to_string()))
                .collect(),
        };

        if !staged.is_empty() {
            store.update(&mut |document| apply_updates(document, &staged))?;
        }

        info!("Torrents walk is finished: {} torrent(s) updated", report.updated.len());
        Ok(WalkOutcome::Done(report))
    }

    /// Walks every backend in registration order and swaps stale registered torrents.
    ///
    /// Each distinct page URL is resolved once per call, whichever backends list it.
    /// Failures skip the torrent; a tracker failing fatally is skipped for the rest of
    /// the pass.
    pub async fn update(
        &mut self,
        registered: &BTreeMap<String, PersistedTorrent>,
        remove_outdated: bool,
    ) -> StagedUpdates {
        let hashes: Vec<String> = registered.keys().cloned().collect();
        let mut resolved: HashMap<String, Option<TorrentRecord>> = HashMap::new();
        let mut disabled: HashSet<String> = HashSet::new();
        let mut rejected: HashSet<String> = HashSet::new();
        let mut staged = StagedUpdates::new();
        let backends = self.backends;

        for backend in backends.iter() {
            debug!("Getting torrents from `{}` ...", backend.alias());

            let live = match backend.list_torrents(&hashes).await {
                Ok(live) => live,
                Err(e) => {
                    warn!("Unable to list torrents of `{}`: {}", backend.alias(), e);
                    continue;
                }
            };

            for torrent in live {
                let Some(entry) = registered.get(&torrent.hash) else {
                    continue;
                };

                let Some(page_url) = source_page_url(&torrent, entry) else {
                    warn!(
                        "Torrent `{}` ({}) has no page URL to check, skipped",
                        torrent.name, torrent.hash
                    );
                    continue;
                };

                if !resolved.contains_key(&page_url) {
                    let outcome = self.resolve(&page_url, &mut disabled).await;
                    resolved.insert(page_url.clone(), outcome);
                } else {
                    debug!("Torrent from {} is already resolved in this walk", page_url);
                }

                let Some(Some(current)) = resolved.get(&page_url) else {
                    continue;
                };

                if current.hash() == torrent.hash {
                    debug!("Torrent `{}` is up to date", torrent.name);
                    continue;
                }

                info!(
                    "Torrent `{}` has an update: {} -> {}",
                    torrent.name,
                    torrent.hash,
                    current.hash()
                );

                let mut replacement = current.clone();
                replacement.download_to = entry.download_to.clone();

                if let Err(e) = backend.add_torrent(&replacement, &torrent.params).await {
                    error!(
                        "Unable to add updated torrent `{}` to `{}`: {}",
                        replacement.name(),
                        backend.alias(),
                        e
                    );
                    rejected.insert(torrent.hash.clone());
                    continue;
                }

                if remove_outdated {
                    if let Err(e) = backend.remove_torrent(&torrent.hash, false).await {
                        warn!(
                            "Unable to remove outdated torrent {} from `{}`: {}",
                            torrent.hash,
                            backend.alias(),
                            e
                        );
                    }
                }

                staged.insert(
                    torrent.hash.clone(),
                    StagedUpdate {
                        record: replacement,
                        keep_old: false,
                    },
                );
            }
        }

        for (old_hash, update) in staged.iter_mut() {
            update.keep_old = rejected.contains(old_hash);
        }

        staged
    }

    /// Resolves `page_url` with its tracker, `None` on any failure.
    async fn resolve(&mut self, page_url: &str, disabled: &mut HashSet<String>) -> Option<TorrentRecord> {
        let Some(tracker) = self.trackers.get_for_string(page_url) else {
            warn!("No tracker handles {}", page_url);
            return None;
        };

        let alias = tracker.alias().to_string();
        if disabled.contains(&alias) {
            debug!("Tracker `{}` is off for this walk, {} skipped", alias, page_url);
            return None;
        }

        match tracker.resolve_torrent(page_url).await {
            Ok(record) => Some(record),
            Err(e) if e.is_fatal() => {
                error!("Tracker `{}` is off for the rest of this walk: {}", alias, e);
                disabled.insert(alias);
                None
            }
            Err(e) => {
                warn!("Unable to get torrent from {}: {}", page_url, e);
                None
            }
        }
    }
}

/// Page URL of a live torrent: the link in its comment, else the registered source URL.
fn source_page_url(torrent: &LiveTorrent, entry: &PersistedTorrent) -> Option<String> {
    if let Some(url) = torrent.comment.as_deref().and_then(get_url_from_string) {
        return Some(url);
    }

    if entry.source_url.is_empty() {
        return None;
    }

    // The registered URL may be outdated when the torrent changed hands; still used.
    debug!(
        "Torrent {} has no page URL in its comment, using registered {}",
        torrent.hash, entry.source_url
    );
    Some(entry.source_url.clone())
}

/// Registers every staged record, dropping the old entry unless a backend still runs it.
pub fn apply_updates(settings: &mut Settings, staged: &StagedUpdates) {
    for (old_hash, update) in staged {
        let Some(persisted) = update.record.to_persisted() else {
            continue;
        };
        if !update.keep_old {
            settings.torrents.remove(old_hash);
        }
        settings.torrents.insert(persisted.hash.clone(), persisted);
    }
}
