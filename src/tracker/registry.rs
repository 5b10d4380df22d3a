use crate::core::record::TorrentRecord;
use crate::error::TrackerError;
use crate::tracker::Tracker;
use log::debug;

/// Tracker handlers known to the process, in registration order.
///
/// Populated once at startup; aliases are unique, registering an alias again replaces the
/// earlier handler in place.
#[derive(Default)]
pub struct TrackerRegistry {
    trackers: Vec<Box<dyn Tracker>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tracker: Box<dyn Tracker>) {
        debug!("Registering `{}` tracker handler ...", tracker.alias());

        match self.trackers.iter().position(|t| t.alias() == tracker.alias()) {
            Some(index) => self.trackers[index] = tracker,
            None => self.trackers.push(tracker),
        }
    }

    pub fn get(&mut self, alias: &str) -> Option<&mut (dyn Tracker + 'static)> {
        self.trackers
            .iter_mut()
            .find(|tracker| tracker.alias() == alias)
            .map(|tracker| tracker.as_mut())
    }

    /// The first handler whose alias or mirror occurs in `candidate`.
    pub fn get_for_string(&mut self, candidate: &str) -> Option<&mut (dyn Tracker + 'static)> {
        self.trackers
            .iter_mut()
            .find(|tracker| tracker.can_handle(candidate))
            .map(|tracker| tracker.as_mut())
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.trackers.iter().map(|tracker| tracker.alias()).collect()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Routes `url` to its handler and resolves the torrent published there.
    pub async fn resolve_torrent(&mut self, url: &str) -> Result<TorrentRecord, TrackerError> {
        let tracker = self
            .get_for_string(url)
            .ok_or_else(|| TrackerError::NotRegistered(url.to_string()))?;
        tracker.resolve_torrent(url).await
    }
}
