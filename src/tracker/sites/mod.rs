//! Bundled tracker sites.

pub mod kinozal;
pub mod nyaa;

use crate::config::{ConfigStore, TrackerSettings};
use crate::network::HttpClient;
use crate::tracker::{GenericTracker, SiteRules, Tracker};
use std::sync::Arc;

pub use kinozal::KinozalRules;
pub use nyaa::NyaaRules;

type Spawn = fn(HttpClient, TrackerSettings, Option<Arc<dyn ConfigStore>>) -> Box<dyn Tracker>;

/// Catalogue entry of a bundled site.
#[derive(Clone, Copy)]
pub struct SiteEntry {
    pub alias: &'static str,
    /// Private sites need credentials and are skipped at startup without them.
    pub private: bool,
    spawn: Spawn,
}

impl SiteEntry {
    pub fn spawn(
        &self,
        client: HttpClient,
        settings: TrackerSettings,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> Box<dyn Tracker> {
        (self.spawn)(client, settings, store)
    }
}

fn spawn<R: SiteRules + Default + 'static>(
    client: HttpClient,
    settings: TrackerSettings,
    store: Option<Arc<dyn ConfigStore>>,
) -> Box<dyn Tracker> {
    Box::new(GenericTracker::new(R::default(), client, settings, store))
}

/// Every bundled site, in registration order.
pub fn catalogue() -> Vec<SiteEntry> {
    vec![
        SiteEntry {
            alias: kinozal::ALIAS,
            private: true,
            spawn: spawn::<KinozalRules>,
        },
        SiteEntry {
            alias: nyaa::ALIAS,
            private: false,
            spawn: spawn::<NyaaRules>,
        },
    ]
}

pub fn find(alias: &str) -> Option<SiteEntry> {
    catalogue().into_iter().find(|entry| entry.alias == alias)
}
