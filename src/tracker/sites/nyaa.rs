use crate::core::record::PageMetadata;
use crate::error::TrackerError;
use crate::network::page::Page;
use crate::tracker::{SiteRules, TrackerIdentity, TrackerSession};
use async_trait::async_trait;
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const ALIAS: &str = "nyaa.si";

static RE_DOWNLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/download/\d+\.torrent$").expect("download pattern is valid"));

static RE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-timestamp="(\d+)""#).expect("timestamp pattern is valid"));

static RE_COVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]+src="(https?://[^"]+\.(?:jpe?g|png|webp))""#).expect("cover pattern is valid")
});

/// nyaa.si: public, links straight to `/download/<id>.torrent`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NyaaRules;

#[async_trait]
impl SiteRules for NyaaRules {
    fn identity(&self) -> TrackerIdentity {
        TrackerIdentity::new(ALIAS, &["nyaa.land"])
    }

    async fn download_link(
        &self,
        session: &mut TrackerSession,
        url: &Url,
    ) -> Result<Option<String>, TrackerError> {
        let page = session.torrent_page(url, false).await?;
        Ok(page.find_link(&RE_DOWNLOAD))
    }

    fn page_metadata(&self, page: &Page) -> PageMetadata {
        let date_updated = page
            .capture(&RE_TIMESTAMP)
            .and_then(|timestamp| timestamp.parse::<i64>().ok())
            .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
            .map(|date| date.naive_utc().to_string())
            .unwrap_or_default();

        PageMetadata {
            title: page.title(),
            cover_url: page.capture(&RE_COVER).unwrap_or_default(),
            date_updated,
        }
    }
}
