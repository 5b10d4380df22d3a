use crate::core::magnet::MagnetHash;
use crate::core::record::PageMetadata;
use crate::error::TrackerError;
use crate::network::page::{parse_datetime, Page};
use crate::tracker::{LoginForm, SiteRules, TrackerIdentity, TrackerSession};
use crate::utils::netloc;
use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const ALIAS: &str = "kinozal.tv";

const MONTHS: [&str; 12] = [
    "январ", "феврал", "март", "апрел", "ма", "июн", "июл", "август", "сентябр", "октябр",
    "ноябр", "декабр",
];

static RE_SIGNUP: Lazy<Regex> = Lazy::new(|| Regex::new("signup").expect("signup pattern is valid"));

static RE_INFO_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Инфо хеш:\s*([0-9A-Za-z]+)").expect("info hash pattern is valid"));

static RE_UPDATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Обновлен|Залит)\s*(?:<[^>]*>\s*)*(\d{1,2}\s+\S+\s+\d{4})\s+в\s+(\d{1,2}:\d{2})")
        .expect("update date pattern is valid")
});

/// kinozal.tv: private, cp1251 pages, `uid` cookie session.
#[derive(Debug, Default, Clone, Copy)]
pub struct KinozalRules;

/// Release id, the `id` query parameter of a details page URL.
fn torrent_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl SiteRules for KinozalRules {
    fn identity(&self) -> TrackerIdentity {
        TrackerIdentity::new(ALIAS, &["kinozal-tv.appspot.com", "kinozal.me"]).with_encoding("windows-1251")
    }

    fn login_form(&self) -> Option<LoginForm> {
        let mut form = LoginForm::with_cookie("https://{domain}/takelogin.php", "uid");
        form.extra_fields.push(("returnto".to_string(), String::new()));
        Some(form)
    }

    async fn download_link(
        &self,
        session: &mut TrackerSession,
        url: &Url,
    ) -> Result<Option<String>, TrackerError> {
        let mut page = session.torrent_page(url, false).await?;

        if page.find_link(&RE_SIGNUP).is_some() {
            debug!("Anonymous at {}, logging in", url);
            let domain = netloc(url).unwrap_or_default();
            session.login(&domain).await?;
            page = session.torrent_page(url, true).await?;
        }

        let Some(id) = torrent_id(url) else {
            return Ok(None);
        };
        let expected = Regex::new(&format!(r"/download.+={}(?:&|$)", regex::escape(&id)))
            .map_err(|e| TrackerError::Extraction(e.to_string()))?;

        Ok(page.find_link(&expected))
    }

    async fn magnet(
        &self,
        session: &mut TrackerSession,
        url: &Url,
    ) -> Result<Option<MagnetHash>, TrackerError> {
        let (Some(id), Some(domain)) = (torrent_id(url), netloc(url)) else {
            return Ok(None);
        };

        let details = format!("https://{}/get_srv_details.php?id={}&action=2", domain, id);
        let details = Url::parse(&details).map_err(|_| TrackerError::InvalidUrl(details))?;

        let page = session.torrent_page(&details, true).await?;
        Ok(page
            .capture(&RE_INFO_HASH)
            .and_then(|hash| MagnetHash::new(&hash)))
    }

    fn page_metadata(&self, page: &Page) -> PageMetadata {
        let date_updated = RE_UPDATED
            .captures(page.html())
            .and_then(|captures| {
                let text = format!("{} {}", captures.get(1)?.as_str(), captures.get(2)?.as_str());
                parse_datetime(&text, "%d %b %Y %H:%M", Some(&MONTHS))
            })
            .map(|date| date.to_string())
            .unwrap_or_default();

        PageMetadata {
            title: page.title(),
            date_updated,
            ..Default::default()
        }
    }
}
