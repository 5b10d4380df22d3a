use crate::config::{ConfigStore, TrackerSettings};
use crate::core::magnet::MagnetHash;
use crate::core::record::TorrentRecord;
use crate::core::torrent_info::parse_torrent;
use crate::error::TrackerError;
use crate::network::HttpClient;
use crate::tracker::mirrors::mirror_urls;
use crate::tracker::{SiteRules, Tracker, TrackerIdentity, TrackerSession};
use async_trait::async_trait;
use log::{debug, error, warn};
use std::sync::Arc;
use url::Url;

/// Tracker handler built from site rules.
///
/// Every operation walks the mirror list of [`mirror_urls`]: the first mirror that
/// succeeds wins, failures of the others are logged and skipped. Only a fatal error
/// (see [`TrackerError::is_fatal`]) stops the walk early.
pub struct GenericTracker<R> {
    identity: TrackerIdentity,
    rules: R,
    session: TrackerSession,
}

impl<R: SiteRules> GenericTracker<R> {
    pub fn new(
        rules: R,
        client: HttpClient,
        settings: TrackerSettings,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> Self {
        let identity = rules.identity();
        let session = TrackerSession::new(&identity, client, settings, rules.login_form(), store);
        GenericTracker {
            identity,
            rules,
            session,
        }
    }

    pub fn session(&self) -> &TrackerSession {
        &self.session
    }

    fn parse_url(url: &str) -> Result<Url, TrackerError> {
        Url::parse(url).map_err(|_| TrackerError::InvalidUrl(url.to_string()))
    }

    async fn located_link(&mut self, mirror: &Url) -> Result<String, TrackerError> {
        self.rules
            .download_link(&mut self.session, mirror)
            .await?
            .filter(|link| !link.is_empty())
            .ok_or_else(|| {
                TrackerError::Extraction(format!("Cannot find torrent file download link at {}", mirror))
            })
    }

    async fn torrent_from_mirror(&mut self, source: &str, mirror: &Url) -> Result<TorrentRecord, TrackerError> {
        let download_link = self.located_link(mirror).await?;
        debug!("Torrent download link found: {}", download_link);

        let page = self
            .session
            .cached_page()
            .map(|page| self.rules.page_metadata(page))
            .unwrap_or_default();

        self.rules
            .before_download(&mut self.session, &download_link)
            .await?;

        let contents = self
            .session
            .download(&download_link, mirror.as_str())
            .await?
            .ok_or_else(|| {
                TrackerError::Extraction(format!("Torrent download from `{}` has failed", download_link))
            })?;

        let parsed = parse_torrent(&contents)?;

        Ok(TorrentRecord::from_parsed(source, &download_link, contents, parsed, page))
    }
}

#[async_trait]
impl<R: SiteRules> Tracker for GenericTracker<R> {
    fn identity(&self) -> &TrackerIdentity {
        &self.identity
    }

    async fn resolve_torrent(&mut self, url: &str) -> Result<TorrentRecord, TrackerError> {
        let parsed = Self::parse_url(url)?;
        self.session.begin_operation();

        for mirror in mirror_urls(&self.identity, &parsed) {
            match self.torrent_from_mirror(url, &mirror).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Cannot get torrent at mirror {}: {}", mirror, e),
            }
        }

        error!("Cannot find torrent file download link at {}", url);
        Err(TrackerError::Unresolvable(url.to_string()))
    }

    async fn resolve_magnet(&mut self, url: &str) -> Result<MagnetHash, TrackerError> {
        let parsed = Self::parse_url(url)?;
        self.session.begin_operation();

        for mirror in mirror_urls(&self.identity, &parsed) {
            match self.rules.magnet(&mut self.session, &mirror).await {
                Ok(Some(hash)) => {
                    debug!("Torrent hash found {}: {}", hash, mirror);
                    return Ok(hash);
                }
                Ok(None) => warn!("Cannot find torrent hash at mirror {}: response torrent hash is empty", mirror),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Cannot find torrent hash at mirror {}: {}", mirror, e),
            }
        }

        error!("Cannot find torrent hash at {}", url);
        Err(TrackerError::Unresolvable(url.to_string()))
    }

    async fn resolve_download_url(&mut self, url: &str) -> Result<String, TrackerError> {
        let parsed = Self::parse_url(url)?;
        self.session.begin_operation();

        for mirror in mirror_urls(&self.identity, &parsed) {
            match self.located_link(&mirror).await {
                Ok(link) => {
                    debug!("Torrent download url found {}: {}", link, mirror);
                    return Ok(link);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Cannot find torrent download url at mirror {}: {}", mirror, e),
            }
        }

        error!("Cannot find torrent download url at {}", url);
        Err(TrackerError::Unresolvable(url.to_string()))
    }

    async fn test_configuration(&mut self) -> bool {
        if !self.session.is_private() || self.session.is_authenticated() {
            return true;
        }
        self.session.begin_operation();
        let alias = self.identity.alias.clone();
        match self.session.login(&alias).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                warn!("Configuration test of `{}` failed: {}", alias, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::torrent_info::tests::sample_torrent;
    use crate::network::fake::{self, FakeTransport};
    use crate::tracker::LoginForm;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static RE_TORRENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.torrent").unwrap());

    /// Public site: the download link is any `.torrent` link on the page.
    struct PlainRules {
        login: Option<LoginForm>,
    }

    #[async_trait]
    impl SiteRules for PlainRules {
        fn identity(&self) -> TrackerIdentity {
            TrackerIdentity::new("a.com", &["b.com"])
        }

        fn login_form(&self) -> Option<LoginForm> {
            self.login.clone()
        }

        async fn download_link(
            &self,
            session: &mut TrackerSession,
            url: &Url,
        ) -> Result<Option<String>, TrackerError> {
            let mut page = session.torrent_page(url, false).await?;
            if page.html().contains("signup") {
                let domain = url.host_str().unwrap_or_default().to_string();
                session.login(&domain).await?;
                session.login(&domain).await?;
                page = session.torrent_page(url, true).await?;
            }
            Ok(page.find_link(&RE_TORRENT))
        }
    }

    fn tracker(transport: &Arc<FakeTransport>) -> GenericTracker<PlainRules> {
        GenericTracker::new(PlainRules { login: None }, fake::client(transport), Default::default(), None)
    }

    #[tokio::test]
    async fn test_falls_back_to_next_mirror() {
        let transport = FakeTransport::new();
        transport.route("http://a.com/x?id=7", "<title>Seven</title><p>No link here</p>");
        transport.route(
            "http://b.com/x?id=7",
            r#"<title>Seven at B</title><a href="/dl/7.torrent">get</a>"#,
        );
        transport.route("http://b.com/dl/7.torrent", sample_torrent("seven", ""));
        let mut tracker = tracker(&transport);

        let record = tracker.resolve_torrent("http://a.com/x?id=7").await.unwrap();

        assert_eq!(record.download_file_url, "http://b.com/dl/7.torrent");
        assert_eq!(record.source_url, "http://a.com/x?id=7");
        assert_eq!(record.name(), "seven");
        assert_eq!(record.page.as_ref().unwrap().title, "Seven at B");
        assert!(record.is_resolved());
        assert_eq!(
            transport.requested_urls(),
            vec![
                "http://a.com/x?id=7",
                "http://b.com/x?id=7",
                "http://b.com/dl/7.torrent"
            ]
        );
    }

    #[tokio::test]
    async fn test_unparsable_payload_tries_next_mirror() {
        let transport = FakeTransport::new();
        transport.route("http://a.com/x", r#"<a href="/x.torrent">get</a>"#);
        transport.route("http://a.com/x.torrent", "<html>login required</html>");
        transport.route("http://b.com/x", r#"<a href="/x.torrent">get</a>"#);
        transport.route("http://b.com/x.torrent", sample_torrent("x", ""));
        let mut tracker = tracker(&transport);

        let record = tracker.resolve_torrent("http://a.com/x").await.unwrap();
        assert_eq!(record.download_file_url, "http://b.com/x.torrent");
    }

    #[tokio::test]
    async fn test_all_mirrors_failing_is_unresolvable() {
        let transport = FakeTransport::new();
        let mut tracker = tracker(&transport);

        let result = tracker.resolve_torrent("http://a.com/x?id=7").await;
        assert!(matches!(result, Err(TrackerError::Unresolvable(_))));
        assert_eq!(transport.requests().len(), 2);

        let link = tracker.resolve_download_url("http://a.com/x?id=7").await;
        assert!(matches!(link, Err(TrackerError::Unresolvable(_))));

        let invalid = tracker.resolve_torrent("not a url").await;
        assert!(matches!(invalid, Err(TrackerError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_download_url_and_magnet() {
        let transport = FakeTransport::new();
        transport.route(
            "http://a.com/x",
            r#"<a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567">m</a>
               <a href="/x.torrent">get</a>"#,
        );
        let mut tracker = tracker(&transport);

        let link = tracker.resolve_download_url("http://a.com/x").await.unwrap();
        assert_eq!(link, "http://a.com/x.torrent");

        let magnet = tracker.resolve_magnet("http://a.com/x").await.unwrap();
        assert_eq!(magnet.as_str(), "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_second_login_in_chain_is_refused_not_raised() {
        let transport = FakeTransport::new();
        transport.route("http://a.com/x", r#"<a href="/signup.php">join</a>"#);
        transport.route("https://a.com/takelogin.php", "bad credentials");
        transport.route("http://b.com/x", r#"<a href="/x.torrent">get</a>"#);
        transport.route("http://b.com/x.torrent", sample_torrent("x", ""));
        let rules = PlainRules {
            login: Some(LoginForm::with_cookie("https://{domain}/takelogin.php", "uid")),
        };
        let settings = TrackerSettings {
            username: Some("joe".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let mut tracker = GenericTracker::new(rules, fake::client(&transport), settings, None);

        let record = tracker.resolve_torrent("http://a.com/x").await.unwrap();
        assert_eq!(record.name(), "x");

        let logins = transport
            .requested_urls()
            .iter()
            .filter(|url| url.contains("takelogin"))
            .count();
        assert_eq!(logins, 1);
        assert!(!tracker.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_consecutive_login_stops_fallback() {
        let transport = FakeTransport::new();
        let mut uid = crate::network::CookieJar::new();
        uid.insert("uid".to_string(), "1".to_string());
        transport.route("http://a.com/x", r#"<a href="/signup.php">join</a>"#);
        transport.route_response(
            "https://a.com/takelogin.php",
            "https://a.com/takelogin.php",
            uid,
            "",
        );
        let rules = PlainRules {
            login: Some(LoginForm::with_cookie("https://{domain}/takelogin.php", "uid")),
        };
        let settings = TrackerSettings {
            username: Some("joe".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let mut tracker = GenericTracker::new(rules, fake::client(&transport), settings, None);

        let result = tracker.resolve_torrent("http://a.com/x").await;
        assert!(matches!(result, Err(TrackerError::ConsecutiveLogin(_))));
        assert!(!transport.requested_urls().iter().any(|url| url.contains("b.com")));
    }

    #[tokio::test]
    async fn test_public_configuration_is_always_valid() {
        let transport = FakeTransport::new();
        let mut tracker = tracker(&transport);
        assert!(tracker.test_configuration().await);
        assert!(transport.requests().is_empty());
    }
}
