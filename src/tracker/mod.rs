//! Tracker handlers: resolve a tracker page URL to the torrent currently published there.
//!
//! [`Tracker`] is the contract the rest of the crate consumes. Site specifics live in
//! [`SiteRules`] implementations under [`sites`]; [`GenericTracker`] wraps any of them with
//! mirror fallback, the page cache and (for private sites) the login state machine.

pub mod generic;
pub mod mirrors;
pub mod registry;
pub mod session;
pub mod sites;

use crate::core::magnet::MagnetHash;
use crate::core::record::{PageMetadata, TorrentRecord};
use crate::error::TrackerError;
use crate::network::page::Page;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub use generic::GenericTracker;
pub use registry::TrackerRegistry;
pub use session::TrackerSession;

static RE_MAGNET_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^magnet:\?xt=urn:btih:").expect("magnet link pattern is valid"));

/// Alias and mirrors of a tracker site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerIdentity {
    /// Primary domain; unique across the registry.
    pub alias: String,
    pub mirror_domains: Vec<String>,
    /// Page encoding label (e.g. `windows-1251`), UTF-8 when absent.
    pub encoding: Option<String>,
}

impl TrackerIdentity {
    pub fn new(alias: &str, mirror_domains: &[&str]) -> Self {
        TrackerIdentity {
            alias: alias.to_string(),
            mirror_domains: mirror_domains.iter().map(|d| d.to_string()).collect(),
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_string());
        self
    }

    /// True if the alias or any mirror domain occurs in `candidate` (a URL, a comment).
    pub fn can_handle(&self, candidate: &str) -> bool {
        std::iter::once(&self.alias)
            .chain(self.mirror_domains.iter())
            .any(|domain| candidate.contains(domain.as_str()))
    }
}

/// Contract of a tracker handler as used by the registry and the reconciliation engine.
#[async_trait]
pub trait Tracker: Send {
    fn identity(&self) -> &TrackerIdentity;

    fn alias(&self) -> &str {
        &self.identity().alias
    }

    fn mirror_domains(&self) -> &[String] {
        &self.identity().mirror_domains
    }

    fn can_handle(&self, candidate: &str) -> bool {
        self.identity().can_handle(candidate)
    }

    /// Downloads and parses the torrent published at `url`, trying mirrors in order.
    async fn resolve_torrent(&mut self, url: &str) -> Result<TorrentRecord, TrackerError>;

    /// Info hash published at `url`, without downloading the torrent file.
    async fn resolve_magnet(&mut self, url: &str) -> Result<MagnetHash, TrackerError>;

    /// Torrent file download link located at `url`, not fetched.
    async fn resolve_download_url(&mut self, url: &str) -> Result<String, TrackerError>;

    /// Checks the handler settings, e.g. by logging in.
    async fn test_configuration(&mut self) -> bool;
}

/// Login form of a private tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Login URL, `{domain}` is replaced with the mirror being used.
    pub url: String,
    /// Cookie whose presence in the login response means success.
    pub auth_cookie_name: Option<String>,
    /// Query string parameter (session id) appearing after redirect on success.
    pub auth_qs_param_name: Option<String>,
    pub username_field: String,
    pub password_field: String,
    pub extra_fields: Vec<(String, String)>,
}

impl LoginForm {
    pub fn with_cookie(url: &str, auth_cookie_name: &str) -> Self {
        LoginForm {
            url: url.to_string(),
            auth_cookie_name: Some(auth_cookie_name.to_string()),
            auth_qs_param_name: None,
            username_field: "username".to_string(),
            password_field: "password".to_string(),
            extra_fields: Vec::new(),
        }
    }

    pub fn with_query_param(url: &str, auth_qs_param_name: &str) -> Self {
        LoginForm {
            auth_cookie_name: None,
            auth_qs_param_name: Some(auth_qs_param_name.to_string()),
            ..Self::with_cookie(url, "")
        }
    }

    pub fn url_for(&self, domain: &str) -> String {
        self.url.replace("{domain}", domain)
    }

    pub fn fields(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut fields = vec![
            (self.username_field.clone(), username.to_string()),
            (self.password_field.clone(), password.to_string()),
        ];
        fields.extend(self.extra_fields.iter().cloned());
        fields
    }
}

/// Site-specific extraction rules, the pluggable part of a tracker handler.
#[async_trait]
pub trait SiteRules: Send + Sync {
    fn identity(&self) -> TrackerIdentity;

    /// Private trackers return their login form; public ones need none.
    fn login_form(&self) -> Option<LoginForm> {
        None
    }

    /// Locates the torrent file link on the page at `url`.
    async fn download_link(
        &self,
        session: &mut TrackerSession,
        url: &Url,
    ) -> Result<Option<String>, TrackerError>;

    async fn magnet(
        &self,
        session: &mut TrackerSession,
        url: &Url,
    ) -> Result<Option<MagnetHash>, TrackerError> {
        let page = session.torrent_page(url, true).await?;
        Ok(page
            .find_link(&RE_MAGNET_LINK)
            .and_then(|link| MagnetHash::from_uri(&link)))
    }

    fn page_metadata(&self, page: &Page) -> PageMetadata {
        PageMetadata {
            title: page.title(),
            ..Default::default()
        }
    }

    /// Runs right before the torrent file download, e.g. to set a sentinel cookie.
    async fn before_download(
        &self,
        _session: &mut TrackerSession,
        _url: &str,
    ) -> Result<(), TrackerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_handle_alias_and_mirrors() {
        let identity = TrackerIdentity::new("a.com", &["b.com", "c.net"]);
        assert!(identity.can_handle("http://a.com/x?id=7"));
        assert!(identity.can_handle("See http://www.c.net/topic/1"));
        assert!(!identity.can_handle("http://d.org/x"));
    }

    #[test]
    fn test_login_form_fields() {
        let mut form = LoginForm::with_cookie("https://{domain}/takelogin.php", "uid");
        form.extra_fields.push(("returnto".to_string(), String::new()));

        assert_eq!(form.url_for("b.com"), "https://b.com/takelogin.php");
        assert_eq!(
            form.fields("joe", "secret"),
            vec![
                ("username".to_string(), "joe".to_string()),
                ("password".to_string(), "secret".to_string()),
                ("returnto".to_string(), String::new()),
            ]
        );

        let by_query = LoginForm::with_query_param("https://{domain}/login", "sid");
        assert_eq!(by_query.auth_cookie_name, None);
        assert_eq!(by_query.auth_qs_param_name.as_deref(), Some("sid"));
    }
}
