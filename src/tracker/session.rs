use crate::config::{ConfigStore, TrackerSettings};
use crate::error::TrackerError;
use crate::network::page::Page;
use crate::network::{CookieJar, HttpClient, HttpResponse, RequestOptions};
use crate::tracker::{LoginForm, TrackerIdentity};
use encoding_rs::Encoding;
use log::{debug, warn};
use std::sync::Arc;
use url::Url;

/// Single-slot cache of the last fetched tracker page.
#[derive(Debug, Default)]
struct PageCache {
    url: Option<String>,
    page: Option<Page>,
}

/// Authentication state of a private tracker.
#[derive(Debug)]
struct LoginState {
    form: LoginForm,
    username: Option<String>,
    password: Option<String>,
    authenticated: bool,
    /// Login attempts in the current logical operation; at most one is made.
    attempts: u32,
}

impl LoginState {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Everything a tracker handler owns between calls: HTTP client, credentials, session
/// artifact and the page cache. Site rules reach the network only through it.
pub struct TrackerSession {
    alias: String,
    encoding: Option<&'static Encoding>,
    client: HttpClient,
    cookies: CookieJar,
    query_string: Option<String>,
    cache: PageCache,
    login: Option<LoginState>,
    store: Option<Arc<dyn ConfigStore>>,
}

impl TrackerSession {
    pub fn new(
        identity: &TrackerIdentity,
        client: HttpClient,
        settings: TrackerSettings,
        login_form: Option<LoginForm>,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> Self {
        let login = login_form.map(|form| LoginState {
            form,
            username: settings.username,
            password: settings.password,
            authenticated: false,
            attempts: 0,
        });

        let encoding = identity
            .encoding
            .as_deref()
            .and_then(|label| Encoding::for_label(label.as_bytes()));

        TrackerSession {
            alias: identity.alias.clone(),
            encoding,
            client: client.for_tracker(&identity.alias, encoding),
            cookies: settings.cookies,
            query_string: settings.query_string.filter(|qs| !qs.is_empty()),
            cache: PageCache::default(),
            login,
            store,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.encoding
    }

    pub fn is_private(&self) -> bool {
        self.login.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.as_ref().is_some_and(LoginState::is_authenticated)
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    /// Starts a new logical operation: the login attempt counter is reset.
    pub fn begin_operation(&mut self) {
        if let Some(login) = self.login.as_mut() {
            login.attempts = 0;
        }
    }

    /// Query string attached to page requests: `<param>=<session id>` for trackers that
    /// authenticate through the query string, the stored value otherwise.
    pub fn query_string(&self) -> Option<String> {
        let param = self
            .login
            .as_ref()
            .and_then(|login| login.form.auth_qs_param_name.as_ref());

        match (param, &self.query_string) {
            (Some(param), Some(value)) => Some(format!("{}={}", param, value)),
            (Some(_), None) => None,
            (None, value) => value.clone(),
        }
    }

    /// Current settings including the captured session artifact.
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            username: self.login.as_ref().and_then(|l| l.username.clone()),
            password: self.login.as_ref().and_then(|l| l.password.clone()),
            cookies: self.cookies.clone(),
            query_string: self.query_string.clone(),
        }
    }

    /// Raw request through the handler's client.
    pub async fn fetch(
        &mut self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Option<HttpResponse>, TrackerError> {
        Ok(self.client.request(url, options).await?)
    }

    /// The page at `url`, served from the single-slot cache unless `drop_cache` is set or
    /// the cache holds another URL.
    pub async fn torrent_page(&mut self, url: &Url, drop_cache: bool) -> Result<Page, TrackerError> {
        let key = url.as_str();

        if !drop_cache && self.cache.url.as_deref() == Some(key) {
            if let Some(page) = &self.cache.page {
                debug!("Page cache hit for {}", key);
                return Ok(page.clone());
            }
        }

        let options = RequestOptions::default()
            .referer(key)
            .cookies(&self.cookies)
            .query_string(self.query_string());
        let response = self.fetch(key, options).await?;
        let page = response.map(|response| Page::from_response(&response, self.encoding));

        self.cache.url = Some(key.to_string());
        self.cache.page = page.clone();

        page.ok_or_else(|| TrackerError::NoResponse(key.to_string()))
    }

    /// The cached page, if the last fetch succeeded.
    pub fn cached_page(&self) -> Option<&Page> {
        self.cache.page.as_ref()
    }

    /// Logs in at `domain`. Returns whether the session is now authenticated.
    ///
    /// Public trackers and missing credentials yield `Ok(false)` without a request, as
    /// does a second attempt within one operation. Logging in while already
    /// authenticated is a caller bug and fails with [`TrackerError::ConsecutiveLogin`].
    pub async fn login(&mut self, domain: &str) -> Result<bool, TrackerError> {
        let Some(login) = self.login.as_mut() else {
            return Ok(false);
        };

        let login_url = login.form.url_for(domain);
        debug!("Trying to login at {} ...", login_url);

        if login.authenticated {
            return Err(TrackerError::ConsecutiveLogin(self.alias.clone()));
        }

        let (Some(username), Some(password)) = (login.username.clone(), login.password.clone())
        else {
            return Ok(false);
        };
        if username.is_empty() {
            return Ok(false);
        }

        login.attempts += 1;
        if login.attempts > 1 {
            debug!("Login at {} already attempted in this operation", login_url);
            return Ok(false);
        }

        // The session id only shows up after the redirect; an auth cookie may get lost on it.
        let follow_redirects = login.form.auth_qs_param_name.is_some();
        let form = login.form.clone();

        let options = RequestOptions::default()
            .form(form.fields(&username, &password))
            .follow_redirects(follow_redirects)
            .cookies(&self.cookies);

        let Some(response) = self.fetch(&login_url, options).await? else {
            return Ok(false);
        };
        if !response.is_ok() {
            warn!("Login at {} answered with status {}", login_url, response.status);
            return Ok(false);
        }

        let session_id = form.auth_qs_param_name.as_ref().and_then(|param| {
            response
                .url
                .query_pairs()
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned())
        });
        let has_auth_cookie = form
            .auth_cookie_name
            .as_ref()
            .is_some_and(|name| response.cookies.contains_key(name));

        if !has_auth_cookie && session_id.is_none() {
            warn!("{}", TrackerError::Authentication(login_url));
            return Ok(false);
        }

        if let Some(session_id) = session_id {
            self.query_string = Some(session_id);
        }
        self.cookies.extend(response.cookies);
        if let Some(login) = self.login.as_mut() {
            login.authenticated = true;
        }

        self.save_settings();
        debug!("Login at {} is successful", self.alias);

        Ok(true)
    }

    /// Torrent file contents, `None` when the request failed silently.
    ///
    /// Private trackers attach the session cookies and query string.
    pub async fn download(&mut self, url: &str, referer: &str) -> Result<Option<Vec<u8>>, TrackerError> {
        debug!("Downloading torrent file from {} ...", url);

        let mut options = RequestOptions::default().referer(referer);
        if self.is_private() {
            options = options
                .cookies(&self.cookies)
                .query_string(self.query_string());
        }

        Ok(self.fetch(url, options).await?.map(|response| response.body))
    }

    fn save_settings(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let alias = self.alias.clone();
        let mut settings = Some(self.settings());
        let result = store.update(&mut |document| {
            if let Some(settings) = settings.take() {
                document.trackers.insert(alias.clone(), settings);
            }
        });
        if let Err(e) = result {
            warn!("Unable to save session of `{}`: {}", self.alias, e);
        }
    }
}
