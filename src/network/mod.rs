pub mod page;
pub mod transport;

use crate::error::HttpError;
use crate::utils::encode_form;
use async_trait::async_trait;
use encoding_rs::Encoding;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Cookie name to value. Persisted per tracker as part of its session artifact.
pub type CookieJar = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully prepared request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL after redirects were resolved.
    pub url: Url,
    pub status: u16,
    pub cookies: CookieJar,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Anything below 400, redirects included.
    pub fn is_ok(&self) -> bool {
        self.status < 400
    }

    pub fn text(&self, encoding: Option<&'static Encoding>) -> String {
        let encoding = encoding.unwrap_or(encoding_rs::UTF_8);
        encoding.decode(&self.body).0.into_owned()
    }
}

/// Sends requests over the wire. Retries and timeouts are the transport's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Per-request knobs of [`HttpClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Sends a POST with these fields when present, even if empty.
    pub form: Option<Vec<(String, String)>>,
    pub referer: Option<String>,
    pub follow_redirects: bool,
    pub cookies: CookieJar,
    /// Appended to the URL as is, e.g. `sid=123`.
    pub query_string: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            form: None,
            referer: None,
            follow_redirects: true,
            cookies: CookieJar::new(),
            query_string: None,
        }
    }
}

impl RequestOptions {
    pub fn referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn cookies(mut self, cookies: &CookieJar) -> Self {
        self.cookies = cookies.clone();
        self
    }

    pub fn query_string(mut self, query_string: Option<String>) -> Self {
        self.query_string = query_string.filter(|qs| !qs.is_empty());
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpClientOptions {
    /// Log failures and return `None` instead of raising them.
    pub silence_errors: bool,
    /// Encoding applied to form values.
    pub encoding: Option<&'static Encoding>,
    /// Directory to dump every response body into, for debugging extraction rules.
    pub dump_into: Option<PathBuf>,
    /// File name prefix of dumps, usually the tracker alias.
    pub dump_name: String,
}

/// Common client used by tracker handlers to talk to tracker sites.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    options: HttpClientOptions,
    last_error: Option<String>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>, options: HttpClientOptions) -> Self {
        HttpClient {
            transport,
            options,
            last_error: None,
        }
    }

    /// Form values get encoded with `encoding`; dumps are prefixed with `alias`.
    pub fn for_tracker(mut self, alias: &str, encoding: Option<&'static Encoding>) -> Self {
        self.options.encoding = encoding;
        self.options.dump_name = alias.to_string();
        self
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Performs a GET, or a POST when form data is given.
    ///
    /// Returns `Ok(None)` on failure when the client silences errors.
    pub async fn request(
        &mut self,
        url: &str,
        options: RequestOptions,
    ) -> Result<Option<HttpResponse>, HttpError> {
        let result = self.send(url, options).await;

        match result {
            Ok(response) => {
                self.dump(&response).await;
                Ok(Some(response))
            }
            Err(e) => {
                warn!("Failed to get response from `{}`: {}", url, e);
                self.last_error = Some(e.to_string());
                if self.options.silence_errors {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn send(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        let full_url = match &options.query_string {
            Some(query_string) => {
                let delimiter = if url.contains('?') { '&' } else { '?' };
                format!("{}{}{}", url, delimiter, query_string)
            }
            None => url.to_string(),
        };

        debug!("Fetching {} ...", full_url);

        let parsed = Url::parse(&full_url).map_err(|_| HttpError::InvalidUrl(full_url.clone()))?;

        let mut headers = Vec::new();
        if let Some(referer) = options.referer.filter(|r| !r.is_empty()) {
            headers.push(("Referer".to_string(), referer));
        }
        if !options.cookies.is_empty() {
            let cookie = options
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.push(("Cookie".to_string(), cookie));
        }

        let (method, body) = match options.form {
            Some(fields) => {
                headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
                (Method::Post, Some(encode_form(&fields, self.options.encoding)))
            }
            None => (Method::Get, None),
        };

        self.transport
            .execute(HttpRequest {
                method,
                url: parsed,
                headers,
                body,
                follow_redirects: options.follow_redirects,
            })
            .await
    }

    async fn dump(&self, response: &HttpResponse) {
        let Some(dir) = &self.options.dump_into else {
            return;
        };
        let file_name = format!(
            "{}_{}.html",
            chrono::Utc::now().timestamp_millis(),
            self.options.dump_name
        );
        if let Err(e) = tokio::fs::write(dir.join(file_name), &response.body).await {
            warn!("Unable to dump response from `{}`: {}", response.url, e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;

    #[tokio::test]
    async fn test_query_string_referer_and_cookies() {
        let transport = FakeTransport::new();
        transport.route("http://a.com/x?id=7&sid=42", "ok");
        let mut client = fake::client(&transport);

        let mut cookies = CookieJar::new();
        cookies.insert("uid".to_string(), "1".to_string());
        cookies.insert("pass".to_string(), "x".to_string());

        let response = client
            .request(
                "http://a.com/x?id=7",
                RequestOptions::default()
                    .referer("http://a.com/")
                    .cookies(&cookies)
                    .query_string(Some("sid=42".to_string())),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body, b"ok");

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert!(request.headers.contains(&("Referer".to_string(), "http://a.com/".to_string())));
        assert!(request.headers.contains(&("Cookie".to_string(), "pass=x; uid=1".to_string())));
    }

    #[tokio::test]
    async fn test_form_sends_post() {
        let transport = FakeTransport::new();
        transport.route("http://a.com/login", "");
        let mut client = fake::client(&transport);

        client
            .request(
                "http://a.com/login",
                RequestOptions::default()
                    .form(vec![("username".to_string(), "joe".to_string())])
                    .follow_redirects(false),
            )
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert!(!request.follow_redirects);
        assert_eq!(request.body.as_deref(), Some(&b"username=joe"[..]));
    }

    #[tokio::test]
    async fn test_silenced_failure_returns_none() {
        let transport = FakeTransport::new();
        let mut client = fake::client(&transport);

        let response = client
            .request("http://down.example/", RequestOptions::default())
            .await
            .unwrap();
        assert!(response.is_none());
        assert!(client.last_error().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_raising_client_returns_error() {
        let transport = FakeTransport::new();
        let mut client = HttpClient::new(transport.clone(), HttpClientOptions::default());

        let result = client.request("http://down.example/", RequestOptions::default()).await;
        assert!(matches!(result, Err(HttpError::Transport { .. })));

        let invalid = client.request("not a url", RequestOptions::default()).await;
        assert!(matches!(invalid, Err(HttpError::InvalidUrl(_))));
    }
}
