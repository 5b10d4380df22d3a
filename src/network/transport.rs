use crate::config::HttpSettings;
use crate::error::HttpError;
use crate::network::{CookieJar, HttpRequest, HttpResponse, Method, Transport};
use async_trait::async_trait;
use log::debug;
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// [`Transport`] backed by reqwest.
///
/// Redirect handling is a client-level setting in reqwest, so two clients are kept:
/// logins detected through a cookie must not follow the redirect that drops it.
pub struct ReqwestTransport {
    following: Client,
    not_following: Client,
    max_retries: u32,
}

impl ReqwestTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
        Ok(ReqwestTransport {
            following: Self::build_client(settings, true)?,
            not_following: Self::build_client(settings, false)?,
            max_retries: settings.max_retries,
        })
    }

    fn build_client(settings: &HttpSettings, follow_redirects: bool) -> Result<Client, HttpError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(if follow_redirects {
                Policy::limited(10)
            } else {
                Policy::none()
            });

        builder = match (&settings.proxy, settings.tunnel) {
            (_, false) => builder.no_proxy(),
            (Some(proxy), true) => builder.proxy(Proxy::all(proxy).map_err(HttpError::Client)?),
            (None, true) => builder,
        };

        builder.build().map_err(HttpError::Client)
    }

    async fn collect(response: reqwest::Response) -> Result<HttpResponse, HttpError> {
        let url = response.url().clone();
        let status = response.status().as_u16();
        let cookies: CookieJar = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        let body = response.bytes().await.map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })?;

        Ok(HttpResponse {
            url,
            status,
            cookies,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.not_following
        };

        let mut attempt = 0;
        loop {
            let mut builder = match request.method {
                Method::Get => client.get(request.url.clone()),
                Method::Post => client.post(request.url.clone()),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            match builder.send().await {
                Ok(response) => return Self::collect(response).await,
                Err(e) if e.is_connect() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        "Connection to {} failed, retrying ({}/{}): {}",
                        request.url, attempt, self.max_retries, e
                    );
                }
                Err(source) => {
                    return Err(HttpError::Request {
                        url: request.url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_defaults() {
        assert!(ReqwestTransport::new(&HttpSettings::default()).is_ok());
    }
}
