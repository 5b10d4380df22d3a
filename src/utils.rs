use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use url::{Url, form_urlencoded};

/// Matches the first hyperlink in free text, e.g. a torrent comment.
static RE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<url>https?://[^\s]+)").expect("link pattern is valid")
});

/// URL-encodes a byte slice into a string suitable for form bodies and query parameters.
///
/// Form values of trackers with legacy page encodings are already transcoded into
/// raw bytes at this point, so they are percent-encoded byte by byte.
pub fn url_encode(data: &[u8]) -> String {
    form_urlencoded::byte_serialize(data).collect()
}

/// Encodes a value with the tracker page encoding, UTF-8 when none is configured.
pub fn encode_value(value: &str, encoding: Option<&'static Encoding>) -> Vec<u8> {
    match encoding {
        Some(encoding) => encoding.encode(value).0.into_owned(),
        None => value.as_bytes().to_vec(),
    }
}

/// Builds an `application/x-www-form-urlencoded` body.
pub fn encode_form(fields: &[(String, String)], encoding: Option<&'static Encoding>) -> Vec<u8> {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                url_encode(&encode_value(key, encoding)),
                url_encode(&encode_value(value, encoding))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
        .into_bytes()
}

/// Returns the first URL found in a string, e.g. in a torrent comment.
pub fn get_url_from_string(string: &str) -> Option<String> {
    RE_LINK
        .captures(string)
        .and_then(|captures| captures.name("url"))
        .map(|m| m.as_str().to_string())
}

/// Host with an optional explicit port, the part of the URL mirrors substitute.
pub fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Substitutes the domain component of a URL keeping scheme, path and query.
pub fn replace_domain(url: &Url, domain: &str) -> Option<Url> {
    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (domain, None),
        },
        None => (domain, None),
    };

    let mut replaced = url.clone();
    replaced.set_host(Some(host)).ok()?;
    replaced.set_port(port).ok()?;
    Some(replaced)
}
