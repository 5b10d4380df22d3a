use crate::network::HttpResponse;
use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use url::Url;

static RE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href pattern is valid")
});

static RE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
});

const ENGLISH_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A fetched tracker page: its URL and the HTML decoded with the tracker encoding.
///
/// Cloning is cheap; the cached page of a handler is handed out by value.
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    html: Arc<str>,
}

impl Page {
    pub fn new(url: Url, html: &str) -> Self {
        Page {
            url,
            html: Arc::from(html),
        }
    }

    pub fn from_response(response: &HttpResponse, encoding: Option<&'static Encoding>) -> Self {
        Page {
            url: response.url.clone(),
            html: Arc::from(response.text(encoding)),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// The first hyperlink whose `href` matches `pattern` (searched, not anchored).
    pub fn find_link(&self, pattern: &Regex) -> Option<String> {
        self.hrefs()
            .find(|href| pattern.is_match(href))
            .map(|href| expand_link(&self.url, href))
    }

    pub fn title(&self) -> String {
        RE_TITLE
            .captures(&self.html)
            .and_then(|captures| captures.get(1))
            .map(|m| unescape(m.as_str().trim()))
            .unwrap_or_default()
    }

    /// First capture group of `pattern` anywhere in the HTML.
    pub fn capture(&self, pattern: &Regex) -> Option<String> {
        pattern
            .captures(&self.html)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn hrefs(&self) -> impl Iterator<Item = &str> {
        RE_HREF.captures_iter(&self.html).filter_map(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str())
        })
    }
}

/// Expands a relative link against the page URL; absolute links pass through.
pub fn expand_link(base: &Url, link: &str) -> String {
    let link = unescape(link);
    if link.starts_with("http") {
        return link;
    }
    base.join(&link)
        .map(|url| url.to_string())
        .unwrap_or(link)
}

fn unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Parses a date written with localized month names without touching process locale.
///
/// `month_names` lists the site's names (or any unambiguous prefix) January first; they
/// are swapped for English abbreviations so that `%b` in `format` matches.
pub fn parse_datetime(
    text: &str,
    format: &str,
    month_names: Option<&[&str; 12]>,
) -> Option<NaiveDateTime> {
    let mut normalized = text.trim().to_string();

    if let Some(names) = month_names {
        let lowered = normalized.to_lowercase();
        for (index, name) in names.iter().enumerate() {
            let name = name.to_lowercase();
            if let Some(start) = lowered.find(&name) {
                let end = lowered[start..]
                    .find(|c: char| !c.is_alphabetic())
                    .map(|offset| start + offset)
                    .unwrap_or(lowered.len());
                normalized = format!(
                    "{}{}{}",
                    &lowered[..start],
                    ENGLISH_MONTHS[index],
                    &lowered[end..]
                );
                break;
            }
        }
    }

    NaiveDateTime::parse_from_str(&normalized, format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const RUSSIAN_MONTHS: [&str; 12] = [
        "январ", "феврал", "март", "апрел", "ма", "июн", "июл", "август", "сентябр",
        "октябр", "ноябр", "декабр",
    ];

    fn page(html: &str) -> Page {
        Page::new(Url::parse("http://a.com/forum/details.php?id=7").unwrap(), html)
    }

    #[test]
    fn test_find_link_expands_relative() {
        let page = page(
            r#"<a href="/signup.php">Join</a>
               <a href='/download.php?id=7'>Get</a>
               <a href="http://cdn.a.com/x.torrent">Mirror</a>"#,
        );

        let link = page.find_link(&Regex::new(r"/download.+=7").unwrap());
        assert_eq!(link.as_deref(), Some("http://a.com/download.php?id=7"));

        let torrent = page.find_link(&Regex::new(r"\.torrent").unwrap());
        assert_eq!(torrent.as_deref(), Some("http://cdn.a.com/x.torrent"));

        assert!(page.find_link(&Regex::new("logout").unwrap()).is_none());
    }

    #[test]
    fn test_title_and_capture() {
        let page = page("<html><head><TITLE> Show &amp; Tell </TITLE></head><li>Hash: ABC</li></html>");
        assert_eq!(page.title(), "Show & Tell");
        assert_eq!(
            page.capture(&Regex::new(r"Hash: (\w+)").unwrap()).as_deref(),
            Some("ABC")
        );
        assert_eq!(self::page("<p>untitled</p>").title(), "");
    }

    #[test]
    fn test_decodes_with_tracker_encoding() {
        let response = HttpResponse {
            url: Url::parse("http://a.com/").unwrap(),
            status: 200,
            cookies: Default::default(),
            body: vec![0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2],
        };
        let page = Page::from_response(&response, Encoding::for_label(b"windows-1251"));
        assert_eq!(page.html(), "Привет");
    }

    #[test]
    fn test_parse_localized_datetime() {
        let parsed = parse_datetime(
            "12 января 2024 15:30",
            "%d %b %Y %H:%M",
            Some(&RUSSIAN_MONTHS),
        )
        .unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 1, 12));
        assert_eq!((parsed.hour(), parsed.minute()), (15, 30));

        let english = parse_datetime("03 Mar 2023 10:00", "%d %b %Y %H:%M", None).unwrap();
        assert_eq!(english.month(), 3);

        assert!(parse_datetime("yesterday", "%d %b %Y %H:%M", Some(&RUSSIAN_MONTHS)).is_none());
    }
}
