use crate::tracker::TrackerIdentity;
use crate::utils::{netloc, replace_domain};
use url::Url;

/// Domains to try for `url`: the one actually used first, then alias and mirrors in
/// their configured order, without repeats.
pub fn mirror_order(identity: &TrackerIdentity, url: &Url) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();

    if let Some(original) = netloc(url) {
        domains.push(original);
    }

    for domain in std::iter::once(&identity.alias).chain(identity.mirror_domains.iter()) {
        if !domains.contains(domain) {
            domains.push(domain.clone());
        }
    }

    domains
}

/// `url` rewritten for every domain of [`mirror_order`]; only the host part changes.
pub fn mirror_urls(identity: &TrackerIdentity, url: &Url) -> Vec<Url> {
    mirror_order(identity, url)
        .iter()
        .filter_map(|domain| replace_domain(url, domain))
        .collect()
}
