//! URL origin and reference helpers.

use reqwest::Url;

/// Scheme, host and port of `url`, without a trailing slash.
///
/// Given `https://stoupbrewing.com/ballard/`, returns
/// `"https://stoupbrewing.com"`.
#[must_use]
pub fn extract_origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Resolves a possibly relative reference (an `img src`, say) against the
/// document URL. Returns `None` for blank references or when neither side
/// produces an absolute URL.
#[must_use]
pub fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(reference) {
        return Some(absolute.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(reference))
        .ok()
        .map(|u| u.to_string())
}
