use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([a-zA-Z]{2}|\*)(-[a-zA-Z]{2})?(;q=\d.\d)?(\s?,\s?)?)+$")
        .expect("language pattern is valid")
});

const TITLE_SEPARATORS: &str = r"\-\|:・—–";

pub fn absolute_url(candidate: &str, base: &Url) -> Result<Url, url::ParseError> {
    Url::parse(candidate).or_else(|_| base.join(candidate))
}

pub fn ellipsis(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Drops a trailing `<separator> <site name>` suffix from a page title.
pub fn trim_title(title: &str, site_name: &str) -> String {
    let title = title.trim();
    let site_name = site_name.trim();
    if site_name.is_empty() {
        return title.to_string();
    }

    let pattern = format!(
        r"^(.+?)\s?[{TITLE_SEPARATORS}]\s?{}$",
        regex::escape(site_name)
    );
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(title))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| title.to_string())
}

pub fn normalize_language(language: &str) -> Option<String> {
    let language = language.trim();
    if language.is_empty() || !LANGUAGE.is_match(language) {
        return None;
    }
    Some(language.to_string())
}
