use std::sync::LazyLock;

use regex::Regex;

static COOKIE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ ?\S+=").expect("cookie start pattern is valid")
});

/// Splits a comma-joined `Set-Cookie` value into individual cookie entries.
///
/// A comma only starts a new entry when the following text looks like
/// `name=`; otherwise it belongs to the previous entry (e.g. the date inside
/// `Expires=Wed, 09 Jun 2021 10:18:14 GMT`).
pub fn split_set_cookies(set_cookie: &str) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    for piece in set_cookie.split(',') {
        match entries.last_mut() {
            Some(last) if !COOKIE_START.is_match(piece) => {
                last.push(',');
                last.push_str(piece);
            }
            _ => entries.push(piece.to_string()),
        }
    }
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn cookie_pair(entry: &str) -> &str {
    entry.split(';').next().unwrap_or("").trim()
}

/// Only ever fed from `Set-Cookie` headers seen earlier in the same chain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectState {
    cookie: Option<String>,
}

impl RedirectState {
    pub fn new(cookie: Option<String>) -> Self {
        Self {
            cookie: cookie.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn absorb(mut self, set_cookie: &str) -> Self {
        let mut pairs: Vec<String> = self
            .cookie
            .as_deref()
            .map(|c| c.split(';').map(|p| p.trim().to_string()).collect())
            .unwrap_or_default();
        pairs.retain(|p| !p.is_empty());

        for entry in split_set_cookies(set_cookie) {
            let pair = cookie_pair(&entry);
            if pair.is_empty() || pairs.iter().any(|p| p == pair) {
                continue;
            }
            pairs.push(pair.to_string());
        }

        self.cookie = if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        };
        self
    }
}
