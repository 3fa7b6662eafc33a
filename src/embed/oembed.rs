use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{IGNORED_PERMISSIONS, MAX_PLAYER_HEIGHT, Player, SAFE_PERMISSIONS};
use crate::fetch::Fetcher;
use crate::utils::absolute_url;

static PERMISSION_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*;\s*").expect("permission separator is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OEmbedType {
    Photo,
    Video,
    Link,
    Rich,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OEmbedDescriptor {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: OEmbedType,
    pub html: Option<String>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
}

pub fn discover(doc: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse(r#"link[type="application/json+oembed"]"#).ok()?;
    let href = doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .filter(|href| !href.is_empty())?;
    absolute_url(href, page_url).ok()
}

pub async fn fetch_player(fetcher: &Fetcher, endpoint: &Url) -> Option<Player> {
    let response = match fetcher.get(endpoint).await {
        Ok(response) => response,
        Err(err) => {
            debug!(url = %endpoint, %err, "oEmbed fetch failed");
            return None;
        }
    };
    let descriptor = match response.json::<OEmbedDescriptor>() {
        Ok(descriptor) => descriptor,
        Err(err) => {
            debug!(url = %endpoint, %err, "oEmbed body is not a descriptor");
            return None;
        }
    };
    let player = validate(&descriptor);
    if player.is_none() {
        debug!(url = %endpoint, "oEmbed descriptor rejected");
    }
    player
}

/// Turns a descriptor into a player, or `None` at the first failed check.
pub fn validate(descriptor: &OEmbedDescriptor) -> Option<Player> {
    if descriptor.version != "1.0" {
        return None;
    }
    if !matches!(descriptor.kind, OEmbedType::Rich | OEmbedType::Video) {
        return None;
    }

    let html = descriptor.html.as_deref()?.trim();
    if !html.starts_with("<iframe ") || !html.ends_with("</iframe>") {
        return None;
    }

    let doc = Html::parse_document(html);
    let iframe = sole_iframe(&doc)?;
    let attrs = iframe.value();

    let url = https_src(attrs.attr("src")?)?;
    let width = dimension(attrs.attr("width"), descriptor.width.as_ref()).and_then(positive);
    let height = dimension(attrs.attr("height"), descriptor.height.as_ref())
        .and_then(positive)?
        .min(MAX_PLAYER_HEIGHT);
    let allow = permissions(attrs.attr("allow"), attrs.attr("allowfullscreen").is_some())?;

    Some(Player {
        url: Some(url),
        width,
        height: Some(height),
        allow,
    })
}

/// The only iframe in `doc`, directly under the implied `html > body`.
fn sole_iframe(doc: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("iframe").ok()?;
    let mut iframes = doc.select(&selector);
    let iframe = iframes.next()?;
    if iframes.next().is_some() {
        return None;
    }
    let depth = iframe
        .ancestors()
        .filter(|node| node.value().is_element())
        .count();
    (depth == 2).then_some(iframe)
}

fn https_src(src: &str) -> Option<String> {
    let url = Url::parse(src).ok()?;
    (url.scheme() == "https").then(|| url.to_string())
}

fn dimension(attr: Option<&str>, fallback: Option<&Value>) -> Option<f64> {
    let value = match attr.filter(|a| !a.is_empty()) {
        Some(attr) => attr.trim().parse::<f64>().ok()?,
        None => match fallback? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        },
    };
    value.is_finite().then_some(value)
}

fn positive(value: f64) -> Option<u32> {
    let value = value.trunc();
    (value >= 1.0).then(|| value.min(u32::MAX as f64) as u32)
}

/// Validated `allow` list; `None` if any permission is outside the safe set.
fn permissions(allow: Option<&str>, allowfullscreen: bool) -> Option<Vec<String>> {
    let mut granted: Vec<String> = Vec::new();
    let requested = PERMISSION_SEPARATOR
        .split(allow.unwrap_or("").trim())
        .filter(|token| !token.is_empty() && !IGNORED_PERMISSIONS.contains(token));
    let legacy = allowfullscreen.then_some("fullscreen");

    for token in requested.chain(legacy) {
        if !SAFE_PERMISSIONS.contains(&token) {
            return None;
        }
        if !granted.iter().any(|g| g == token) {
            granted.push(token.to_string());
        }
    }
    Some(granted)
}
