pub mod oembed;
pub mod player;

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetch::Fetcher;

pub const SAFE_PERMISSIONS: [&str; 6] = [
    "autoplay",
    "clipboard-write",
    "fullscreen",
    "encrypted-media",
    "picture-in-picture",
    "web-share",
];

/// Permissions silently dropped from an iframe's `allow` list.
pub const IGNORED_PERMISSIONS: [&str; 2] = ["gyroscope", "accelerometer"];

pub const MAX_PLAYER_HEIGHT: u32 = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub allow: Vec<String>,
}

impl Player {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmbedSources {
    pub oembed: Option<Url>,
    pub native: Player,
}

impl EmbedSources {
    pub fn collect(doc: &Html, page_url: &Url) -> Self {
        Self {
            oembed: oembed::discover(doc, page_url),
            native: player::pick_player(doc),
        }
    }

    pub async fn resolve(self, fetcher: &Fetcher) -> Player {
        if let Some(endpoint) = &self.oembed
            && let Some(player) = oembed::fetch_player(fetcher, endpoint).await
        {
            return player;
        }
        self.native
    }
}

pub async fn resolve_embed(fetcher: &Fetcher, markup: &str, page_url: &Url) -> Player {
    let sources = {
        let doc = Html::parse_document(markup);
        EmbedSources::collect(&doc, page_url)
    };
    sources.resolve(fetcher).await
}
