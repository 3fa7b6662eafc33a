use tracing::{debug, info};
use url::Url;

use crate::config::{FetchConfig, SamaryOptions};
use crate::embed::EmbedSources;
use crate::error::SamaryError;
use crate::fetch::Fetcher;
use crate::picker::pick;
use crate::plugin::find_plugin;
use crate::summary::{Summary, SummaryResult};
use crate::utils::{absolute_url, normalize_language, trim_title};

/// Only a failure to fetch the page itself is returned as an error; icon,
/// oEmbed and embed validation failures just leave their fields empty.
pub async fn summarize(url: &str, options: &SamaryOptions) -> Result<SummaryResult, SamaryError> {
    let parsed = Url::parse(url).map_err(|source| SamaryError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let language = options.language.as_deref();

    let summary = match find_plugin(&options.plugins, &parsed) {
        Some(plugin) => {
            debug!(url = %parsed, plugin = plugin.name(), "summarizing with plugin");
            plugin.summarize(&parsed, language).await?
        }
        None => summarize_general(&parsed, language, &options.fetch).await?,
    };

    Ok(SummaryResult {
        summary,
        url: url.to_string(),
    })
}

pub async fn summarize_general(
    url: &Url,
    language: Option<&str>,
    config: &FetchConfig,
) -> Result<Summary, SamaryError> {
    let fetcher = Fetcher::new(config.clone())?;
    let language = language.and_then(normalize_language);
    let document = fetcher.fetch_document(url, language.as_deref()).await?;
    info!(url = %url, final_url = %document.url, bytes = document.html.len(), "fetched page");

    let (picked, sources) = {
        let doc = document.parse();
        (pick(&doc), EmbedSources::collect(&doc, &document.url))
    };

    let site_name = picked
        .site_name
        .unwrap_or_else(|| url.host_str().unwrap_or_default().to_string());
    let title = match trim_title(&picked.title, &site_name) {
        title if title.is_empty() => site_name.clone(),
        title => title,
    };
    let description = picked.description.filter(|description| *description != title);
    let thumbnail = picked
        .image
        .and_then(|image| absolute_url(&image, &document.url).ok())
        .map(String::from);
    let icon = absolute_url(&picked.icon, &document.url).ok();

    let (icon, player) = tokio::join!(probe_icon(&fetcher, icon), sources.resolve(&fetcher));

    Ok(Summary {
        site_name,
        title,
        description,
        thumbnail,
        icon,
        sensitive: picked.sensitive,
        activity_pub: picked.activity_pub,
        player,
    })
}

async fn probe_icon(fetcher: &Fetcher, icon: Option<Url>) -> Option<String> {
    let icon = icon?;
    match fetcher.head(&icon).await {
        Ok(_) => Some(icon.into()),
        Err(err) => {
            debug!(url = %icon, %err, "icon probe failed");
            None
        }
    }
}
