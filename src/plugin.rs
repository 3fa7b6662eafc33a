use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::summary::Summary;

/// A site-specific summarizer, selected by URL.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn test(&self, url: &Url) -> bool;

    async fn summarize(&self, url: &Url, language: Option<&str>) -> anyhow::Result<Summary>;
}

pub fn find_plugin<'a>(plugins: &'a [Arc<dyn Plugin>], url: &Url) -> Option<&'a Arc<dyn Plugin>> {
    plugins.iter().find(|plugin| plugin.test(url))
}
