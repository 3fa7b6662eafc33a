use serde::{Deserialize, Serialize};

use crate::embed::Player;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub site_name: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Only set when the icon answered a HEAD probe.
    pub icon: Option<String>,
    pub sensitive: bool,
    pub activity_pub: Option<String>,
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    #[serde(flatten)]
    pub summary: Summary,
    pub url: String,
}
