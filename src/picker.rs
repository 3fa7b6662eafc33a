use scraper::{Html, Selector};

use crate::utils::ellipsis;

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 300;
pub const DEFAULT_ICON: &str = "/favicon.ico";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Picked {
    pub site_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub icon: String,
    pub sensitive: bool,
    pub activity_pub: Option<String>,
}

pub fn pick(doc: &Html) -> Picked {
    Picked {
        site_name: pick_site_name(doc),
        title: pick_title(doc),
        description: pick_description(doc),
        image: pick_image(doc),
        icon: pick_icon(doc),
        sensitive: pick_sensitive(doc),
        activity_pub: pick_activity_pub(doc),
    }
}

fn pick_site_name(doc: &Html) -> Option<String> {
    first_attr(
        doc,
        &[
            (r#"meta[property="og:site_name"]"#, "content"),
            (r#"meta[name="application-name"]"#, "content"),
        ],
    )
}

fn pick_title(doc: &Html) -> String {
    let title = first_attr(
        doc,
        &[
            (r#"meta[property="og:title"]"#, "content"),
            (r#"meta[property="twitter:title"]"#, "content"),
        ],
    )
    .unwrap_or_else(|| first_text(doc, "title"));
    ellipsis(&title, TITLE_MAX)
}

fn pick_description(doc: &Html) -> Option<String> {
    first_attr(
        doc,
        &[
            (r#"meta[property="og:description"]"#, "content"),
            (r#"meta[property="twitter:description"]"#, "content"),
            (r#"meta[name="description"]"#, "content"),
        ],
    )
    .map(|description| ellipsis(&description, DESCRIPTION_MAX))
}

fn pick_image(doc: &Html) -> Option<String> {
    first_attr(
        doc,
        &[
            (r#"meta[property="og:image"]"#, "content"),
            (r#"meta[property="twitter:image"]"#, "content"),
            (r#"link[rel="image_src"]"#, "href"),
            (r#"link[rel="apple-touch-icon"]"#, "href"),
            (r#"link[rel="apple-touch-icon image_src"]"#, "href"),
        ],
    )
}

fn pick_icon(doc: &Html) -> String {
    first_attr(
        doc,
        &[
            (r#"link[rel="shortcut icon"]"#, "href"),
            (r#"link[rel="icon"]"#, "href"),
        ],
    )
    .unwrap_or_else(|| DEFAULT_ICON.to_string())
}

fn pick_sensitive(doc: &Html) -> bool {
    first_attr(doc, &[(".tweet", "data-possibly-sensitive")]).as_deref() == Some("true")
}

fn pick_activity_pub(doc: &Html) -> Option<String> {
    first_attr(
        doc,
        &[(
            r#"link[rel="alternate"][type="application/activity+json"]"#,
            "href",
        )],
    )
}

fn first_attr(doc: &Html, candidates: &[(&str, &str)]) -> Option<String> {
    candidates.iter().find_map(|(selector, attr)| {
        let selector = Selector::parse(selector).ok()?;
        doc.select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn first_text(doc: &Html, selector: &str) -> String {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
}
