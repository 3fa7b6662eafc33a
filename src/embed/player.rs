use scraper::{Html, Selector};

use super::{MAX_PLAYER_HEIGHT, Player};

const NATIVE_PERMISSIONS: [&str; 3] = ["autoplay", "encrypted-media", "fullscreen"];

const TWITTER_PLAYER: [&str; 2] = [
    r#"meta[property="twitter:player"]"#,
    r#"meta[name="twitter:player"]"#,
];
const OG_VIDEO: [&str; 3] = [
    r#"meta[property="og:video"]"#,
    r#"meta[property="og:video:secure_url"]"#,
    r#"meta[property="og:video:url"]"#,
];
const WIDTH: [&str; 3] = [
    r#"meta[property="twitter:player:width"]"#,
    r#"meta[name="twitter:player:width"]"#,
    r#"meta[property="og:video:width"]"#,
];
const HEIGHT: [&str; 3] = [
    r#"meta[property="twitter:player:height"]"#,
    r#"meta[name="twitter:player:height"]"#,
    r#"meta[property="og:video:height"]"#,
];

pub fn pick_player(doc: &Html) -> Player {
    let image_card = first_content(doc, &[r#"meta[property="twitter:card"]"#]).as_deref()
        == Some("summary_large_image");
    let twitter = if image_card {
        None
    } else {
        first_content(doc, &TWITTER_PLAYER)
    };
    let url = twitter.or_else(|| first_content(doc, &OG_VIDEO));

    let width = first_content(doc, &WIDTH).and_then(|v| parse_int(&v));
    let height = first_content(doc, &HEIGHT)
        .and_then(|v| parse_int(&v))
        .map(|h| h.min(MAX_PLAYER_HEIGHT));

    let allow = if url.is_some() {
        NATIVE_PERMISSIONS.iter().map(|p| p.to_string()).collect()
    } else {
        Vec::new()
    };

    Player {
        url,
        width,
        height,
        allow,
    }
}

fn first_content(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        doc.select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .filter(|content| !content.is_empty())
            .map(str::to_string)
    })
}

/// Leading decimal integer of `value`; absent (never zero) when there is none.
fn parse_int(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .trim_start_matches('+')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}
