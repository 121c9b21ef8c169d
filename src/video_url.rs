/// Video URL classification and id extraction
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::bookmark_data::VideoType;

/// Classify a tab URL as a trackable video page.
///
/// Algorithm:
/// 1. A URL containing "youtube.com/watch" is a standard video; its id is the
///    `v` query parameter.
/// 2. A URL containing "youtube.com/shorts" is a shorts video; its id is the
///    path segment after `/shorts/`, with any query string excluded.
/// 3. Anything else is not a video page (`None`), a legitimate state that
///    switches the popup into the browse view, not an error.
///
/// Examples:
/// - https://www.youtube.com/watch?v=dQw4w9WgXcQ → ("dQw4w9WgXcQ", Watch)
/// - https://www.youtube.com/shorts/abc123?feature=share → ("abc123", Shorts)
/// - https://www.youtube.com/feed/subscriptions → None
pub fn classify_video_url(url: &str) -> Option<(String, VideoType)> {
    if url.contains("youtube.com/watch") {
        return get_watch_video_id(url).map(|id| (id, VideoType::Watch));
    }

    if url.contains("youtube.com/shorts") {
        return get_shorts_video_id(url).map(|id| (id, VideoType::Shorts));
    }

    None
}

/// Extract the `v` query parameter from a watch-page URL.
pub fn get_watch_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Extract the video id from a shorts URL: the path segment following
/// `/shorts/`, stopping at the next `/` or `?`.
pub fn get_shorts_video_id(url: &str) -> Option<String> {
    static SHORTS_ID: OnceLock<Regex> = OnceLock::new();

    let re = SHORTS_ID.get_or_init(|| Regex::new(r"/shorts/([^/?]+)").unwrap());

    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The per-video static first frame that shorts pages expose. Watch pages
/// instead embed their thumbnail in structured page metadata, which only the
/// content script can read.
pub fn shorts_thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/frame0.jpg", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_url() {
        assert_eq!(
            classify_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some(("dQw4w9WgXcQ".to_string(), VideoType::Watch))
        );
        assert_eq!(
            classify_video_url("https://www.youtube.com/watch?list=PL123&v=abc&t=10s"),
            Some(("abc".to_string(), VideoType::Watch))
        );
    }

    #[test]
    fn test_classify_shorts_url() {
        assert_eq!(
            classify_video_url("https://www.youtube.com/shorts/xYz-_9"),
            Some(("xYz-_9".to_string(), VideoType::Shorts))
        );
    }

    #[test]
    fn test_shorts_id_excludes_query_string() {
        assert_eq!(
            get_shorts_video_id("https://x/shorts/abc123?foo=1"),
            Some("abc123".to_string())
        );
        assert_eq!(
            get_shorts_video_id("https://www.youtube.com/shorts/abc123/extra"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_non_video_pages() {
        assert_eq!(classify_video_url("https://www.youtube.com/feed/subscriptions"), None);
        assert_eq!(classify_video_url("https://www.google.com"), None);
        assert_eq!(classify_video_url(""), None);
    }

    #[test]
    fn test_watch_page_without_id() {
        // A watch path with no usable id must not be treated as trackable.
        assert_eq!(classify_video_url("https://www.youtube.com/watch"), None);
        assert_eq!(classify_video_url("https://www.youtube.com/watch?v="), None);
    }

    #[test]
    fn test_shorts_thumbnail_url() {
        assert_eq!(
            shorts_thumbnail_url("abc123"),
            "https://i.ytimg.com/vi/abc123/frame0.jpg"
        );
    }
}
