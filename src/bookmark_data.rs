/// Data structures for video timestamp bookmarks
use serde::{Deserialize, Serialize};

/// Whether a video is a regular watch-page video or a shorts video. The wire
/// strings ("watch" / "shorts") are also the URL path discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Watch,
    Shorts,
}

/// A single bookmarked timestamp within one video.
///
/// `time` is whole seconds stored as f64 (the player reports fractional
/// seconds; we floor at creation so a bookmark also works as a cache key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Bookmark {
    pub fn at(time: f64) -> Bookmark {
        Bookmark { time, note: None }
    }
}

/// A bookmark annotated with its captured frame, if one could be produced.
///
/// `data_url` is a PNG data URI of the frame at `time`. These strings are far
/// too large for the extension storage quota, so they only ever live in memory
/// and on the wire between contexts, never in a persisted `VideoRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkWithFrame {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

impl BookmarkWithFrame {
    pub fn new(bookmark: &Bookmark, data_url: Option<String>) -> BookmarkWithFrame {
        BookmarkWithFrame {
            time: bookmark.time,
            note: bookmark.note.clone(),
            data_url,
        }
    }
}

/// The persisted aggregate for one video: its bookmarks plus the display
/// metadata the browse view needs without touching the page.
///
/// Invariant: `bookmarks` is sorted ascending by time with no duplicate times,
/// and is never empty in storage (an emptied record is deleted instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub bookmarks: Vec<Bookmark>,
    pub title: String,
    pub thumbnail_image_src: String,
    pub video_type: VideoType,
    /// Milliseconds since the epoch, refreshed on every mutation.
    pub updated_at: f64,
}

/// Ordering of the cross-video browse view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    #[serde(rename = "Most Recently Updated")]
    MostRecentlyUpdated,
    #[serde(rename = "Least Recently Updated")]
    LeastRecentlyUpdated,
    #[serde(rename = "Most Bookmarks")]
    MostBookmarks,
    #[serde(rename = "Title (A-Z)")]
    TitleAscending,
}

/// Singleton user settings record, stored under a reserved key that the
/// video enumeration skips. Missing fields fall back to their defaults so old
/// stored blobs keep deserializing as settings grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default = "default_true")]
    pub capture_frames: bool,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default = "default_true")]
    pub show_bookmarks_progress_bar: bool,
    #[serde(default = "default_true")]
    pub scroll_next_bookmark_into_view: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            capture_frames: true,
            sort_by: SortBy::default(),
            show_bookmarks_progress_bar: true,
            scroll_next_bookmark_into_view: true,
        }
    }
}

/// The subset of the browser's tab object that crosses context boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMetadata {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
