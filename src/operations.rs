/// Pure bookmark-sequence operations: insertion, removal, frame-cache merging,
/// browse-view ordering, timestamp formatting.
use std::collections::HashMap;

use crate::bookmark_data::{Bookmark, BookmarkWithFrame, SortBy, VideoRecord};

/// Insert a bookmark keeping the sequence sorted ascending by time.
///
/// A bookmark at an already-bookmarked time replaces the existing one (times
/// are unique within a video), so rapid double-clicks cannot create duplicates
/// even if the affordance lock is bypassed.
pub fn insert_bookmark(bookmarks: &mut Vec<Bookmark>, bookmark: Bookmark) {
    bookmarks.retain(|b| b.time != bookmark.time);

    let position = bookmarks
        .iter()
        .position(|b| b.time > bookmark.time)
        .unwrap_or(bookmarks.len());

    bookmarks.insert(position, bookmark);
}

/// Remove the bookmark with an exactly matching time. Returns whether anything
/// was removed.
pub fn remove_bookmark(bookmarks: &mut Vec<Bookmark>, time: f64) -> bool {
    let original_len = bookmarks.len();
    bookmarks.retain(|b| b.time != time);
    bookmarks.len() < original_len
}

/// Index previously captured frames by floor-truncated seconds.
///
/// Bookmark times are floored at creation, but frames that crossed the wire
/// may carry fractional times from older data, so the lookup key is always
/// the floored value.
pub fn frames_by_time(frames: &[BookmarkWithFrame]) -> HashMap<i64, &BookmarkWithFrame> {
    frames
        .iter()
        .filter(|f| f.data_url.is_some())
        .map(|f| (f.time.floor() as i64, f))
        .collect()
}

/// Look up a cached frame for a bookmark time, floor-matched.
pub fn cached_frame_for<'a>(
    cache: &'a HashMap<i64, &BookmarkWithFrame>,
    time: f64,
) -> Option<&'a BookmarkWithFrame> {
    cache.get(&(time.floor() as i64)).copied()
}

/// Order (video id, record) pairs for the browse view.
pub fn sort_video_records(records: &mut Vec<(String, VideoRecord)>, sort_by: SortBy) {
    match sort_by {
        SortBy::MostRecentlyUpdated => {
            records.sort_by(|a, b| b.1.updated_at.total_cmp(&a.1.updated_at));
        }
        SortBy::LeastRecentlyUpdated => {
            records.sort_by(|a, b| a.1.updated_at.total_cmp(&b.1.updated_at));
        }
        SortBy::MostBookmarks => {
            // Ties broken by recency so the order stays stable as counts match.
            records.sort_by(|a, b| {
                b.1.bookmarks
                    .len()
                    .cmp(&a.1.bookmarks.len())
                    .then(b.1.updated_at.total_cmp(&a.1.updated_at))
            });
        }
        SortBy::TitleAscending => {
            records.sort_by(|a, b| a.1.title.to_lowercase().cmp(&b.1.title.to_lowercase()));
        }
    }
}

/// Format seconds as MM:SS, or HH:MM:SS once an hour is reached.
///
/// Examples: 300 → "05:00", 3600 → "01:00:00".
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let remaining = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, remaining)
    } else {
        format!("{:02}:{:02}", minutes, remaining)
    }
}
