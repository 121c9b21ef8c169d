/// The closed inter-context message set.
///
/// Every message crossing a context boundary is JSON with a required `type`
/// discriminator; modeling the set as one tagged enum means a malformed or
/// unknown message fails at the deserialization boundary instead of silently
/// matching nothing in a handler.
use serde::{Deserialize, Serialize};

use crate::bookmark_data::{BookmarkWithFrame, TabMetadata, VideoType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// Content script announces it is injected and listening. May arrive more
    /// than once per tab (re-injection after in-page navigation).
    Ready,

    /// Content script asks the background to open the popup after a bookmark
    /// was added from the page.
    OpenPopup,

    /// Background probes whether the content script is attached yet.
    CheckReady,

    /// Background tells the content script the tab now shows a new video.
    #[serde(rename_all = "camelCase")]
    TabUpdatedNewVideo {
        video_id: String,
        video_type: VideoType,
        active_tab: TabMetadata,
    },

    /// Popup (via background) asks for the current video's bookmarks, each
    /// annotated with a captured frame. The background forwards its cached
    /// result so already-captured frames are not captured again.
    #[serde(rename_all = "camelCase")]
    GetBookmarksWithFrames {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cached_frames: Option<Vec<BookmarkWithFrame>>,
    },

    /// Seek the page's video to a bookmarked time and resume playback.
    PlayAtTime { time: f64 },

    /// Remove one bookmark from the current video.
    DeleteBookmark { time: f64 },

    /// Remove every bookmark (and thus the record) for the current video.
    DeleteAllBookmarks,
}

/// Responses travel back untagged: the readiness probe answers `{ready: …}`,
/// the frames request answers a bare array, everything else acks with null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageResponse {
    ReadyState { ready: bool },
    Frames(Vec<BookmarkWithFrame>),
    Ack,
}

impl MessageResponse {
    pub fn is_ready(&self) -> bool {
        matches!(self, MessageResponse::ReadyState { ready: true })
    }

    pub fn into_frames(self) -> Option<Vec<BookmarkWithFrame>> {
        match self {
            MessageResponse::Frames(frames) => Some(frames),
            _ => None,
        }
    }
}
