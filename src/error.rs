/// Error taxonomy for the coordination core.
///
/// Nothing here is fatal to a context: a `NotReady` surfaces as a failed popup
/// request after the handshake times out, a `CaptureUnavailable` only costs one
/// bookmark its frame, and "not a video page" is not an error at all (the URL
/// classifier returns `None` and the popup switches to the browse view).
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The content script never answered the readiness probes within the
    /// handshake window. The tab may still be loading, or it was closed.
    #[error("content script in tab {tab_id} not ready after {waited_ms}ms")]
    NotReady { tab_id: i32, waited_ms: u32 },

    /// The video element is missing or not in a ready-for-playback state, so a
    /// frame cannot be captured right now. Reported per bookmark.
    #[error("video element is not ready for frame capture")]
    CaptureUnavailable,

    /// A get/set/remove on the extension storage area failed.
    #[error("storage operation failed: {0}")]
    Store(String),

    /// A cross-context message could not be delivered or produced a malformed
    /// response.
    #[error("message delivery failed: {0}")]
    Delivery(String),

    /// A request arrived while no video is bound to the page session.
    #[error("no video is currently bound to this page")]
    NoCurrentVideo,

    /// A navigation reset the page session while this request was in flight;
    /// its partial results must be discarded, not merged into the new state.
    #[error("request superseded by a navigation")]
    Superseded,
}

impl Error {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }

    pub fn delivery(err: impl std::fmt::Display) -> Self {
        Error::Delivery(err.to_string())
    }
}
