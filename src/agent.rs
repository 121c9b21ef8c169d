/// Page-context agent: owns the live video element, the add-bookmark
/// affordance, and all reads/writes of the current video's record.
///
/// The page is a single-page app, so this long-lived context sees many videos
/// over its lifetime. Every new-video notification resets the session state
/// synchronously, before any await, so a request racing the navigation can
/// never observe the previous video's bookmarks.
use std::cell::RefCell;

use crate::bookmark_data::{Bookmark, BookmarkWithFrame, TabMetadata, VideoRecord, VideoType};
use crate::coordinator::RetryPolicy;
use crate::error::Error;
use crate::messages::{Message, MessageResponse};
use crate::operations::{cached_frame_for, frames_by_time, insert_bookmark, remove_bookmark};
use crate::storage::{BookmarkStore, KeyValueStore};
use crate::video_url::shorts_thumbnail_url;

/// The one capability the frame-capture pipeline needs from the player: a
/// single seekable playback position that can be rasterized. Captures are
/// inherently sequential because there is only one position.
pub trait SeekableMediaHandle: Clone {
    fn current_time(&self) -> f64;
    fn set_current_time(&self, time: f64);
    fn is_paused(&self) -> bool;
    fn play(&self);
    fn ready_for_capture(&self) -> bool;
    /// Seek to `time`, wait for the seek to complete, and encode the visible
    /// frame as a PNG data URI at the video's native resolution.
    async fn capture_at(&self, time: f64) -> Result<String, Error>;
}

/// The page's native control surface around the video element.
pub trait ControlSurface {
    type Media: SeekableMediaHandle;

    fn query_media(&self) -> Option<Self::Media>;
    /// Attach the add-bookmark affordance. Idempotent; for shorts it must
    /// cover every simultaneously mounted player, since the shorts surface
    /// mounts many videos at once for scroll browsing.
    fn ensure_add_button(&self, video_type: VideoType);
    fn set_add_enabled(&self, enabled: bool);
    fn page_title(&self) -> Option<String>;
    /// Thumbnail URL from the watch page's embedded structured metadata.
    fn embedded_thumbnail_url(&self) -> Option<String>;
    /// Keep the player controls visible for a moment so a seek is seen.
    fn reveal_controls_for_ms(&self, ms: u32);
}

/// Runtime facilities of the page context: messaging back to the background,
/// timers, and the clock.
pub trait RuntimeBus {
    async fn notify(&self, message: &Message);
    async fn sleep_ms(&self, ms: u32);
    fn now_ms(&self) -> f64;
}

struct SessionState<M> {
    /// Bumped on every reset. In-flight work captures the epoch it started
    /// under and discards its results if the epoch moved on.
    epoch: u64,
    video_id: Option<String>,
    video_type: Option<VideoType>,
    bookmarks: Vec<Bookmark>,
    active_tab: Option<TabMetadata>,
    media: Option<M>,
}

impl<M> SessionState<M> {
    fn new() -> SessionState<M> {
        SessionState {
            epoch: 0,
            video_id: None,
            video_type: None,
            bookmarks: Vec::new(),
            active_tab: None,
            media: None,
        }
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.video_id = None;
        self.video_type = None;
        self.bookmarks.clear();
        self.active_tab = None;
        self.media = None;
    }
}

pub struct PageAgent<S, C: ControlSurface, R> {
    store: BookmarkStore<S>,
    surface: C,
    runtime: R,
    /// Bounded wait for the video element to appear in the render tree.
    media_wait: RetryPolicy,
    state: RefCell<SessionState<C::Media>>,
}

impl<S, C, R> PageAgent<S, C, R>
where
    S: KeyValueStore,
    C: ControlSurface,
    R: RuntimeBus,
{
    pub fn new(store: S, surface: C, runtime: R) -> PageAgent<S, C, R> {
        PageAgent {
            store: BookmarkStore::new(store),
            surface,
            runtime,
            media_wait: RetryPolicy {
                interval_ms: 100,
                timeout_ms: 3_000,
            },
            state: RefCell::new(SessionState::new()),
        }
    }

    pub fn current_video_id(&self) -> Option<String> {
        self.state.borrow().video_id.clone()
    }

    /// Entry point for messages delivered to this tab.
    pub async fn handle_message(
        &self,
        message: Message,
    ) -> Result<Option<MessageResponse>, Error> {
        match message {
            Message::CheckReady => Ok(Some(MessageResponse::ReadyState { ready: true })),
            Message::TabUpdatedNewVideo { video_id, video_type, active_tab } => {
                self.on_new_video(video_id, video_type, active_tab).await?;
                Ok(Some(MessageResponse::Ack))
            }
            Message::GetBookmarksWithFrames { cached_frames } => {
                let frames = self.bookmarks_with_frames(cached_frames).await?;
                Ok(Some(MessageResponse::Frames(frames)))
            }
            Message::PlayAtTime { time } => {
                self.play_at(time);
                Ok(None)
            }
            Message::DeleteBookmark { time } => {
                self.delete_bookmark(time).await?;
                Ok(None)
            }
            Message::DeleteAllBookmarks => {
                self.delete_all_bookmarks().await?;
                Ok(None)
            }
            other => {
                log::warn!("unexpected message in page context: {:?}", other);
                Ok(None)
            }
        }
    }

    /// Synchronous part of the new-video transition: wipe everything tied to
    /// the previous video and bind the new identifiers, all before the first
    /// await of `on_new_video`.
    pub(crate) fn begin_video_session(
        &self,
        video_id: &str,
        video_type: VideoType,
        active_tab: Option<TabMetadata>,
    ) -> u64 {
        let mut state = self.state.borrow_mut();
        state.reset();
        state.video_id = Some(video_id.to_string());
        state.video_type = Some(video_type);
        state.active_tab = active_tab;
        state.epoch
    }

    /// Handle a new-video notification: reset, locate the video element
    /// (bounded wait), load the record, attach the affordance.
    pub async fn on_new_video(
        &self,
        video_id: String,
        video_type: VideoType,
        active_tab: TabMetadata,
    ) -> Result<(), Error> {
        let epoch = self.begin_video_session(&video_id, video_type, Some(active_tab));

        if let Some(media) = self.locate_media().await {
            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                state.media = Some(media);
            }
        } else {
            log::warn!("no video element found for {}; captures will be skipped", video_id);
        }

        let record = self.store.load_record(&video_id).await?;
        {
            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                state.bookmarks = record.map(|r| r.bookmarks).unwrap_or_default();
            }
        }

        self.surface.ensure_add_button(video_type);
        Ok(())
    }

    /// Bookmark the current playback position.
    ///
    /// The affordance is disabled for the duration so rapid repeated clicks
    /// cannot create concurrent writes of the same record.
    pub async fn add_bookmark(&self) -> Result<(), Error> {
        self.surface.set_add_enabled(false);
        let result = self.add_bookmark_inner().await;
        self.surface.set_add_enabled(true);
        result
    }

    async fn add_bookmark_inner(&self) -> Result<(), Error> {
        let (video_id, video_type, epoch) = {
            let state = self.state.borrow();
            (
                state.video_id.clone().ok_or(Error::NoCurrentVideo)?,
                state.video_type.ok_or(Error::NoCurrentVideo)?,
                state.epoch,
            )
        };
        let media = self.media_handle().ok_or(Error::CaptureUnavailable)?;
        let time = media.current_time().floor();

        // Re-fetch before deciding: another context may have written since the
        // session cache was filled.
        let existing = self.store.load_record(&video_id).await?;

        let mut bookmarks = existing.as_ref().map(|r| r.bookmarks.clone()).unwrap_or_default();
        insert_bookmark(&mut bookmarks, Bookmark::at(time));

        let title = existing
            .as_ref()
            .map(|r| r.title.clone())
            .filter(|t| !t.is_empty())
            .or_else(|| self.state.borrow().active_tab.as_ref().and_then(|t| t.title.clone()))
            .or_else(|| self.surface.page_title())
            .unwrap_or_default();

        let thumbnail_image_src = existing
            .as_ref()
            .map(|r| r.thumbnail_image_src.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| match video_type {
                VideoType::Watch => self.surface.embedded_thumbnail_url().unwrap_or_default(),
                VideoType::Shorts => shorts_thumbnail_url(&video_id),
            });

        let record = VideoRecord {
            bookmarks,
            title,
            thumbnail_image_src,
            video_type,
            updated_at: self.runtime.now_ms(),
        };
        self.store.save_record(&video_id, &record).await?;

        {
            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                state.bookmarks = record.bookmarks;
            }
        }

        self.runtime.notify(&Message::OpenPopup).await;
        Ok(())
    }

    /// Return the current video's bookmarks, each annotated with a captured
    /// frame where possible.
    ///
    /// Frames already present in `cached_frames` (matched by floor-truncated
    /// seconds) are reused. Captures run strictly sequentially; a bookmark
    /// whose capture fails is returned without a frame rather than failing
    /// the batch. The playback position is restored exactly once afterwards,
    /// iff at least one capture actually moved it.
    pub async fn bookmarks_with_frames(
        &self,
        cached_frames: Option<Vec<BookmarkWithFrame>>,
    ) -> Result<Vec<BookmarkWithFrame>, Error> {
        let (video_id, epoch) = {
            let state = self.state.borrow();
            (state.video_id.clone().ok_or(Error::NoCurrentVideo)?, state.epoch)
        };

        let record = self.store.load_record(&video_id).await?;
        let bookmarks = record.map(|r| r.bookmarks).unwrap_or_default();
        {
            let mut state = self.state.borrow_mut();
            if state.epoch != epoch {
                return Err(Error::Superseded);
            }
            state.bookmarks = bookmarks.clone();
        }

        let settings = self.store.settings().await?;
        if !settings.capture_frames {
            return Ok(bookmarks.iter().map(|b| BookmarkWithFrame::new(b, None)).collect());
        }

        let cached = cached_frames.unwrap_or_default();
        let cache = frames_by_time(&cached);
        let media = self.media_handle();

        let position_before = media.as_ref().map(|m| m.current_time());
        let mut frames = Vec::with_capacity(bookmarks.len());
        let mut captured_any = false;

        for bookmark in &bookmarks {
            if let Some(hit) = cached_frame_for(&cache, bookmark.time) {
                frames.push(BookmarkWithFrame {
                    time: bookmark.time,
                    note: bookmark.note.clone(),
                    data_url: hit.data_url.clone(),
                });
                continue;
            }

            let data_url = match &media {
                Some(media) => match media.capture_at(bookmark.time).await {
                    Ok(data_url) => {
                        captured_any = true;
                        Some(data_url)
                    }
                    Err(Error::CaptureUnavailable) => {
                        log::warn!("frame capture unavailable at {}s", bookmark.time);
                        None
                    }
                    Err(other) => return Err(other),
                },
                None => None,
            };

            if self.state.borrow().epoch != epoch {
                // A navigation reset the session mid-capture; these frames
                // belong to an abandoned video.
                return Err(Error::Superseded);
            }

            frames.push(BookmarkWithFrame {
                time: bookmark.time,
                note: bookmark.note.clone(),
                data_url,
            });
        }

        if captured_any
            && let (Some(media), Some(position)) = (&media, position_before)
        {
            media.set_current_time(position);
        }

        Ok(frames)
    }

    /// Seek to a bookmarked time and make sure the user sees it land.
    pub fn play_at(&self, time: f64) {
        let Some(media) = self.media_handle() else {
            log::warn!("play-at-time with no video element bound");
            return;
        };

        media.set_current_time(time);
        if media.is_paused() {
            media.play();
        }
        self.surface.reveal_controls_for_ms(1_000);
    }

    /// Remove one bookmark; the record itself is removed with its last
    /// bookmark.
    pub async fn delete_bookmark(&self, time: f64) -> Result<(), Error> {
        let (video_id, epoch) = {
            let state = self.state.borrow();
            (state.video_id.clone().ok_or(Error::NoCurrentVideo)?, state.epoch)
        };

        // Re-fetch before filtering to shrink the lost-update window.
        let Some(mut record) = self.store.load_record(&video_id).await? else {
            return Ok(());
        };

        if !remove_bookmark(&mut record.bookmarks, time) {
            return Ok(());
        }

        if record.bookmarks.is_empty() {
            self.store.delete_record(&video_id).await?;
        } else {
            record.updated_at = self.runtime.now_ms();
            self.store.save_record(&video_id, &record).await?;
        }

        let mut state = self.state.borrow_mut();
        if state.epoch == epoch {
            state.bookmarks = record.bookmarks;
        }
        Ok(())
    }

    /// Bulk delete: drop the whole record for the current video.
    pub async fn delete_all_bookmarks(&self) -> Result<(), Error> {
        let (video_id, epoch) = {
            let state = self.state.borrow();
            (state.video_id.clone().ok_or(Error::NoCurrentVideo)?, state.epoch)
        };

        self.store.delete_record(&video_id).await?;

        let mut state = self.state.borrow_mut();
        if state.epoch == epoch {
            state.bookmarks.clear();
        }
        Ok(())
    }

    fn media_handle(&self) -> Option<C::Media> {
        let existing = self.state.borrow().media.clone();
        if existing.is_some() {
            return existing;
        }

        // The element may have mounted after the new-video notification.
        let found = self.surface.query_media();
        if let Some(media) = found.clone() {
            self.state.borrow_mut().media = Some(media);
        }
        found
    }

    async fn locate_media(&self) -> Option<C::Media> {
        let mut waited_ms = 0;

        loop {
            if let Some(media) = self.surface.query_media() {
                return Some(media);
            }
            if waited_ms >= self.media_wait.timeout_ms {
                return None;
            }
            self.runtime.sleep_ms(self.media_wait.interval_ms).await;
            waited_ms += self.media_wait.interval_ms;
        }
    }
}
