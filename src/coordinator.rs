/// Background-context coordinator: tracks which tabs have a live content
/// script, detects navigation to a new video, and relays popup requests to the
/// page. It is the only context that talks to both of the others.
use std::cell::RefCell;
use std::collections::HashSet;

use crate::bookmark_data::{BookmarkWithFrame, TabMetadata};
use crate::error::Error;
use crate::messages::{Message, MessageResponse};
use crate::video_url::classify_video_url;

/// Transport to the content script of a given tab, plus the few browser
/// facilities the coordinator needs. Implemented over chrome.tabs in the
/// extension and faked in tests.
pub trait PageBus {
    async fn send_to_page(&self, tab_id: i32, message: &Message) -> Result<MessageResponse, Error>;
    async fn active_tab(&self) -> Result<TabMetadata, Error>;
    fn open_popup(&self);
    async fn sleep_ms(&self, ms: u32);
}

/// Readiness-handshake tuning. The content script is injected asynchronously
/// after navigation, so delivery waits on short fixed-interval probes with a
/// bounded total wait before giving up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval_ms: u32,
    pub timeout_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval_ms: 100,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Default)]
struct CoordinatorState {
    /// Tabs whose content script has signaled readiness. Duplicate signals
    /// (re-injection) are no-ops.
    ready_tabs: HashSet<i32>,
    /// Frames from the last completed request, handed back to the page on the
    /// next one so unchanged bookmarks skip re-capture. Dropped on navigation.
    last_frames: Option<Vec<BookmarkWithFrame>>,
}

pub struct Coordinator<B> {
    bus: B,
    retry: RetryPolicy,
    state: RefCell<CoordinatorState>,
}

impl<B: PageBus> Coordinator<B> {
    pub fn new(bus: B) -> Coordinator<B> {
        Coordinator::with_retry(bus, RetryPolicy::default())
    }

    pub fn with_retry(bus: B, retry: RetryPolicy) -> Coordinator<B> {
        Coordinator {
            bus,
            retry,
            state: RefCell::new(CoordinatorState::default()),
        }
    }

    /// Record a tab's content script as attached. Idempotent; the signal can
    /// arrive before or after the navigation event that needs it.
    pub fn mark_ready(&self, tab_id: i32) {
        self.state.borrow_mut().ready_tabs.insert(tab_id);
    }

    /// Drop all state tied to a closed tab.
    pub fn forget_tab(&self, tab_id: i32) {
        let mut state = self.state.borrow_mut();
        state.ready_tabs.remove(&tab_id);
        state.last_frames = None;
    }

    /// Entry point for runtime messages from the content script or the popup.
    pub async fn handle_message(
        &self,
        message: Message,
        sender_tab: Option<i32>,
    ) -> Result<Option<MessageResponse>, Error> {
        match message {
            Message::Ready => {
                if let Some(tab_id) = sender_tab {
                    self.mark_ready(tab_id);
                }
                Ok(None)
            }
            Message::OpenPopup => {
                self.bus.open_popup();
                Ok(None)
            }
            Message::GetBookmarksWithFrames { .. } => {
                let frames = self.bookmarks_with_frames().await?;
                Ok(Some(MessageResponse::Frames(frames)))
            }
            message @ (Message::PlayAtTime { .. }
            | Message::DeleteBookmark { .. }
            | Message::DeleteAllBookmarks) => {
                self.relay(message).await?;
                Ok(None)
            }
            other => {
                log::warn!("unexpected message in background context: {:?}", other);
                Ok(None)
            }
        }
    }

    /// React to a URL change in a tab. Returns whether a new-video
    /// notification was delivered.
    ///
    /// Any cached frames are stale the moment the URL changes, video page or
    /// not, so the cache is dropped before anything else.
    pub async fn on_tab_updated(&self, tab: TabMetadata) -> Result<bool, Error> {
        self.state.borrow_mut().last_frames = None;

        let Some(url) = tab.url.as_deref() else {
            return Ok(false);
        };
        let Some((video_id, video_type)) = classify_video_url(url) else {
            return Ok(false);
        };

        self.wait_for_agent(tab.id).await?;

        let tab_id = tab.id;
        self.bus
            .send_to_page(
                tab_id,
                &Message::TabUpdatedNewVideo {
                    video_id,
                    video_type,
                    active_tab: tab,
                },
            )
            .await?;

        Ok(true)
    }

    /// Ask the active tab's content script for the current video's bookmarks
    /// with frames, passing along the previous result as a capture cache.
    pub async fn bookmarks_with_frames(&self) -> Result<Vec<BookmarkWithFrame>, Error> {
        let tab = self.bus.active_tab().await?;
        self.wait_for_agent(tab.id).await?;

        let cached_frames = self.state.borrow().last_frames.clone();
        let response = self
            .bus
            .send_to_page(tab.id, &Message::GetBookmarksWithFrames { cached_frames })
            .await?;

        let frames = response
            .into_frames()
            .ok_or_else(|| Error::delivery("expected a frames array from the content script"))?;

        self.state.borrow_mut().last_frames = Some(frames.clone());
        Ok(frames)
    }

    /// Forward a popup-originated command to the active tab's content script.
    /// The response, if any, is discarded.
    pub async fn relay(&self, message: Message) -> Result<(), Error> {
        let tab = self.bus.active_tab().await?;
        self.wait_for_agent(tab.id).await?;
        self.bus.send_to_page(tab.id, &message).await?;
        Ok(())
    }

    /// Block until the tab's content script is attached: fast-path on a
    /// previously recorded ready signal, otherwise probe on a fixed interval
    /// until the bounded wait elapses. Each logical request is delivered at
    /// most once, only after this returns Ok.
    async fn wait_for_agent(&self, tab_id: i32) -> Result<(), Error> {
        let mut waited_ms = 0;

        loop {
            if self.state.borrow().ready_tabs.contains(&tab_id) {
                return Ok(());
            }

            if let Ok(response) = self.bus.send_to_page(tab_id, &Message::CheckReady).await
                && response.is_ready()
            {
                self.mark_ready(tab_id);
                return Ok(());
            }

            if waited_ms >= self.retry.timeout_ms {
                return Err(Error::NotReady { tab_id, waited_ms });
            }

            self.bus.sleep_ms(self.retry.interval_ms).await;
            waited_ms += self.retry.interval_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark_data::VideoType;
    use futures::executor::block_on;
    use std::cell::Cell;

    const TAB: i32 = 7;

    #[derive(Default)]
    struct FakeBus {
        sent: RefCell<Vec<(i32, Message)>>,
        failing_probes: Cell<u32>,
        probes_always_fail: Cell<bool>,
        frames_response: RefCell<Vec<BookmarkWithFrame>>,
        sleeps: Cell<u32>,
        popup_opened: Cell<bool>,
    }

    impl FakeBus {
        fn sent_of_type(&self, type_name: &str) -> usize {
            self.sent
                .borrow()
                .iter()
                .filter(|(_, m)| {
                    serde_json::to_string(m).unwrap().contains(&format!("\"{}\"", type_name))
                })
                .count()
        }
    }

    impl PageBus for &FakeBus {
        async fn send_to_page(
            &self,
            tab_id: i32,
            message: &Message,
        ) -> Result<MessageResponse, Error> {
            self.sent.borrow_mut().push((tab_id, message.clone()));

            match message {
                Message::CheckReady => {
                    if self.probes_always_fail.get() {
                        return Err(Error::delivery("no receiver"));
                    }
                    if self.failing_probes.get() > 0 {
                        self.failing_probes.set(self.failing_probes.get() - 1);
                        return Err(Error::delivery("no receiver"));
                    }
                    Ok(MessageResponse::ReadyState { ready: true })
                }
                Message::GetBookmarksWithFrames { .. } => {
                    Ok(MessageResponse::Frames(self.frames_response.borrow().clone()))
                }
                _ => Ok(MessageResponse::Ack),
            }
        }

        async fn active_tab(&self) -> Result<TabMetadata, Error> {
            Ok(TabMetadata {
                id: TAB,
                title: Some("Active tab".to_string()),
                url: Some("https://www.youtube.com/watch?v=abc".to_string()),
            })
        }

        fn open_popup(&self) {
            self.popup_opened.set(true);
        }

        async fn sleep_ms(&self, _ms: u32) {
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    fn watch_tab(url: &str) -> TabMetadata {
        TabMetadata {
            id: TAB,
            title: Some("Tab".to_string()),
            url: Some(url.to_string()),
        }
    }

    fn frame(time: f64) -> BookmarkWithFrame {
        BookmarkWithFrame {
            time,
            note: None,
            data_url: Some(format!("data:frame-{}", time)),
        }
    }

    #[test]
    fn test_ready_signal_is_idempotent() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);

        block_on(async {
            coordinator.handle_message(Message::Ready, Some(TAB)).await.unwrap();
            coordinator.handle_message(Message::Ready, Some(TAB)).await.unwrap();
        });

        assert_eq!(coordinator.state.borrow().ready_tabs.len(), 1);
    }

    #[test]
    fn test_navigation_waits_for_readiness_then_delivers_once() {
        let bus = FakeBus::default();
        bus.failing_probes.set(2);
        let coordinator = Coordinator::new(&bus);

        let delivered = block_on(
            coordinator.on_tab_updated(watch_tab("https://www.youtube.com/watch?v=abc")),
        )
        .unwrap();

        assert!(delivered);
        assert_eq!(bus.sent_of_type("check-ready"), 3);
        assert_eq!(bus.sent_of_type("tab-updated-new-video"), 1);
        assert_eq!(bus.sleeps.get(), 2);
    }

    #[test]
    fn test_new_video_payload_carries_id_and_type() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);

        block_on(coordinator.on_tab_updated(watch_tab("https://www.youtube.com/shorts/abc123?foo=1")))
            .unwrap();

        let sent = bus.sent.borrow();
        let delivered = sent
            .iter()
            .find_map(|(_, m)| match m {
                Message::TabUpdatedNewVideo { video_id, video_type, .. } => {
                    Some((video_id.clone(), *video_type))
                }
                _ => None,
            })
            .unwrap();

        assert_eq!(delivered, ("abc123".to_string(), VideoType::Shorts));
    }

    #[test]
    fn test_handshake_times_out_as_not_ready() {
        let bus = FakeBus::default();
        bus.probes_always_fail.set(true);
        let coordinator =
            Coordinator::with_retry(&bus, RetryPolicy { interval_ms: 100, timeout_ms: 300 });

        let result = block_on(
            coordinator.on_tab_updated(watch_tab("https://www.youtube.com/watch?v=abc")),
        );

        assert_eq!(result, Err(Error::NotReady { tab_id: TAB, waited_ms: 300 }));
        assert_eq!(bus.sent_of_type("tab-updated-new-video"), 0);
    }

    #[test]
    fn test_known_ready_tab_skips_probing() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);
        coordinator.mark_ready(TAB);

        block_on(coordinator.on_tab_updated(watch_tab("https://www.youtube.com/watch?v=abc")))
            .unwrap();

        assert_eq!(bus.sent_of_type("check-ready"), 0);
        assert_eq!(bus.sent_of_type("tab-updated-new-video"), 1);
    }

    #[test]
    fn test_non_video_navigation_sends_nothing_and_drops_cache() {
        let bus = FakeBus::default();
        bus.frames_response.borrow_mut().push(frame(10.0));
        let coordinator = Coordinator::new(&bus);
        coordinator.mark_ready(TAB);

        // Prime the cache with a completed request.
        block_on(coordinator.bookmarks_with_frames()).unwrap();
        assert!(coordinator.state.borrow().last_frames.is_some());

        let delivered = block_on(
            coordinator.on_tab_updated(watch_tab("https://www.youtube.com/feed/subscriptions")),
        )
        .unwrap();

        assert!(!delivered);
        assert!(coordinator.state.borrow().last_frames.is_none());
        assert_eq!(bus.sent_of_type("tab-updated-new-video"), 0);
    }

    #[test]
    fn test_frames_request_forwards_previous_result_as_cache() {
        let bus = FakeBus::default();
        bus.frames_response.borrow_mut().push(frame(10.0));
        let coordinator = Coordinator::new(&bus);
        coordinator.mark_ready(TAB);

        let first = block_on(coordinator.bookmarks_with_frames()).unwrap();
        assert_eq!(first.len(), 1);

        block_on(coordinator.bookmarks_with_frames()).unwrap();

        let sent = bus.sent.borrow();
        let caches: Vec<Option<usize>> = sent
            .iter()
            .filter_map(|(_, m)| match m {
                Message::GetBookmarksWithFrames { cached_frames } => {
                    Some(cached_frames.as_ref().map(|c| c.len()))
                }
                _ => None,
            })
            .collect();

        // First request has nothing cached; the second carries the first's result.
        assert_eq!(caches, vec![None, Some(1)]);
    }

    #[test]
    fn test_popup_commands_are_relayed() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);
        coordinator.mark_ready(TAB);

        block_on(coordinator.handle_message(Message::PlayAtTime { time: 25.0 }, None)).unwrap();
        block_on(coordinator.handle_message(Message::DeleteBookmark { time: 25.0 }, None)).unwrap();

        assert_eq!(bus.sent_of_type("play-at-time"), 1);
        assert_eq!(bus.sent_of_type("delete-bookmark"), 1);
    }

    #[test]
    fn test_open_popup_side_effect() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);

        block_on(coordinator.handle_message(Message::OpenPopup, Some(TAB))).unwrap();

        assert!(bus.popup_opened.get());
    }

    #[test]
    fn test_forget_tab_requires_fresh_handshake() {
        let bus = FakeBus::default();
        let coordinator = Coordinator::new(&bus);
        coordinator.mark_ready(TAB);

        coordinator.forget_tab(TAB);

        block_on(coordinator.on_tab_updated(watch_tab("https://www.youtube.com/watch?v=abc")))
            .unwrap();
        assert!(bus.sent_of_type("check-ready") > 0);
    }
}
