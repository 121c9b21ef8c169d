/// Popup UI: requests the active video's bookmarks with frames and issues
/// play/delete commands, or falls back to the cross-video browse view when
/// the active tab is not a video page.
///
/// The popup never mutates its local copy of the bookmark sequence: every
/// command round-trips through the background and is followed by a re-fetch,
/// so the rendered list always reflects what is actually persisted.
use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;

use crate::bookmark_data::{BookmarkWithFrame, SortBy, UserSettings, TabMetadata, VideoRecord};
use crate::error::Error;
use crate::messages::{Message, MessageResponse};
use crate::operations::{format_time, sort_video_records};
use crate::storage::{BookmarkStore, KeyValueStore};
use crate::ui::browse::BrowseView;
use crate::video_url::classify_video_url;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getAllStorage() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(key: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn clearStorage() -> Result<(), JsValue>;
}

/// chrome.storage.sync through the popup.js shim. The popup reads settings
/// and the browse-view records directly; bookmark mutations for the current
/// video still go through the content script, which owns that record.
pub struct PopupStorage;

impl KeyValueStore for PopupStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let value = getStorage(key).await.map_err(|e| Error::Store(format!("{:?}", e)))?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        value
            .as_string()
            .map(Some)
            .ok_or_else(|| Error::store(format!("non-string value under key {}", key)))
    }

    async fn get_all(&self) -> Result<std::collections::HashMap<String, String>, Error> {
        let value = getAllStorage().await.map_err(|e| Error::Store(format!("{:?}", e)))?;
        serde_wasm_bindgen::from_value(value).map_err(Error::store)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        setStorage(key, value).await.map_err(|e| Error::Store(format!("{:?}", e)))
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        removeStorage(key).await.map_err(|e| Error::Store(format!("{:?}", e)))
    }

    async fn clear(&self) -> Result<(), Error> {
        clearStorage().await.map_err(|e| Error::Store(format!("{:?}", e)))
    }
}

#[derive(Clone, PartialEq)]
enum PanelState {
    Loading,
    /// The active tab shows a video: its bookmarks, frames attached.
    Video(Vec<BookmarkWithFrame>),
    /// Not a video page: every stored video, ordered per settings.
    Browse(Vec<(String, VideoRecord)>),
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| PanelState::Loading);
    let settings = use_state(UserSettings::default);

    // Load on mount: classify the active tab and fetch whichever view fits.
    {
        let state = state.clone();
        let settings = settings.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                load_panel(state, settings).await;
            });
            || ()
        });
    }

    let on_play = {
        Callback::from(move |time: f64| {
            spawn_local(async move {
                if let Err(e) = send_command(Message::PlayAtTime { time }).await {
                    log::warn!("play command failed: {}", e);
                }
            });
        })
    };

    let on_delete = {
        let state = state.clone();
        Callback::from(move |time: f64| {
            let state = state.clone();
            spawn_local(async move {
                match send_command(Message::DeleteBookmark { time }).await {
                    // Always re-read after a write; the persisted sequence is
                    // the authority, not the list we are showing.
                    Ok(()) => refresh_video_view(state).await,
                    Err(e) => state.set(PanelState::Error(format!("Delete failed: {}", e))),
                }
            });
        })
    };

    let on_delete_all = {
        let state = state.clone();
        Callback::from(move |_: MouseEvent| {
            let state = state.clone();
            spawn_local(async move {
                match send_command(Message::DeleteAllBookmarks).await {
                    Ok(()) => refresh_video_view(state).await,
                    Err(e) => state.set(PanelState::Error(format!("Delete failed: {}", e))),
                }
            });
        })
    };

    let on_delete_video = {
        let state = state.clone();
        let settings = settings.clone();
        Callback::from(move |video_id: String| {
            let state = state.clone();
            let sort_by = settings.sort_by;
            spawn_local(async move {
                let store = BookmarkStore::new(PopupStorage);
                if let Err(e) = store.delete_record(&video_id).await {
                    state.set(PanelState::Error(format!("Delete failed: {}", e)));
                    return;
                }
                refresh_browse_view(state, sort_by).await;
            });
        })
    };

    let on_sort_change = {
        let state = state.clone();
        let settings = settings.clone();
        Callback::from(move |sort_by: SortBy| {
            let state = state.clone();
            let settings = settings.clone();
            spawn_local(async move {
                let mut updated = (*settings).clone();
                updated.sort_by = sort_by;
                settings.set(updated.clone());

                let store = BookmarkStore::new(PopupStorage);
                if let Err(e) = store.save_settings(&updated).await {
                    log::warn!("failed to persist sort order: {}", e);
                }
                refresh_browse_view(state, sort_by).await;
            });
        })
    };

    let on_toggle_setting = {
        let settings = settings.clone();
        Callback::from(move |field: SettingField| {
            let settings = settings.clone();
            spawn_local(async move {
                let mut updated = (*settings).clone();
                match field {
                    SettingField::CaptureFrames => {
                        updated.capture_frames = !updated.capture_frames;
                    }
                    SettingField::ProgressBar => {
                        updated.show_bookmarks_progress_bar = !updated.show_bookmarks_progress_bar;
                    }
                    SettingField::ScrollIntoView => {
                        updated.scroll_next_bookmark_into_view =
                            !updated.scroll_next_bookmark_into_view;
                    }
                }
                settings.set(updated.clone());

                if let Err(e) = BookmarkStore::new(PopupStorage).save_settings(&updated).await {
                    log::warn!("failed to persist settings: {}", e);
                }
            });
        })
    };

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Video Timestamp Bookmarks"}</h1>

            {match &*state {
                PanelState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading bookmarks..."}</p>
                    </div>
                },
                PanelState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                PanelState::Video(frames) => html! {
                    <>
                        {render_bookmark_list(frames, &on_play, &on_delete)}
                        if !frames.is_empty() {
                            <Button
                                onclick={on_delete_all.clone()}
                                variant={ButtonVariant::Secondary}
                                block={true}
                            >
                                {"Delete All Bookmarks"}
                            </Button>
                        }
                    </>
                },
                PanelState::Browse(records) => html! {
                    <BrowseView
                        records={records.clone()}
                        sort_by={settings.sort_by}
                        on_sort_change={on_sort_change.clone()}
                        on_delete_video={on_delete_video.clone()}
                    />
                },
            }}

            {render_settings(&*settings, &on_toggle_setting)}
        </div>
    }
}

#[derive(Clone, Copy, PartialEq)]
enum SettingField {
    CaptureFrames,
    ProgressBar,
    ScrollIntoView,
}

fn render_bookmark_list(
    frames: &[BookmarkWithFrame],
    on_play: &Callback<f64>,
    on_delete: &Callback<f64>,
) -> Html {
    if frames.is_empty() {
        return html! {
            <p class="empty-list">{"No bookmarks for this video yet."}</p>
        };
    }

    html! {
        <div class="bookmark-list">
            {for frames.iter().map(|frame| {
                let time = frame.time;
                let play = {
                    let on_play = on_play.clone();
                    Callback::from(move |_: MouseEvent| on_play.emit(time))
                };
                let delete = {
                    let on_delete = on_delete.clone();
                    Callback::from(move |_: MouseEvent| on_delete.emit(time))
                };

                html! {
                    <div class="bookmark-row">
                        if let Some(data_url) = &frame.data_url {
                            <img
                                class="frame-img"
                                src={data_url.clone()}
                                onclick={play.clone()}
                            />
                        }
                        <span class="bookmark-time">{format_time(time)}</span>
                        if let Some(note) = &frame.note {
                            <span class="bookmark-note">{note.clone()}</span>
                        }
                        <span class="bookmark-controls">
                            <Button onclick={play} variant={ButtonVariant::Secondary}>
                                {"Play"}
                            </Button>
                            <Button onclick={delete} variant={ButtonVariant::Secondary}>
                                {"Delete"}
                            </Button>
                        </span>
                    </div>
                }
            })}
        </div>
    }
}

fn render_settings(settings: &UserSettings, on_toggle: &Callback<SettingField>) -> Html {
    let checkbox = |label: &str, checked: bool, field: SettingField| {
        let on_toggle = on_toggle.clone();
        let onchange = Callback::from(move |_: Event| on_toggle.emit(field));
        html! {
            <label class="setting-row">
                <input type="checkbox" checked={checked} onchange={onchange} />
                {label.to_string()}
            </label>
        }
    };

    html! {
        <div class="settings-section">
            <h2 class="settings-title">{"Settings"}</h2>
            {checkbox("Capture frames for bookmarks", settings.capture_frames, SettingField::CaptureFrames)}
            {checkbox("Show bookmarks on progress bar", settings.show_bookmarks_progress_bar, SettingField::ProgressBar)}
            {checkbox("Scroll next bookmark into view", settings.scroll_next_bookmark_into_view, SettingField::ScrollIntoView)}
        </div>
    }
}

// Helper functions

async fn load_panel(state: UseStateHandle<PanelState>, settings: UseStateHandle<UserSettings>) {
    let loaded = match BookmarkStore::new(PopupStorage).settings().await {
        Ok(loaded) => {
            settings.set(loaded.clone());
            loaded
        }
        Err(e) => {
            log::warn!("failed to load settings, using defaults: {}", e);
            UserSettings::default()
        }
    };

    match fetch_active_tab().await {
        Ok(tab) if tab.url.as_deref().is_some_and(|url| classify_video_url(url).is_some()) => {
            refresh_video_view(state).await;
        }
        Ok(_) => {
            refresh_browse_view(state, loaded.sort_by).await;
        }
        Err(e) => {
            state.set(PanelState::Error(format!("Failed to read active tab: {}", e)));
        }
    }
}

async fn refresh_video_view(state: UseStateHandle<PanelState>) {
    match request_frames().await {
        Ok(frames) => state.set(PanelState::Video(frames)),
        Err(e) => state.set(PanelState::Error(format!("Failed to load bookmarks: {}", e))),
    }
}

async fn refresh_browse_view(state: UseStateHandle<PanelState>, sort_by: SortBy) {
    match BookmarkStore::new(PopupStorage).all_records().await {
        Ok(mut records) => {
            sort_video_records(&mut records, sort_by);
            state.set(PanelState::Browse(records));
        }
        Err(e) => state.set(PanelState::Error(format!("Failed to load videos: {}", e))),
    }
}

async fn fetch_active_tab() -> Result<TabMetadata, String> {
    let tab = getActiveTab().await.map_err(|e| format!("{:?}", e))?;
    serde_wasm_bindgen::from_value(tab).map_err(|e| e.to_string())
}

/// Ask the background for the current video's bookmarks with frames. The
/// background owns the frame cache; the popup never sends one.
async fn request_frames() -> Result<Vec<BookmarkWithFrame>, String> {
    let message = serde_wasm_bindgen::to_value(&Message::GetBookmarksWithFrames {
        cached_frames: None,
    })
    .map_err(|e| e.to_string())?;

    let response = sendRuntimeMessage(message).await.map_err(|e| format!("{:?}", e))?;

    let response: MessageResponse =
        serde_wasm_bindgen::from_value(response).map_err(|e| e.to_string())?;
    response
        .into_frames()
        .ok_or_else(|| "unexpected response from background".to_string())
}

async fn send_command(message: Message) -> Result<(), String> {
    let payload = serde_wasm_bindgen::to_value(&message).map_err(|e| e.to_string())?;
    sendRuntimeMessage(payload).await.map_err(|e| format!("{:?}", e))?;
    Ok(())
}
