/// Content-script glue: binds the coordination core to the live page.
///
/// The chrome.* and DOM-insertion calls that cannot be expressed here live in
/// the content.js shim; everything stateful (session, capture, storage
/// decisions) stays on the Rust side of the boundary.
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AddEventListenerOptions, CanvasRenderingContext2d, Document, HtmlCanvasElement,
    HtmlVideoElement,
};

use crate::agent::{ControlSurface, PageAgent, RuntimeBus, SeekableMediaHandle};
use crate::bookmark_data::VideoType;
use crate::error::Error;
use crate::messages::Message;
use crate::storage::KeyValueStore;

// Import JS bridge functions
#[wasm_bindgen(module = "/content.js")]
extern "C" {
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

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    async fn sleep(ms: u32);

    fn ensureAddButton(video_type: &str);

    fn setAddButtonEnabled(enabled: bool);

    fn revealPlayerControls(ms: u32);
}

fn store_err(err: JsValue) -> Error {
    Error::Store(format!("{:?}", err))
}

/// chrome.storage.sync through the content.js shim.
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let value = getStorage(key).await.map_err(store_err)?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        value
            .as_string()
            .map(Some)
            .ok_or_else(|| Error::store(format!("non-string value under key {}", key)))
    }

    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        let value = getAllStorage().await.map_err(store_err)?;
        serde_wasm_bindgen::from_value(value).map_err(Error::store)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        setStorage(key, value).await.map_err(store_err)
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        removeStorage(key).await.map_err(store_err)
    }

    async fn clear(&self) -> Result<(), Error> {
        clearStorage().await.map_err(store_err)
    }
}

/// The page's `<video class="video-stream">` element.
#[derive(Clone)]
pub struct DomMediaHandle {
    video: HtmlVideoElement,
}

impl DomMediaHandle {
    /// Resolve once the element fires "seeked" for the requested time. The
    /// listener is attached before the seek starts so a fast seek cannot
    /// complete unobserved.
    async fn await_seek(&self, time: f64) -> Result<(), Error> {
        let video = self.video.clone();
        let promise = Promise::new(&mut |resolve, _reject| {
            let options = AddEventListenerOptions::new();
            options.set_once(true);
            let listener = Closure::once_into_js(move |_event: web_sys::Event| {
                let _ = resolve.call0(&JsValue::NULL);
            });
            let _ = video.add_event_listener_with_callback_and_add_event_listener_options(
                "seeked",
                listener.unchecked_ref(),
                &options,
            );
        });

        self.video.set_current_time(time);

        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|_| Error::CaptureUnavailable)
    }

    fn rasterize(&self) -> Result<String, Error> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or(Error::CaptureUnavailable)?;

        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|_| Error::CaptureUnavailable)?
            .dyn_into()
            .map_err(|_| Error::CaptureUnavailable)?;
        canvas.set_width(self.video.video_width());
        canvas.set_height(self.video.video_height());

        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into().ok())
            .ok_or(Error::CaptureUnavailable)?;

        context
            .draw_image_with_html_video_element(&self.video, 0.0, 0.0)
            .map_err(|_| Error::CaptureUnavailable)?;

        canvas.to_data_url().map_err(|_| Error::CaptureUnavailable)
    }
}

impl SeekableMediaHandle for DomMediaHandle {
    fn current_time(&self) -> f64 {
        self.video.current_time()
    }

    fn set_current_time(&self, time: f64) {
        self.video.set_current_time(time);
    }

    fn is_paused(&self) -> bool {
        self.video.paused()
    }

    fn play(&self) {
        let _ = self.video.play();
    }

    fn ready_for_capture(&self) -> bool {
        // HAVE_CURRENT_DATA or better.
        self.video.ready_state() >= 2
    }

    async fn capture_at(&self, time: f64) -> Result<String, Error> {
        if !self.ready_for_capture() {
            return Err(Error::CaptureUnavailable);
        }

        self.await_seek(time).await?;
        self.rasterize()
    }
}

/// The player chrome around the video. Pure DOM insertion and class toggling
/// is delegated to the shim; data extraction happens here.
pub struct DomSurface {
    document: Document,
}

impl ControlSurface for DomSurface {
    type Media = DomMediaHandle;

    fn query_media(&self) -> Option<DomMediaHandle> {
        let video = self
            .document
            .get_elements_by_class_name("video-stream")
            .item(0)?
            .dyn_into::<HtmlVideoElement>()
            .ok()?;
        Some(DomMediaHandle { video })
    }

    fn ensure_add_button(&self, video_type: VideoType) {
        ensureAddButton(match video_type {
            VideoType::Watch => "watch",
            VideoType::Shorts => "shorts",
        });
    }

    fn set_add_enabled(&self, enabled: bool) {
        setAddButtonEnabled(enabled);
    }

    fn page_title(&self) -> Option<String> {
        let title = self.document.title();
        if title.is_empty() { None } else { Some(title) }
    }

    /// Watch pages embed their thumbnail in ld+json structured metadata.
    fn embedded_thumbnail_url(&self) -> Option<String> {
        let scripts = self
            .document
            .query_selector_all("script[type=\"application/ld+json\"]")
            .ok()?;

        for index in 0..scripts.length() {
            let Some(text) = scripts.item(index).and_then(|node| node.text_content()) else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            if let Some(url) = value
                .get("thumbnailUrl")
                .and_then(|urls| urls.get(0))
                .and_then(|url| url.as_str())
            {
                return Some(url.to_string());
            }
        }

        None
    }

    fn reveal_controls_for_ms(&self, ms: u32) {
        revealPlayerControls(ms);
    }
}

/// chrome.runtime messaging plus timers, from inside the page.
pub struct ChromeRuntime;

impl RuntimeBus for ChromeRuntime {
    async fn notify(&self, message: &Message) {
        let Ok(payload) = serde_wasm_bindgen::to_value(message) else {
            return;
        };
        if let Err(err) = sendRuntimeMessage(payload).await {
            log::warn!("runtime notification failed: {:?}", err);
        }
    }

    async fn sleep_ms(&self, ms: u32) {
        sleep(ms).await;
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

type ContentAgent = PageAgent<ChromeStorage, DomSurface, ChromeRuntime>;

thread_local! {
    static AGENT: Rc<ContentAgent> = Rc::new(PageAgent::new(
        ChromeStorage,
        DomSurface {
            document: web_sys::window()
                .and_then(|w| w.document())
                .expect("content script must run in a document"),
        },
        ChromeRuntime,
    ));
}

fn agent() -> Rc<ContentAgent> {
    AGENT.with(|agent| agent.clone())
}

/// Called from the shim once on injection: announce readiness to the
/// background so the handshake can complete.
#[wasm_bindgen]
pub async fn content_start() {
    ChromeRuntime.notify(&Message::Ready).await;
}

/// chrome.runtime.onMessage entry point for this tab.
#[wasm_bindgen]
pub async fn content_on_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message: Message =
        serde_wasm_bindgen::from_value(message).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match agent().handle_message(message).await {
        Ok(Some(response)) => {
            serde_wasm_bindgen::to_value(&response).map_err(|e| JsValue::from_str(&e.to_string()))
        }
        Ok(None) => Ok(JsValue::NULL),
        Err(err) => {
            log::error!("content message handling failed: {}", err);
            Err(JsValue::from_str(&err.to_string()))
        }
    }
}

/// Click handler target for the injected add-bookmark button.
#[wasm_bindgen]
pub async fn content_add_bookmark() -> Result<(), JsValue> {
    agent()
        .add_bookmark()
        .await
        .map_err(|err| JsValue::from_str(&err.to_string()))
}
