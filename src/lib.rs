/// Video Timestamp Bookmarks - Chrome Extension
/// Built with Rust + WASM + Yew
///
/// Three isolated contexts, one crate: the background service worker
/// (coordinator), the content script injected into video pages (agent), and
/// the popup (ui). They share no memory and coordinate purely through the
/// typed message protocol in `messages` plus the extension storage area.

pub mod agent;
pub mod background;
pub mod bookmark_data;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod messages;
pub mod operations;
pub mod storage;
pub mod ui;
pub mod video_url;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export URL parsing for JavaScript access
#[wasm_bindgen]
pub fn get_shorts_video_id(url: &str) -> Option<String> {
    video_url::get_shorts_video_id(url)
}

#[wasm_bindgen]
pub fn get_watch_video_id(url: &str) -> Option<String> {
    video_url::get_watch_video_id(url)
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
