/// Service-worker glue: chrome.tabs / chrome.action calls live in the
/// background.js shim, routing and readiness logic in the coordinator.
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::bookmark_data::TabMetadata;
use crate::coordinator::{Coordinator, PageBus};
use crate::error::Error;
use crate::messages::{Message, MessageResponse};

// Import JS bridge functions
#[wasm_bindgen(module = "/background.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendTabMessage(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;

    fn openPopup();

    async fn sleep(ms: u32);
}

/// chrome.tabs messaging to content scripts.
pub struct ChromeTabsBus;

impl PageBus for ChromeTabsBus {
    async fn send_to_page(&self, tab_id: i32, message: &Message) -> Result<MessageResponse, Error> {
        let payload = serde_wasm_bindgen::to_value(message).map_err(Error::delivery)?;
        let response = sendTabMessage(tab_id, payload)
            .await
            .map_err(|err| Error::Delivery(format!("{:?}", err)))?;

        // Fire-and-forget handlers answer with undefined.
        if response.is_undefined() {
            return Ok(MessageResponse::Ack);
        }
        serde_wasm_bindgen::from_value(response).map_err(Error::delivery)
    }

    async fn active_tab(&self) -> Result<TabMetadata, Error> {
        let tab = getActiveTab()
            .await
            .map_err(|err| Error::Delivery(format!("{:?}", err)))?;
        serde_wasm_bindgen::from_value(tab).map_err(Error::delivery)
    }

    fn open_popup(&self) {
        openPopup();
    }

    async fn sleep_ms(&self, ms: u32) {
        sleep(ms).await;
    }
}

thread_local! {
    static COORDINATOR: Rc<Coordinator<ChromeTabsBus>> = Rc::new(Coordinator::new(ChromeTabsBus));
}

fn coordinator() -> Rc<Coordinator<ChromeTabsBus>> {
    COORDINATOR.with(|coordinator| coordinator.clone())
}

/// chrome.runtime.onMessage entry point for the background context.
#[wasm_bindgen]
pub async fn background_on_message(
    message: JsValue,
    sender_tab_id: Option<i32>,
) -> Result<JsValue, JsValue> {
    let message: Message =
        serde_wasm_bindgen::from_value(message).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match coordinator().handle_message(message, sender_tab_id).await {
        Ok(Some(response)) => {
            serde_wasm_bindgen::to_value(&response).map_err(|e| JsValue::from_str(&e.to_string()))
        }
        Ok(None) => Ok(JsValue::NULL),
        Err(err) => {
            log::error!("background message handling failed: {}", err);
            Err(JsValue::from_str(&err.to_string()))
        }
    }
}

/// chrome.tabs.onUpdated entry point. Returns whether a new-video
/// notification was delivered to the tab.
#[wasm_bindgen]
pub async fn background_on_tab_updated(tab: JsValue) -> Result<bool, JsValue> {
    let tab: TabMetadata =
        serde_wasm_bindgen::from_value(tab).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match coordinator().on_tab_updated(tab).await {
        Ok(delivered) => Ok(delivered),
        Err(Error::NotReady { tab_id, waited_ms }) => {
            // The tab navigated away or is still loading; nothing to deliver.
            log::warn!("tab {} not ready after {}ms, dropping notification", tab_id, waited_ms);
            Ok(false)
        }
        Err(err) => Err(JsValue::from_str(&err.to_string())),
    }
}

/// chrome.tabs.onRemoved entry point.
#[wasm_bindgen]
pub fn background_on_tab_removed(tab_id: i32) {
    coordinator().forget_tab(tab_id);
}
