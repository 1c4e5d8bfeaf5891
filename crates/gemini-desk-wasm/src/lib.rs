use wasm_bindgen::prelude::*;
use web_sys::{Document, Window};

use gemini_desk_types::ChatConfig;

mod chat_ui;
mod dom;
mod frappe;
mod google_ui;
mod host;
mod markdown;
mod search_ui;
mod storage;

/// Initialize the WASM module
/// This sets up panic hooks and logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());

    log::info!("Gemini desk widgets initialized");
}

/// Mount the chat widget. `config_json` is the page's widget settings; an
/// empty or malformed string means defaults.
#[wasm_bindgen]
pub async fn init_chat_page(config_json: String) -> Result<(), JsValue> {
    let config = ChatConfig::from_json(&config_json);
    log::info!("Initializing chat page (model {})", config.default_model);
    chat_ui::ChatApp::new(config)?.start().await
}

/// Mount the search page
#[wasm_bindgen]
pub fn init_search_page(config_json: String) -> Result<(), JsValue> {
    let config = ChatConfig::from_json(&config_json);
    log::info!("Initializing search page");
    search_ui::SearchApp::new(config)?.start()
}

/// Get the window object
fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))
}

/// Get the document object
fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("No document object"))
}
