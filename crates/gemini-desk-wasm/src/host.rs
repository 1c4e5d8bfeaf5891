//! Bindings to the desk's own JavaScript: the realtime socket, the CSRF
//! token and the XSS sanitizer.

use serde_json::Value;
use wasm_bindgen::prelude::*;

use gemini_desk_session::HtmlSanitizer;
use gemini_desk_types::ChatError;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["frappe", "realtime"], js_name = on)]
    fn realtime_on(event: &str, handler: &Closure<dyn FnMut(JsValue)>) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["frappe", "utils"], js_name = xss_sanitise)]
    fn xss_sanitise(html: &str) -> Result<String, JsValue>;
}

/// Readable reason for a failed JS call
pub fn js_error(value: JsValue) -> ChatError {
    ChatError::transport(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

/// `frappe.csrf_token` of the current page, if the desk set one
pub fn csrf_token() -> Option<String> {
    let window = web_sys::window()?;
    let frappe = js_sys::Reflect::get(&window, &JsValue::from_str("frappe")).ok()?;
    if frappe.is_undefined() || frappe.is_null() {
        return None;
    }
    js_sys::Reflect::get(&frappe, &JsValue::from_str("csrf_token"))
        .ok()?
        .as_string()
        .filter(|token| !token.is_empty())
}

fn payload_to_json(payload: &JsValue) -> Result<Value, ChatError> {
    let text: String = js_sys::JSON::stringify(payload).map_err(js_error)?.into();
    Ok(serde_json::from_str(&text)?)
}

/// Listen for a realtime event for the rest of the page's life
pub fn subscribe<F>(event: &str, mut handler: F) -> Result<(), JsValue>
where
    F: FnMut(Value) + 'static,
{
    let closure = Closure::wrap(Box::new(move |payload: JsValue| {
        match payload_to_json(&payload) {
            Ok(value) => handler(value),
            Err(e) => log::warn!("Ignoring unreadable realtime payload: {}", e),
        }
    }) as Box<dyn FnMut(JsValue)>);

    realtime_on(event, &closure)?;
    closure.forget();
    log::info!("Subscribed to realtime event {}", event);
    Ok(())
}

/// Sanitizer delegating to `frappe.utils.xss_sanitise`
pub struct FrappeSanitizer;

impl HtmlSanitizer for FrappeSanitizer {
    fn sanitize(&self, html: &str) -> String {
        match xss_sanitise(html) {
            Ok(clean) => clean,
            Err(e) => {
                // The markdown renderer already escapes raw HTML
                log::warn!("xss_sanitise unavailable: {:?}", e);
                html.to_string()
            }
        }
    }
}
