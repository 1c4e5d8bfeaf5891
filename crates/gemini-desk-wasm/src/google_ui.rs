use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlElement, MouseEvent};

use gemini_desk_session::{ConnectView, GoogleAccount, GoogleStatus};

use crate::dom;
use crate::frappe::FrappeClient;

struct ButtonView {
    button: HtmlElement,
}

impl ConnectView for ButtonView {
    fn show_status(&mut self, status: GoogleStatus) {
        self.button.set_text_content(Some(status.button_label()));
        let classes = self.button.class_list();
        let _ = match status {
            GoogleStatus::Connected => classes.add_1("connected"),
            _ => classes.remove_1("connected"),
        };
    }
}

/// Wire the "Connect Google Account" button when the page has one
pub fn mount(document: &Document, client: FrappeClient) -> Result<(), JsValue> {
    let Some(element) = dom::find_element(document, "googleConnectButton") else {
        return Ok(());
    };
    let button = element
        .clone()
        .dyn_into::<HtmlElement>()
        .map_err(|_| JsValue::from_str("googleConnectButton is not an HtmlElement"))?;
    let account = Rc::new(GoogleAccount::new(client, ButtonView { button }));

    // Popup blockers only allow window.open inside the click itself, so the
    // URL is fetched up front by refresh()
    let clicked = account.clone();
    dom::add_click_listener(&element, move |event: MouseEvent| {
        event.prevent_default();
        if let Some(url) = clicked.prepared_authorization_url() {
            open_in_new_tab(&url);
            return;
        }
        log::warn!("Google authorization URL not ready yet");
        let account = clicked.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match account.prepare_authorization_url().await {
                Ok(url) => open_in_new_tab(&url),
                Err(e) => log::error!("Failed to get Google authorization URL: {}", e),
            }
        });
    })?;

    wasm_bindgen_futures::spawn_local(async move {
        let status = account.refresh().await;
        log::debug!("Google account status: {:?}", status);
    });
    Ok(())
}

fn open_in_new_tab(url: &str) {
    let opened = crate::window().and_then(|w| w.open_with_url_and_target(url, "_blank"));
    if let Err(e) = opened {
        log::error!("Failed to open {}: {:?}", url, e);
    }
}
