use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, HtmlElement, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, KeyboardEvent, MouseEvent,
};

use gemini_desk_session::{
    escape_html, Bubble, BubbleId, ChatController, ChatSession, ConversationListItem,
    MessageRenderer, TranscriptView,
};
use gemini_desk_types::{ChatConfig, ChatError, FileReference};

use crate::dom;
use crate::frappe::FrappeClient;
use crate::google_ui;
use crate::host::{self, FrappeSanitizer};
use crate::markdown::PulldownMarkdown;
use crate::storage::LocalStoragePreferences;

type Controller = ChatController<FrappeClient, DomTranscript>;

// ============================================================================
// Transcript view over the page DOM
// ============================================================================

pub struct DomTranscript {
    document: Document,
    container: Element,
    input: HtmlTextAreaElement,
    send_button: Element,
    sidebar: Element,
    model_select: Option<HtmlSelectElement>,
    attachment_chip: Option<HtmlElement>,
    bubbles: Vec<Element>,
}

impl DomTranscript {
    pub fn new(document: &Document, config: &ChatConfig) -> Result<Self, JsValue> {
        let model_select = match dom::find_element(document, "modelSelect") {
            Some(_) => Some(dom::get_select_by_id(document, "modelSelect")?),
            None => None,
        };
        if let Some(select) = &model_select {
            fill_model_options(document, select, config)?;
        }

        let attachment_chip = match dom::find_element(document, "attachmentChip") {
            Some(_) => Some(dom::get_html_element_by_id(document, "attachmentChip")?),
            None => None,
        };

        Ok(Self {
            document: document.clone(),
            container: dom::get_element_by_id(document, "chatMessages")?,
            input: dom::get_textarea_by_id(document, "chatInput")?,
            send_button: dom::get_element_by_id(document, "sendButton")?,
            sidebar: dom::get_element_by_id(document, "conversationList")?,
            model_select,
            attachment_chip,
            bubbles: Vec::new(),
        })
    }

    fn try_append(&mut self, bubble: &Bubble) -> Result<Element, JsValue> {
        let div = dom::create_element_with_class(&self.document, "div", &bubble.class_name())?;
        let content = dom::create_element_with_class(&self.document, "div", "message-content")?;
        content.set_inner_html(&bubble.html);
        div.append_child(&content)?;
        self.container.append_child(&div)?;
        Ok(div)
    }

    fn try_render_conversations(&self, items: &[ConversationListItem]) -> Result<(), JsValue> {
        dom::clear_element(&self.sidebar);

        if items.is_empty() {
            let empty = dom::create_element_with_class(&self.document, "div", "empty-state")?;
            empty.set_text_content(Some("No conversations yet"));
            self.sidebar.append_child(&empty)?;
            return Ok(());
        }

        for item in items {
            let class = if item.active {
                "conversation-item active"
            } else {
                "conversation-item"
            };
            let row = dom::create_element_with_class(&self.document, "div", class)?;
            row.set_attribute("data-conversation", &item.id)?;
            row.set_text_content(Some(&item.title));
            self.sidebar.append_child(&row)?;
        }
        Ok(())
    }
}

fn fill_model_options(
    document: &Document,
    select: &HtmlSelectElement,
    config: &ChatConfig,
) -> Result<(), JsValue> {
    if select.length() > 0 {
        return Ok(());
    }
    let mut models = config.models.clone();
    if !models.contains(&config.default_model) {
        models.insert(0, config.default_model.clone());
    }
    for model in models {
        let option = document.create_element("option")?;
        option.set_attribute("value", &model)?;
        option.set_text_content(Some(&model));
        select.append_child(&option)?;
    }
    Ok(())
}

impl TranscriptView for DomTranscript {
    fn clear(&mut self) {
        dom::clear_element(&self.container);
        self.bubbles.clear();
    }

    fn show_greeting(&mut self, text: &str) {
        match dom::create_element_with_class(&self.document, "div", "chat-greeting") {
            Ok(greeting) => {
                greeting.set_text_content(Some(text));
                if let Err(e) = self.container.append_child(&greeting) {
                    log::error!("Failed to show greeting: {:?}", e);
                }
            }
            Err(e) => log::error!("Failed to show greeting: {:?}", e),
        }
    }

    fn append_bubble(&mut self, bubble: Bubble) -> BubbleId {
        match self.try_append(&bubble) {
            Ok(element) => self.bubbles.push(element),
            Err(e) => {
                log::error!("Failed to append message: {:?}", e);
                // Keep ids aligned with the session's view of the transcript
                if let Ok(detached) = self.document.create_element("div") {
                    self.bubbles.push(detached);
                }
            }
        }
        self.bubbles.len().saturating_sub(1)
    }

    fn update_bubble(&mut self, id: BubbleId, html: &str) {
        let Some(element) = self.bubbles.get(id) else {
            log::warn!("Update for unknown bubble {}", id);
            return;
        };
        match element.query_selector(".message-content") {
            Ok(Some(content)) => content.set_inner_html(html),
            _ => element.set_inner_html(html),
        }
    }

    fn finish_bubble(&mut self, id: BubbleId) {
        if let Some(element) = self.bubbles.get(id) {
            let _ = element.class_list().remove_1("streaming");
        }
    }

    fn scroll_to_bottom(&mut self) {
        dom::scroll_to_bottom(&self.container);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input.set_disabled(!enabled);
        let result = if enabled {
            self.send_button.remove_attribute("disabled")
        } else {
            self.send_button.set_attribute("disabled", "disabled")
        };
        if let Err(e) = result {
            log::error!("Failed to toggle send button: {:?}", e);
        }
        if enabled {
            let _ = self.input.focus();
        }
    }

    fn clear_input(&mut self) {
        self.input.set_value("");
        let _ = self.input.style().set_property("height", "auto");
    }

    fn render_conversations(&mut self, items: &[ConversationListItem]) {
        if let Err(e) = self.try_render_conversations(items) {
            log::error!("Failed to render conversations: {:?}", e);
        }
    }

    fn show_attachment(&mut self, file: Option<&FileReference>) {
        let Some(chip) = &self.attachment_chip else {
            return;
        };
        match file {
            Some(file) => {
                chip.set_inner_html(&format!(
                    r#"📎 {} <button type="button" class="attachment-remove" title="Remove">×</button>"#,
                    escape_html(&file.name)
                ));
                dom::show_element(chip);
            }
            None => {
                dom::clear_element(chip);
                dom::hide_element(chip);
            }
        }
    }

    fn show_model(&mut self, model: &str) {
        if let Some(select) = &self.model_select {
            select.set_value(model);
        }
    }
}

// ============================================================================
// Page wiring
// ============================================================================

pub struct ChatApp {
    document: Document,
    config: ChatConfig,
    client: FrappeClient,
    controller: Rc<Controller>,
}

impl ChatApp {
    pub fn new(config: ChatConfig) -> Result<Self, JsValue> {
        let document = crate::document()?;
        let view = DomTranscript::new(&document, &config)?;
        let renderer = MessageRenderer::new(Box::new(PulldownMarkdown), Box::new(FrappeSanitizer));
        let session = ChatSession::new(
            config.clone(),
            view,
            renderer,
            Box::new(LocalStoragePreferences::new()),
        );
        let client = FrappeClient::new(config.clone());
        let controller = Rc::new(ChatController::new(client.clone(), session));

        Ok(Self {
            document,
            config,
            client,
            controller,
        })
    }

    pub async fn start(self) -> Result<(), JsValue> {
        self.setup_message_input()?;
        self.setup_message_sender()?;
        self.setup_sidebar()?;
        self.setup_new_chat_button()?;
        self.setup_save_button()?;
        self.setup_model_select()?;
        self.setup_google_search_toggle()?;
        self.setup_file_input()?;
        self.setup_clarification_links()?;
        self.subscribe_to_stream()?;
        google_ui::mount(&self.document, self.client.clone())?;

        self.controller.start().await;
        Ok(())
    }

    fn setup_message_input(&self) -> Result<(), JsValue> {
        let input = dom::get_element_by_id(&self.document, "chatInput")?;

        // Auto-resize textarea
        dom::add_listener(&input, "input", move |event: Event| {
            let Some(textarea) = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlTextAreaElement>().ok())
            else {
                return;
            };
            if let Ok(html_element) = textarea.clone().dyn_into::<HtmlElement>() {
                let _ = html_element.style().set_property("height", "auto");
                let height = format!("{}px", textarea.scroll_height());
                let _ = html_element.style().set_property("height", &height);
            }
        })
    }

    fn setup_message_sender(&self) -> Result<(), JsValue> {
        let input = dom::get_textarea_by_id(&self.document, "chatInput")?;

        // Send button
        let send_btn = dom::get_element_by_id(&self.document, "sendButton")?;
        let controller = self.controller.clone();
        let source = input.clone();
        dom::add_click_listener(&send_btn, move |_event: MouseEvent| {
            send_prompt(controller.clone(), source.value());
        })?;

        // Enter sends, Shift+Enter inserts a newline
        let controller = self.controller.clone();
        let source = input.clone();
        dom::add_listener(&input, "keydown", move |event: KeyboardEvent| {
            if event.key() == "Enter" && !event.shift_key() {
                event.prevent_default();
                send_prompt(controller.clone(), source.value());
            }
        })
    }

    fn setup_sidebar(&self) -> Result<(), JsValue> {
        let sidebar = dom::get_element_by_id(&self.document, "conversationList")?;
        let controller = self.controller.clone();

        dom::add_click_listener(&sidebar, move |event: MouseEvent| {
            let Some(id) = closest(&event, "[data-conversation]")
                .and_then(|row| row.get_attribute("data-conversation"))
            else {
                return;
            };
            let controller = controller.clone();
            wasm_bindgen_futures::spawn_local(async move {
                controller.load_conversation(&id).await;
            });
        })
    }

    fn setup_new_chat_button(&self) -> Result<(), JsValue> {
        let Some(button) = dom::find_element(&self.document, "newChatButton") else {
            return Ok(());
        };
        let controller = self.controller.clone();
        dom::add_click_listener(&button, move |_event: MouseEvent| {
            controller.start_new_conversation();
        })
    }

    /// Optional save control; asks for a title, defaulting to the current one
    fn setup_save_button(&self) -> Result<(), JsValue> {
        let Some(button) = dom::find_element(&self.document, "saveButton") else {
            return Ok(());
        };
        let controller = self.controller.clone();
        dom::add_click_listener(&button, move |event: MouseEvent| {
            event.prevent_default();
            let current = controller.session().conversation().title.clone();
            let answer = crate::window()
                .and_then(|w| w.prompt_with_message_and_default("Conversation title", &current));
            let title = match answer {
                Ok(Some(title)) => title,
                Ok(None) => return,
                Err(e) => {
                    log::error!("Failed to ask for a title: {:?}", e);
                    current
                }
            };
            let controller = controller.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = controller.save_conversation(Some(&title)).await {
                    log::error!("Failed to save conversation: {}", e);
                }
            });
        })
    }

    fn setup_model_select(&self) -> Result<(), JsValue> {
        let Some(select) = dom::find_element(&self.document, "modelSelect") else {
            return Ok(());
        };
        let controller = self.controller.clone();
        dom::add_listener(&select, "change", move |event: Event| {
            let Some(select) = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlSelectElement>().ok())
            else {
                return;
            };
            let model = select.value();
            if controller.session_mut().select_model(&model) {
                log::info!("Model set to {}", model);
            }
        })
    }

    fn setup_google_search_toggle(&self) -> Result<(), JsValue> {
        let Some(toggle) = dom::find_element(&self.document, "googleSearchToggle") else {
            return Ok(());
        };
        if !self.config.google_search_enabled {
            if let Ok(toggle) = toggle.dyn_into::<HtmlElement>() {
                dom::hide_element(&toggle);
            }
            return Ok(());
        }

        let controller = self.controller.clone();
        dom::add_listener(&toggle, "change", move |event: Event| {
            if let Some(checkbox) = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
            {
                let enabled = controller
                    .session_mut()
                    .set_use_google_search(checkbox.checked());
                log::debug!("Google Search {}", if enabled { "on" } else { "off" });
            }
        })
    }

    fn setup_file_input(&self) -> Result<(), JsValue> {
        let Some(element) = dom::find_element(&self.document, "fileInput") else {
            return Ok(());
        };
        let file_input = dom::get_input_by_id(&self.document, "fileInput")?;

        let controller = self.controller.clone();
        let client = self.client.clone();
        let source = file_input.clone();
        dom::add_listener(&element, "change", move |_event: Event| {
            let Some(file) = source.files().and_then(|files| files.get(0)) else {
                return;
            };
            let controller = controller.clone();
            let client = client.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match client.upload_file(&file).await {
                    Ok(reference) => controller.session_mut().attach(reference),
                    Err(e) => controller.session_mut().show_error(&e),
                }
            });
        })?;

        // Removing the chip also resets the picker
        if let Some(chip) = dom::find_element(&self.document, "attachmentChip") {
            let controller = self.controller.clone();
            dom::add_click_listener(&chip, move |event: MouseEvent| {
                if closest(&event, ".attachment-remove").is_some() {
                    file_input.set_value("");
                    controller.session_mut().clear_attachment();
                }
            })?;
        }
        Ok(())
    }

    /// Option links without a target send their label as the next prompt
    fn setup_clarification_links(&self) -> Result<(), JsValue> {
        let container = dom::get_element_by_id(&self.document, "chatMessages")?;
        let controller = self.controller.clone();

        dom::add_click_listener(&container, move |event: MouseEvent| {
            let Some(link) = closest(&event, "a[data-label]") else {
                return;
            };
            if link.get_attribute("href").as_deref() != Some("#") {
                return;
            }
            event.prevent_default();
            if let Some(label) = link.get_attribute("data-label") {
                send_prompt(controller.clone(), label);
            }
        })
    }

    fn subscribe_to_stream(&self) -> Result<(), JsValue> {
        let controller = self.controller.clone();
        host::subscribe(&self.config.stream_event, move |payload| {
            let controller = controller.clone();
            wasm_bindgen_futures::spawn_local(async move {
                controller.handle_stream_payload(payload).await;
            });
        })
    }
}

fn send_prompt(controller: Rc<Controller>, prompt: String) {
    wasm_bindgen_futures::spawn_local(async move {
        match controller.send_message(&prompt).await {
            Ok(()) => {}
            Err(ChatError::Busy) => log::debug!("Send ignored: a response is in progress"),
            Err(e) => log::error!("Failed to send message: {}", e),
        }
    });
}

fn closest(event: &MouseEvent, selector: &str) -> Option<Element> {
    event
        .target()
        .and_then(|t| t.dyn_into::<Element>().ok())
        .and_then(|el| el.closest(selector).ok().flatten())
}
