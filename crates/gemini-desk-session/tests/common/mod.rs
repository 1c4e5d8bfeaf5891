#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{json, Value};

use gemini_desk_session::{
    escape_html, Bubble, BubbleId, ChatBackend, ChatController, ChatRequest, ChatSession,
    ConnectView, ConversationListItem, GoogleStatus, HtmlSanitizer, MarkdownRenderer,
    MemoryPreferences, MessageRenderer, PreferenceStore, SearchView, TranscriptView,
    WorkspaceBackend,
};
use gemini_desk_types::{
    ChatConfig, ChatError, ChatReply, Conversation, ConversationId, ConversationSummary,
    FileReference, Message, SearchQuery, SearchResults,
};

// ============================================================================
// Rendering
// ============================================================================

/// Wraps escaped text in a paragraph; enough to tell markdown output apart
pub struct ParagraphMarkdown;

impl MarkdownRenderer for ParagraphMarkdown {
    fn render(&self, markdown: &str) -> String {
        format!("<p>{}</p>", escape_html(markdown))
    }
}

pub struct PassthroughSanitizer;

impl HtmlSanitizer for PassthroughSanitizer {
    fn sanitize(&self, html: &str) -> String {
        html.to_string()
    }
}

pub fn renderer() -> MessageRenderer {
    MessageRenderer::new(Box::new(ParagraphMarkdown), Box::new(PassthroughSanitizer))
}

// ============================================================================
// Transcript
// ============================================================================

#[derive(Debug, Default)]
pub struct ViewLog {
    pub bubbles: Vec<Bubble>,
    pub greeting: Option<String>,
    pub input_enabled: bool,
    pub input_clears: usize,
    pub conversations: Vec<ConversationListItem>,
    pub attachment: Option<FileReference>,
    pub model: Option<String>,
}

impl ViewLog {
    pub fn htmls(&self) -> Vec<String> {
        self.bubbles.iter().map(|b| b.html.clone()).collect()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.bubbles.iter().map(|b| b.class_name()).collect()
    }
}

/// Records everything the session draws
#[derive(Clone)]
pub struct RecordingView {
    pub log: Rc<RefCell<ViewLog>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(ViewLog {
                input_enabled: true,
                ..Default::default()
            })),
        }
    }
}

impl TranscriptView for RecordingView {
    fn clear(&mut self) {
        let mut log = self.log.borrow_mut();
        log.bubbles.clear();
        log.greeting = None;
    }

    fn show_greeting(&mut self, text: &str) {
        self.log.borrow_mut().greeting = Some(text.to_string());
    }

    fn append_bubble(&mut self, bubble: Bubble) -> BubbleId {
        let mut log = self.log.borrow_mut();
        log.bubbles.push(bubble);
        log.bubbles.len() - 1
    }

    fn update_bubble(&mut self, id: BubbleId, html: &str) {
        if let Some(bubble) = self.log.borrow_mut().bubbles.get_mut(id) {
            bubble.html = html.to_string();
        }
    }

    fn finish_bubble(&mut self, id: BubbleId) {
        if let Some(bubble) = self.log.borrow_mut().bubbles.get_mut(id) {
            bubble.streaming = false;
        }
    }

    fn scroll_to_bottom(&mut self) {}

    fn set_input_enabled(&mut self, enabled: bool) {
        self.log.borrow_mut().input_enabled = enabled;
    }

    fn clear_input(&mut self) {
        self.log.borrow_mut().input_clears += 1;
    }

    fn render_conversations(&mut self, items: &[ConversationListItem]) {
        self.log.borrow_mut().conversations = items.to_vec();
    }

    fn show_attachment(&mut self, file: Option<&FileReference>) {
        self.log.borrow_mut().attachment = file.cloned();
    }

    fn show_model(&mut self, model: &str) {
        self.log.borrow_mut().model = Some(model.to_string());
    }
}

/// Preferences shared with the test after the session takes ownership
#[derive(Clone, Default)]
pub struct SharedPreferences {
    pub inner: Rc<RefCell<MemoryPreferences>>,
}

impl PreferenceStore for SharedPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.inner.borrow_mut().set(key, value);
    }
}

// ============================================================================
// Chat backend
// ============================================================================

#[derive(Debug, Default)]
pub struct BackendState {
    /// Raw `chat` results, decoded like the real client does
    pub chat_replies: VecDeque<Result<Value, String>>,
    pub stream_results: VecDeque<Result<(), String>>,
    pub requests: Vec<ChatRequest>,
    pub chat_calls: usize,
    pub stream_calls: usize,
    pub list_calls: usize,
    pub get_calls: usize,
    pub save_calls: usize,
    pub records: HashMap<ConversationId, (String, Vec<Message>)>,
    pub summaries: Vec<ConversationSummary>,
    pub fail_listing: bool,
    /// The next save waits until this is released
    pub save_gate: Option<oneshot::Receiver<()>>,
    next_id: usize,
}

/// In-memory stand-in for the Frappe app
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Rc<RefCell<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, value: Value) -> &Self {
        self.state.borrow_mut().chat_replies.push_back(Ok(value));
        self
    }

    pub fn fail_chat(&self, reason: &str) -> &Self {
        self.state
            .borrow_mut()
            .chat_replies
            .push_back(Err(reason.to_string()));
        self
    }

    pub fn fail_stream(&self, reason: &str) -> &Self {
        self.state
            .borrow_mut()
            .stream_results
            .push_back(Err(reason.to_string()));
        self
    }

    /// Store a record as if it had been saved earlier
    pub fn seed(&self, id: &str, title: &str, messages: Vec<Message>) {
        let mut state = self.state.borrow_mut();
        state
            .records
            .insert(id.to_string(), (title.to_string(), messages));
        state.summaries.insert(
            0,
            ConversationSummary {
                name: id.to_string(),
                title: Some(title.to_string()),
            },
        );
    }

    /// Hold the next `save_conversation` until the returned sender fires
    pub fn hold_next_save(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().save_gate = Some(rx);
        tx
    }

    pub fn calls(&self) -> (usize, usize) {
        let state = self.state.borrow();
        (state.chat_calls, state.stream_calls)
    }
}

#[async_trait(?Send)]
impl ChatBackend for FakeBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let mut state = self.state.borrow_mut();
        state.chat_calls += 1;
        state.requests.push(request.clone());
        match state.chat_replies.pop_front() {
            Some(Ok(value)) => Ok(ChatReply::from_value(value)),
            Some(Err(reason)) => Err(ChatError::transport(reason)),
            None => Ok(ChatReply::from_value(json!("ok"))),
        }
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<(), ChatError> {
        let mut state = self.state.borrow_mut();
        state.stream_calls += 1;
        state.requests.push(request.clone());
        match state.stream_results.pop_front() {
            Some(Err(reason)) => Err(ChatError::transport(reason)),
            _ => Ok(()),
        }
    }

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        let mut state = self.state.borrow_mut();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(ChatError::transport("listing unavailable"));
        }
        Ok(state.summaries.clone())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        let record = {
            let mut state = self.state.borrow_mut();
            state.get_calls += 1;
            state.records.get(conversation_id).cloned()
        };
        let Some((title, messages)) = record else {
            return Err(ChatError::Server {
                exc_type: Some("DoesNotExistError".to_string()),
                message: format!("Gemini Conversation {} not found", conversation_id),
            });
        };
        // Same wire shape as the doctype: the log is a JSON-encoded string
        let encoded = serde_json::to_string(&messages)?;
        Conversation::from_record(json!({
            "name": conversation_id,
            "title": title,
            "conversation": encoded,
        }))
    }

    async fn save_conversation(
        &self,
        conversation_id: Option<&str>,
        title: &str,
        messages: &[Message],
    ) -> Result<ConversationId, ChatError> {
        let gate = self.state.borrow_mut().save_gate.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let mut state = self.state.borrow_mut();
        state.save_calls += 1;
        let id = match conversation_id {
            Some(id) => id.to_string(),
            None => {
                state.next_id += 1;
                format!("conv-{}", state.next_id)
            }
        };
        state
            .records
            .insert(id.clone(), (title.to_string(), messages.to_vec()));
        state.summaries.retain(|s| s.name != id);
        state.summaries.insert(
            0,
            ConversationSummary {
                name: id.clone(),
                title: Some(title.to_string()),
            },
        );
        Ok(id)
    }
}

// ============================================================================
// Workspace backend
// ============================================================================

pub enum SearchReply {
    Ready(Result<Value, String>),
    Deferred(oneshot::Receiver<Result<Value, String>>),
}

pub struct WorkspaceState {
    pub search_replies: VecDeque<SearchReply>,
    pub queries: Vec<SearchQuery>,
    pub connected: Result<bool, String>,
    pub auth_url: String,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            search_replies: VecDeque::new(),
            queries: Vec::new(),
            connected: Ok(false),
            auth_url: "https://accounts.google.com/o/oauth2/auth?client_id=abc".to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeWorkspace {
    pub state: Rc<RefCell<WorkspaceState>>,
}

#[async_trait(?Send)]
impl WorkspaceBackend for FakeWorkspace {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ChatError> {
        let reply = {
            let mut state = self.state.borrow_mut();
            state.queries.push(query.clone());
            state.search_replies.pop_front()
        };
        let raw = match reply {
            Some(SearchReply::Ready(raw)) => raw,
            Some(SearchReply::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| Err("search cancelled".to_string())),
            None => Ok(Value::Null),
        };
        match raw {
            Ok(value) => SearchResults::from_value(value),
            Err(reason) => Err(ChatError::transport(reason)),
        }
    }

    async fn check_google_integration(&self) -> Result<bool, ChatError> {
        self.state
            .borrow()
            .connected
            .clone()
            .map_err(ChatError::transport)
    }

    async fn get_auth_url(&self) -> Result<String, ChatError> {
        Ok(self.state.borrow().auth_url.clone())
    }
}

#[derive(Default)]
pub struct RecordingSearchView {
    pub busy_changes: Vec<bool>,
    pub shown: Vec<String>,
}

impl SearchView for RecordingSearchView {
    fn set_busy(&mut self, busy: bool) {
        self.busy_changes.push(busy);
    }

    fn show_html(&mut self, html: &str) {
        self.shown.push(html.to_string());
    }
}

#[derive(Default)]
pub struct RecordingConnectView {
    pub statuses: Vec<GoogleStatus>,
}

impl ConnectView for RecordingConnectView {
    fn show_status(&mut self, status: GoogleStatus) {
        self.statuses.push(status);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn unary_config() -> ChatConfig {
    ChatConfig {
        streaming: false,
        ..Default::default()
    }
}

pub fn streaming_config() -> ChatConfig {
    ChatConfig {
        streaming: true,
        ..Default::default()
    }
}

pub struct Harness {
    pub controller: ChatController<FakeBackend, RecordingView>,
    pub backend: FakeBackend,
    pub view: Rc<RefCell<ViewLog>>,
    pub preferences: SharedPreferences,
}

impl Harness {
    pub fn new(config: ChatConfig) -> Self {
        Self::with_preferences(config, SharedPreferences::default())
    }

    pub fn with_preferences(config: ChatConfig, preferences: SharedPreferences) -> Self {
        let backend = FakeBackend::new();
        let view = RecordingView::new();
        let log = view.log.clone();
        let session = ChatSession::new(config, view, renderer(), Box::new(preferences.clone()));
        Self {
            controller: ChatController::new(backend.clone(), session),
            backend,
            view: log,
            preferences,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.controller.session().messages().to_vec()
    }
}
