//! Chat session state machine.
//!
//! ```text
//! IDLE -> (begin_send) -> AWAITING_RESPONSE
//! AWAITING_RESPONSE -> (unary reply) -> IDLE
//! AWAITING_RESPONSE -> (stream start) -> STREAMING
//! STREAMING -> (chunk) -> STREAMING
//! STREAMING -> (end of stream) -> IDLE
//! AWAITING_RESPONSE/STREAMING -> (error) -> IDLE
//! IDLE -> (load / new conversation) -> IDLE
//! ```
//!
//! Loading or starting a conversation while a turn is in flight abandons
//! that turn: the turn counter moves on and late output for it is dropped.

use gemini_desk_types::{
    truncate_title, ChatConfig, ChatError, ChatReply, Conversation, ConversationId,
    ConversationSummary, FileReference, Message, Role, StreamEvent, StreamUpdate,
};

use crate::backend::ChatRequest;
use crate::render::MessageRenderer;
use crate::state::{
    ChunkSequencer, ConversationEpoch, PendingTurn, SaveSnapshot, SessionPhase, StreamState,
    TurnId, TurnMode,
};
use crate::view::{Bubble, BubbleVariant, ConversationListItem, PreferenceStore, TranscriptView};

const EMPTY_RESPONSE_TEXT: &str = "The model returned an empty response.";
const UNTITLED: &str = "New conversation";

pub struct ChatSession<V: TranscriptView> {
    config: ChatConfig,
    view: V,
    renderer: MessageRenderer,
    preferences: Box<dyn PreferenceStore>,
    conversation: Conversation,
    epoch: ConversationEpoch,
    /// The transcript holds only the greeting placeholder
    greeting_shown: bool,
    phase: SessionPhase,
    turn: TurnId,
    /// Log length before the in-flight turn's user message
    turn_start: usize,
    stream: Option<StreamState>,
    sequencer: ChunkSequencer,
    model: String,
    use_google_search: bool,
    attachment: Option<FileReference>,
    sidebar: Vec<ConversationSummary>,
}

impl<V: TranscriptView> ChatSession<V> {
    /// Create a session showing an empty conversation. The model comes from
    /// the stored preference when it names a configured model.
    pub fn new(
        config: ChatConfig,
        view: V,
        renderer: MessageRenderer,
        preferences: Box<dyn PreferenceStore>,
    ) -> Self {
        let model = preferences
            .get(&config.model_preference_key)
            .filter(|m| config.is_known_model(m))
            .unwrap_or_else(|| config.default_model.clone());

        let mut session = Self {
            config,
            view,
            renderer,
            preferences,
            conversation: Conversation::default(),
            epoch: ConversationEpoch::default(),
            greeting_shown: false,
            phase: SessionPhase::Idle,
            turn: TurnId::default(),
            turn_start: 0,
            stream: None,
            sequencer: ChunkSequencer::default(),
            model,
            use_google_search: false,
            attachment: None,
            sidebar: Vec::new(),
        };
        session.view.show_model(&session.model);
        session.render_transcript();
        session
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.id.as_deref()
    }

    pub fn stream_state(&self) -> Option<&StreamState> {
        self.stream.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn uses_google_search(&self) -> bool {
        self.use_google_search
    }

    pub fn attachment(&self) -> Option<&FileReference> {
        self.attachment.as_ref()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// The log as it should be saved: thoughts are left out
    pub fn persisted_messages(&self) -> Vec<Message> {
        self.conversation.persisted_messages()
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Accept a prompt and describe the backend call to make.
    ///
    /// Returns `Ok(None)` for a blank prompt without attachment (nothing is
    /// sent) and `Err(Busy)` when a turn is already in flight.
    pub fn begin_send(&mut self, prompt: &str) -> Result<Option<PendingTurn>, ChatError> {
        if self.phase != SessionPhase::Idle {
            log::warn!("Ignoring send while {:?}", self.phase);
            return Err(ChatError::Busy);
        }

        let prompt = prompt.trim();
        if prompt.is_empty() && self.attachment.is_none() {
            return Ok(None);
        }

        let attachment = self.attachment.take();

        if self.greeting_shown {
            self.view.clear();
            self.greeting_shown = false;
        }
        if self.conversation.title.is_empty() {
            let source = match &attachment {
                Some(file) if prompt.is_empty() => file.name.as_str(),
                _ => prompt,
            };
            self.conversation.title = truncate_title(source);
        }

        self.turn_start = self.conversation.messages.len();
        self.conversation.messages.push(Message::user(prompt));
        let html = self.renderer.user_html(prompt, attachment.as_ref());
        self.view.append_bubble(Bubble::new(Role::User, html));
        self.view.clear_input();
        self.view.show_attachment(None);
        self.view.set_input_enabled(false);
        self.view.scroll_to_bottom();

        // stream_chat has no file parameter
        let mode = if self.config.streaming && attachment.is_none() {
            TurnMode::Stream
        } else {
            TurnMode::Unary
        };

        self.turn = self.turn.next();
        self.phase = SessionPhase::AwaitingResponse;
        self.sequencer.reset();
        self.stream = match mode {
            TurnMode::Stream => Some(StreamState::default()),
            TurnMode::Unary => None,
        };

        let request = ChatRequest {
            prompt: prompt.to_string(),
            model: self.model.clone(),
            conversation_id: self.conversation.id.clone(),
            use_google_search: self.use_google_search,
            file_uri: attachment.map(|file| file.uri),
            context: self.config.page_context.clone(),
        };

        log::debug!("Turn {:?} started ({:?}, model {})", self.turn, mode, self.model);

        Ok(Some(PendingTurn {
            turn: self.turn,
            mode,
            request,
        }))
    }

    fn is_current(&self, turn: TurnId) -> bool {
        turn == self.turn && self.phase != SessionPhase::Idle
    }

    /// The `stream_chat` call was accepted by the backend
    pub fn stream_started(&mut self, turn: TurnId) {
        if self.is_current(turn) && self.stream.is_some() {
            self.enter_streaming();
        }
    }

    fn enter_streaming(&mut self) {
        if self.phase == SessionPhase::AwaitingResponse {
            log::debug!("Turn {:?} streaming", self.turn);
            self.phase = SessionPhase::Streaming;
        }
    }

    // ------------------------------------------------------------------
    // Receiving
    // ------------------------------------------------------------------

    /// Apply a unary reply. Returns true when the conversation just got its
    /// id, meaning the sidebar should be refreshed.
    pub fn receive_unary(&mut self, turn: TurnId, reply: ChatReply) -> bool {
        if !self.is_current(turn) {
            log::warn!("Dropping reply for abandoned turn {:?}", turn);
            return false;
        }

        let conversation_id = reply.conversation_id().map(str::to_string);
        match reply {
            ChatReply::Legacy(text) => self.push_message(Message::assistant(text)),
            ChatReply::Answer {
                thoughts,
                text,
                image_url,
                ..
            } => {
                if let Some(thoughts) = thoughts {
                    self.push_message(Message::thought(thoughts));
                }
                self.push_message(Message::assistant(text).with_image(image_url));
            }
            ChatReply::Clarify {
                thoughts,
                clarification,
                ..
            } => {
                // The whole turn stays out of the log; only the bubbles remain
                self.conversation.messages.truncate(self.turn_start);
                if let Some(thoughts) = thoughts {
                    let html = self.renderer.message_html(&Message::thought(thoughts));
                    self.view.append_bubble(Bubble::new(Role::Thought, html));
                }
                let html = self.renderer.clarification_html(&clarification);
                self.view.append_bubble(
                    Bubble::new(Role::Assistant, html).with_variant(BubbleVariant::Clarification),
                );
            }
            ChatReply::Empty { .. } => self.show_empty_response(),
        }

        self.settle();
        self.adopt_conversation_id(conversation_id)
    }

    /// Apply one realtime payload. Returns true when the sidebar should be
    /// refreshed.
    pub fn receive_stream_update(&mut self, update: StreamUpdate) -> bool {
        if self.stream.is_none() || self.phase == SessionPhase::Idle {
            log::warn!("Dropping stream payload: no streaming turn is active");
            return false;
        }

        let mut refresh = false;
        for event in self.sequencer.accept(update) {
            if self.stream.is_none() {
                log::warn!("Dropping stream events after the turn ended");
                break;
            }
            match event {
                StreamEvent::ConversationAssigned(id) => {
                    self.enter_streaming();
                    refresh |= self.adopt_conversation_id(Some(id));
                }
                StreamEvent::Chunk(delta) => self.receive_stream_chunk(&delta),
                StreamEvent::Failed(message) => {
                    let error = ChatError::Server {
                        exc_type: None,
                        message,
                    };
                    self.fail_turn(self.turn, &error);
                }
                StreamEvent::Ended { conversation_id } => {
                    refresh |= self.end_stream(conversation_id);
                }
            }
        }
        refresh
    }

    /// Append a delta to the streaming reply and re-render it
    pub fn receive_stream_chunk(&mut self, delta: &str) {
        if self.phase == SessionPhase::Idle {
            log::warn!("Dropping chunk: no streaming turn is active");
            return;
        }
        self.enter_streaming();

        let Some(stream) = self.stream.as_mut() else {
            log::warn!("Dropping chunk for a unary turn");
            return;
        };
        stream.accumulated_text.push_str(delta);
        let html = self.renderer.rich(&stream.accumulated_text);
        match stream.target {
            Some(id) => self.view.update_bubble(id, &html),
            None => {
                let id = self
                    .view
                    .append_bubble(Bubble::new(Role::Assistant, html).streaming());
                stream.target = Some(id);
            }
        }
        self.view.scroll_to_bottom();
    }

    /// Finish the streaming reply. Returns true when the conversation just
    /// got its id.
    pub fn end_stream(&mut self, final_conversation_id: Option<ConversationId>) -> bool {
        let Some(stream) = self.stream.take() else {
            log::warn!("End of stream with no streaming turn");
            return false;
        };

        match stream.target {
            Some(id) => {
                self.view.finish_bubble(id);
                self.conversation
                    .messages
                    .push(Message::assistant(stream.accumulated_text));
            }
            None => self.show_empty_response(),
        }

        log::debug!("Turn {:?} finished streaming", self.turn);
        self.settle();
        self.adopt_conversation_id(final_conversation_id)
    }

    /// Close the in-flight turn with an error bubble. The user message stays
    /// in the log and any partial streamed text is kept.
    pub fn fail_turn(&mut self, turn: TurnId, error: &ChatError) {
        if !self.is_current(turn) {
            log::warn!("Dropping error for abandoned turn {:?}: {}", turn, error);
            return;
        }
        log::error!("Chat turn failed: {}", error);

        if let Some(stream) = self.stream.take() {
            if let Some(id) = stream.target {
                self.view.finish_bubble(id);
            }
            if !stream.accumulated_text.is_empty() {
                self.conversation
                    .messages
                    .push(Message::assistant(stream.accumulated_text));
            }
        }

        self.append_error(&error.to_string());
        self.settle();
    }

    /// Show an error that is not tied to a turn (load or list failures)
    pub fn show_error(&mut self, error: &ChatError) {
        log::error!("{}", error);
        self.append_error(&error.to_string());
        self.view.scroll_to_bottom();
    }

    fn append_error(&mut self, reason: &str) {
        let html = self.renderer.error_html(reason);
        self.view
            .append_bubble(Bubble::new(Role::Assistant, html).with_variant(BubbleVariant::Error));
    }

    fn show_empty_response(&mut self) {
        let html = crate::render::escape_html(EMPTY_RESPONSE_TEXT);
        self.view
            .append_bubble(Bubble::new(Role::Assistant, html).with_variant(BubbleVariant::Notice));
    }

    fn push_message(&mut self, message: Message) {
        let html = self.renderer.message_html(&message);
        self.view.append_bubble(Bubble::new(message.role, html));
        self.conversation.messages.push(message);
    }

    fn settle(&mut self) {
        self.phase = SessionPhase::Idle;
        self.stream = None;
        self.view.set_input_enabled(true);
        self.view.scroll_to_bottom();
    }

    fn adopt_conversation_id(&mut self, id: Option<ConversationId>) -> bool {
        let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
            return false;
        };
        if self.conversation.id.as_deref() == Some(id.as_str()) {
            return false;
        }
        log::info!("Conversation saved as {}", id);
        self.conversation.id = Some(id);
        true
    }

    // ------------------------------------------------------------------
    // Conversation switching
    // ------------------------------------------------------------------

    fn abandon_turn(&mut self) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        log::info!("Abandoning turn {:?}", self.turn);
        if let Some(stream) = self.stream.take() {
            if let Some(id) = stream.target {
                self.view.finish_bubble(id);
            }
        }
        self.turn = self.turn.next();
        self.phase = SessionPhase::Idle;
        self.view.set_input_enabled(true);
    }

    /// Replace the log with a fetched conversation and redraw from scratch
    pub fn load_conversation(&mut self, conversation: Conversation) {
        self.abandon_turn();
        self.attachment = None;
        self.view.show_attachment(None);
        self.view.clear_input();

        log::info!(
            "Loaded conversation {:?} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );
        self.conversation = conversation;
        self.epoch = self.epoch.next();
        self.render_transcript();
        self.render_sidebar();
    }

    /// Forget the active conversation and show the greeting
    pub fn start_new_conversation(&mut self) {
        self.abandon_turn();
        self.conversation = Conversation::default();
        self.epoch = self.epoch.next();
        self.render_transcript();
        self.render_sidebar();
    }

    fn render_transcript(&mut self) {
        self.view.clear();
        self.greeting_shown = self.conversation.messages.is_empty();
        if self.greeting_shown {
            self.view.show_greeting(&self.config.greeting);
            return;
        }
        for message in &self.conversation.messages {
            let html = self.renderer.message_html(message);
            self.view.append_bubble(Bubble::new(message.role, html));
        }
        self.view.scroll_to_bottom();
    }

    /// Render the sidebar list, highlighting the active conversation
    pub fn show_conversations(&mut self, summaries: Vec<ConversationSummary>) {
        self.sidebar = summaries;
        self.render_sidebar();
    }

    fn render_sidebar(&mut self) {
        let active = self.conversation.id.as_deref();
        let items: Vec<ConversationListItem> = self
            .sidebar
            .iter()
            .map(|summary| ConversationListItem {
                id: summary.name.clone(),
                title: summary.display_title().to_string(),
                active: active == Some(summary.name.as_str()),
            })
            .collect();
        self.view.render_conversations(&items);
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Id, title and messages for a `save_conversation` call
    pub fn save_snapshot(&self, title: Option<&str>) -> SaveSnapshot {
        let title = title
            .map(truncate_title)
            .filter(|t| !t.is_empty())
            .or_else(|| Some(self.conversation.title.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| UNTITLED.to_string());
        SaveSnapshot {
            epoch: self.epoch,
            conversation_id: self.conversation.id.clone(),
            title,
            messages: self.persisted_messages(),
        }
    }

    /// Record the id the backend gave a saved conversation. A save taken
    /// from a conversation the user has since left changes nothing here;
    /// returns false in that case.
    pub fn mark_saved(&mut self, epoch: ConversationEpoch, id: ConversationId, title: String) -> bool {
        if epoch != self.epoch {
            log::warn!("Conversation switched while saving {}; keeping the active one", id);
            return false;
        }
        self.conversation.title = title;
        self.adopt_conversation_id(Some(id));
        self.render_sidebar();
        true
    }

    // ------------------------------------------------------------------
    // Preferences and attachments
    // ------------------------------------------------------------------

    /// Switch model and remember the choice. Unknown models are refused.
    pub fn select_model(&mut self, model: &str) -> bool {
        if !self.config.is_known_model(model) {
            log::warn!("Ignoring unknown model {}", model);
            return false;
        }
        self.model = model.to_string();
        self.preferences
            .set(&self.config.model_preference_key, &self.model);
        self.view.show_model(&self.model);
        true
    }

    /// Honoured only when the server enables Google Search
    pub fn set_use_google_search(&mut self, enabled: bool) -> bool {
        self.use_google_search = enabled && self.config.google_search_enabled;
        self.use_google_search
    }

    pub fn attach(&mut self, file: FileReference) {
        self.view.show_attachment(Some(&file));
        self.attachment = Some(file);
    }

    pub fn clear_attachment(&mut self) {
        self.attachment = None;
        self.view.show_attachment(None);
    }
}
