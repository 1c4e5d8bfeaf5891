use std::cell::{Ref, RefCell, RefMut};

use serde_json::Value;

use gemini_desk_types::{ChatError, ConversationId, StreamUpdate};

use crate::backend::ChatBackend;
use crate::session::ChatSession;
use crate::state::TurnMode;
use crate::view::TranscriptView;

/// Drives a [`ChatSession`] against a [`ChatBackend`].
///
/// Methods take `&self` so the browser layer can share the controller
/// between event handlers behind an `Rc`. The session is only borrowed
/// between awaits, never across one.
pub struct ChatController<B: ChatBackend, V: TranscriptView> {
    backend: B,
    session: RefCell<ChatSession<V>>,
}

impl<B: ChatBackend, V: TranscriptView> ChatController<B, V> {
    pub fn new(backend: B, session: ChatSession<V>) -> Self {
        Self {
            backend,
            session: RefCell::new(session),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> Ref<'_, ChatSession<V>> {
        self.session.borrow()
    }

    pub fn session_mut(&self) -> RefMut<'_, ChatSession<V>> {
        self.session.borrow_mut()
    }

    /// Populate the sidebar
    pub async fn start(&self) {
        self.refresh_conversations().await;
    }

    /// Send a prompt. Blank prompts are ignored; `Err(Busy)` means a turn
    /// is already in flight. Backend failures end up in the transcript, not
    /// in the return value.
    pub async fn send_message(&self, prompt: &str) -> Result<(), ChatError> {
        let pending = self.session.borrow_mut().begin_send(prompt)?;
        let Some(pending) = pending else {
            log::debug!("Ignoring blank prompt");
            return Ok(());
        };

        match pending.mode {
            TurnMode::Unary => {
                let result = self.backend.chat(&pending.request).await;
                let refresh = {
                    let mut session = self.session.borrow_mut();
                    match result {
                        Ok(reply) => session.receive_unary(pending.turn, reply),
                        Err(e) => {
                            session.fail_turn(pending.turn, &e);
                            false
                        }
                    }
                };
                if refresh {
                    self.refresh_conversations().await;
                }
            }
            TurnMode::Stream => match self.backend.stream_chat(&pending.request).await {
                Ok(()) => self.session.borrow_mut().stream_started(pending.turn),
                Err(e) => self.session.borrow_mut().fail_turn(pending.turn, &e),
            },
        }
        Ok(())
    }

    /// Apply one payload from the realtime channel
    pub async fn handle_stream_payload(&self, payload: Value) {
        let update = match StreamUpdate::from_value(payload) {
            Ok(update) => update,
            Err(e) => {
                log::warn!("Ignoring malformed stream payload: {}", e);
                return;
            }
        };

        let refresh = self.session.borrow_mut().receive_stream_update(update);
        if refresh {
            self.refresh_conversations().await;
        }
    }

    pub async fn load_conversation(&self, conversation_id: &str) {
        log::info!("Loading conversation {}", conversation_id);
        match self.backend.get_conversation(conversation_id).await {
            Ok(mut conversation) => {
                if conversation.id.is_none() {
                    conversation.id = Some(conversation_id.to_string());
                }
                self.session.borrow_mut().load_conversation(conversation);
            }
            Err(e) => self.session.borrow_mut().show_error(&e),
        }
    }

    pub fn start_new_conversation(&self) {
        self.session.borrow_mut().start_new_conversation();
    }

    /// Re-fetch the sidebar. A failure only logs; the previous list stays.
    pub async fn refresh_conversations(&self) {
        match self.backend.get_conversations().await {
            Ok(summaries) => {
                log::debug!("Fetched {} conversations", summaries.len());
                self.session.borrow_mut().show_conversations(summaries);
            }
            Err(e) => log::error!("Failed to list conversations: {}", e),
        }
    }

    /// Save the log under `title` (or the current title). Thoughts are not
    /// saved. The returned name becomes the active conversation id unless
    /// another conversation was opened while the save was in flight.
    pub async fn save_conversation(&self, title: Option<&str>) -> Result<ConversationId, ChatError> {
        let snapshot = self.session.borrow().save_snapshot(title);
        let saved = self
            .backend
            .save_conversation(
                snapshot.conversation_id.as_deref(),
                &snapshot.title,
                &snapshot.messages,
            )
            .await;

        match saved {
            Ok(id) => {
                log::info!("Saved {} messages as {}", snapshot.messages.len(), id);
                self.session
                    .borrow_mut()
                    .mark_saved(snapshot.epoch, id.clone(), snapshot.title);
                self.refresh_conversations().await;
                Ok(id)
            }
            Err(e) => {
                self.session.borrow_mut().show_error(&e);
                Err(e)
            }
        }
    }
}
