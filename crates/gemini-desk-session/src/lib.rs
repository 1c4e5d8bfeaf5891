//! # gemini-desk-session
//!
//! The conversational core of the desk chat widget:
//!
//! - [`ChatSession`]: synchronous state machine owning the message log, the
//!   active conversation id and streaming state, rendering through a
//!   [`TranscriptView`]
//! - [`ChatController`]: async driver issuing backend calls and feeding the
//!   results back into the session without holding a borrow across awaits
//! - [`SearchPanel`] and [`GoogleAccount`]: the smaller desk panels
//!
//! Everything platform specific (DOM, HTTP, realtime socket, local storage,
//! markdown) is injected through the traits in [`backend`], [`render`] and
//! [`view`], so the whole crate is exercised natively in tests.

pub mod backend;
pub mod controller;
pub mod google;
pub mod render;
pub mod search;
pub mod session;
pub mod state;
pub mod view;

pub use backend::{ChatBackend, ChatRequest, WorkspaceBackend};
pub use controller::ChatController;
pub use google::{ConnectView, GoogleAccount, GoogleStatus};
pub use render::{escape_html, plain_text_html, safe_url, HtmlSanitizer, MarkdownRenderer, MessageRenderer};
pub use search::{render_results_html, SearchPanel, SearchView};
pub use session::ChatSession;
pub use state::{
    ChunkSequencer, ConversationEpoch, PendingTurn, SaveSnapshot, SessionPhase, StreamState,
    TurnId, TurnMode,
};
pub use view::{
    Bubble, BubbleId, BubbleVariant, ConversationListItem, MemoryPreferences, PreferenceStore,
    TranscriptView,
};
