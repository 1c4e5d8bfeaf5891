use std::collections::HashMap;

use gemini_desk_types::{ConversationId, FileReference, Role};

/// Handle to a bubble previously appended to the transcript
pub type BubbleId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleVariant {
    Normal,
    Error,
    /// Informational text that is not part of the conversation
    Notice,
    Clarification,
}

impl BubbleVariant {
    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            BubbleVariant::Normal => None,
            BubbleVariant::Error => Some("error"),
            BubbleVariant::Notice => Some("notice"),
            BubbleVariant::Clarification => Some("clarification"),
        }
    }
}

/// One rendered transcript entry. `html` is already escaped or sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: Role,
    pub variant: BubbleVariant,
    pub html: String,
    pub streaming: bool,
}

impl Bubble {
    pub fn new(role: Role, html: String) -> Self {
        Self {
            role,
            variant: BubbleVariant::Normal,
            html,
            streaming: false,
        }
    }

    pub fn with_variant(mut self, variant: BubbleVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Class list for the bubble element, e.g. `message assistant error`
    pub fn class_name(&self) -> String {
        let mut class = format!("message {}", self.role.css_class());
        if let Some(variant) = self.variant.css_class() {
            class.push(' ');
            class.push_str(variant);
        }
        if self.streaming {
            class.push_str(" streaming");
        }
        class
    }
}

/// Sidebar row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationListItem {
    pub id: ConversationId,
    pub title: String,
    pub active: bool,
}

/// Where the session draws. Implemented over the DOM in the browser and by
/// recording fakes in tests.
pub trait TranscriptView {
    /// Remove every bubble and the greeting
    fn clear(&mut self);

    /// Placeholder shown in an empty conversation; not a bubble
    fn show_greeting(&mut self, text: &str);

    fn append_bubble(&mut self, bubble: Bubble) -> BubbleId;

    fn update_bubble(&mut self, id: BubbleId, html: &str);

    /// Drop the streaming marker from a bubble
    fn finish_bubble(&mut self, id: BubbleId);

    fn scroll_to_bottom(&mut self);

    fn set_input_enabled(&mut self, enabled: bool);

    fn clear_input(&mut self);

    fn render_conversations(&mut self, items: &[ConversationListItem]);

    fn show_attachment(&mut self, file: Option<&FileReference>);

    fn show_model(&mut self, _model: &str) {}
}

/// Small persistent key/value store for UI preferences
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory preferences, used when no persistent store is available
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}
