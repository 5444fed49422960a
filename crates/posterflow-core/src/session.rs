//! Poster session state: prompt box, chat log, and editor metadata.
//!
//! State lives in a [`PosterSession`] that callers pass around explicitly.
//! It changes only through the action methods below, and observers follow
//! it through [`PosterSession::subscribe`]. The generation pipeline never
//! touches it; callers record outcomes here after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::types::{ChatMessage, Role};

/// Prompt box, busy flag, and chat log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiState {
    pub instruction: String,
    pub is_thinking: bool,
    pub messages: Vec<ChatMessage>,
    pub last_instruction: Option<String>,
    pub last_error: Option<String>,
    pub last_element_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub poster_title: String,
    pub background_url: Option<String>,
    pub background_prompt: String,
    pub has_unsaved_changes: bool,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            poster_title: "Untitled poster".into(),
            background_url: None,
            background_prompt: String::new(),
            has_unsaved_changes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub ai: AiState,
    pub editor: EditorState,
}

/// Observable state container for one poster being edited.
#[derive(Debug)]
pub struct PosterSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    state: watch::Sender<SessionState>,
}

impl PosterSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            state,
        }
    }

    /// Receive a notification after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_thinking(&self) -> bool {
        self.state.borrow().ai.is_thinking
    }

    pub fn set_instruction(&self, instruction: impl Into<String>) {
        let instruction = instruction.into();
        self.state.send_modify(|s| s.ai.instruction = instruction);
    }

    /// Mark a request as in flight. Returns false if one already is.
    pub fn start_thinking(&self) -> bool {
        self.state.send_if_modified(|s| {
            if s.ai.is_thinking {
                return false;
            }
            s.ai.is_thinking = true;
            s.ai.last_error = None;
            true
        })
    }

    pub fn finish_thinking(&self) {
        self.state.send_modify(|s| s.ai.is_thinking = false);
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|s| {
            s.ai.last_error = Some(message);
            s.ai.is_thinking = false;
        });
    }

    /// Record a successful turn and clear the prompt box.
    pub fn set_last_result(&self, instruction: impl Into<String>, element_count: usize) {
        let instruction = instruction.into();
        self.state.send_modify(|s| {
            s.ai.last_instruction = Some(instruction);
            s.ai.last_element_count = Some(element_count);
            s.ai.is_thinking = false;
            s.ai.last_error = None;
            s.ai.instruction.clear();
        });
    }

    pub fn add_message(&self, role: Role, content: impl Into<String>, error: bool) -> ChatMessage {
        let message = ChatMessage::new(role, content, error);
        let appended = message.clone();
        self.state.send_modify(|s| s.ai.messages.push(appended));
        message
    }

    pub fn clear_messages(&self) {
        self.state.send_modify(|s| s.ai.messages.clear());
    }

    pub fn set_poster_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.state.send_modify(|s| {
            s.editor.poster_title = title;
            s.editor.has_unsaved_changes = true;
        });
    }

    /// Remember the background placed on the poster and the prompt behind it.
    pub fn set_background(&self, url: impl Into<String>, prompt: impl Into<String>) {
        let (url, prompt) = (url.into(), prompt.into());
        self.state.send_modify(|s| {
            s.editor.background_url = Some(url);
            s.editor.background_prompt = prompt;
            s.editor.has_unsaved_changes = true;
        });
    }

    pub fn mark_changed(&self) {
        self.state.send_modify(|s| s.editor.has_unsaved_changes = true);
    }

    pub fn reset(&self) {
        self.state.send_modify(|s| *s = SessionState::default());
    }
}
