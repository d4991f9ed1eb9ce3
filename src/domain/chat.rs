use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a chat message.
///
/// Anything the backend sends other than `ai` is shown on the user side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[default]
    User,
    Ai,
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref() {
            Some("ai") => Sender::Ai,
            _ => Sender::User,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default, deserialize_with = "nullable_text")]
    pub text: String,
}

fn nullable_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }

    /// Text to display, with a placeholder when the backend stored nothing.
    pub fn display_text(&self) -> &str {
        if !self.text.trim().is_empty() {
            return &self.text;
        }
        match self.sender {
            Sender::User => "Message empty. Please re-ask your question.",
            Sender::Ai => "AI response empty. Please retry or repeat your question.",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// `GET /get-user-chat-history` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistoryResponse {
    #[serde(default, deserialize_with = "nullable_list")]
    pub chat_history: Vec<ChatMessage>,
}

pub(crate) fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The conversation shown for one report. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
