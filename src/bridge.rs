//! Named message channels between the lookup orchestrator and display surfaces.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::model::{Credential, LookupRecord};

/// Request half of a request/reply pair, sent by a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ContactData,
    AuthPrompt,
    History,
    Settings,
}

/// One-way submissions from a display surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CredentialsSubmitted(Credential),
    Logout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthPrompt {
    pub message: String,
    pub pending_input: Option<String>,
    pub remembered: Credential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub logged_in: bool,
    pub name: String,
    pub id: i64,
}

/// Replies to [`Request`]s and unsolicited pushes from the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ContactData(Option<LookupRecord>),
    AuthPrompt(AuthPrompt),
    History(Vec<LookupRecord>),
    Settings(SettingsView),
    Status(String),
}

impl Message {
    /// Channel name, for logs.
    pub fn channel(&self) -> &'static str {
        match self {
            Message::ContactData(_) => "contact-data",
            Message::AuthPrompt(_) => "auth-prompt",
            Message::History(_) => "history",
            Message::Settings(_) => "settings",
            Message::Status(_) => "status",
        }
    }
}

/// Orchestrator side: pushes messages to whoever holds the receiver.
pub struct Bridge {
    tx: Sender<Message>,
}

impl Bridge {
    pub fn new() -> (Self, Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, message: Message) {
        let channel = message.channel();
        // A closed display is not an error; the orchestrator keeps its state.
        if self.tx.send(message).is_err() {
            tracing::debug!(channel, "no display listening");
        }
    }
}

/// Drain everything currently queued without blocking.
pub fn drain(rx: &Receiver<Message>) -> Vec<Message> {
    rx.try_iter().collect()
}
