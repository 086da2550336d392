//! Terminal window: contact pop-up, history, login form and settings.

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    text::Line,
    widgets::{Block, Paragraph, Wrap},
};
use serde_json::Value;

use crate::bridge::{AuthPrompt, Event, Message, Request, SettingsView};
use crate::model::{Credential, LookupRecord, LookupStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Contact,
    History,
    Login,
    Settings,
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Quit,
    Event(Event),
    Request(Request),
}

const API_KEY_FIELD: usize = 0;
const USERNAME_FIELD: usize = 1;
const PASSWORD_FIELD: usize = 2;
const FIELD_LABELS: [&str; 3] = ["API key", "Username", "Password"];

#[derive(Debug, Default)]
struct LoginForm {
    fields: [String; 3],
    focus: usize,
    message: String,
    pending: Option<String>,
}

impl LoginForm {
    fn fill(&mut self, prompt: AuthPrompt) {
        if self.fields[API_KEY_FIELD].is_empty() {
            self.fields[API_KEY_FIELD] = prompt.remembered.api_key;
        }
        if self.fields[USERNAME_FIELD].is_empty() {
            self.fields[USERNAME_FIELD] = prompt.remembered.username;
        }
        self.fields[PASSWORD_FIELD].clear();
        self.message = prompt.message;
        self.pending = prompt.pending_input;
        self.focus = if self.fields[API_KEY_FIELD].is_empty() {
            API_KEY_FIELD
        } else if self.fields[USERNAME_FIELD].is_empty() {
            USERNAME_FIELD
        } else {
            PASSWORD_FIELD
        };
    }

    fn credential(&self) -> Credential {
        Credential {
            api_key: self.fields[API_KEY_FIELD].trim().to_string(),
            username: self.fields[USERNAME_FIELD].trim().to_string(),
            password: self.fields[PASSWORD_FIELD].clone(),
        }
    }
}

pub struct Display {
    view: View,
    contact: Option<LookupRecord>,
    history: Vec<LookupRecord>,
    settings: SettingsView,
    login: LoginForm,
    status: String,
}

impl Display {
    pub fn new(settings: SettingsView) -> Self {
        Self {
            view: View::Contact,
            contact: None,
            history: Vec::new(),
            settings,
            login: LoginForm::default(),
            status: String::new(),
        }
    }

    #[cfg(test)]
    pub fn view(&self) -> View {
        self.view
    }

    /// Take in a reply or push from the orchestrator.
    pub fn apply(&mut self, message: Message) {
        match message {
            Message::ContactData(record) => {
                self.contact = record;
                if self.view != View::Login {
                    self.view = View::Contact;
                }
            }
            Message::AuthPrompt(prompt) => {
                self.login.fill(prompt);
                self.view = View::Login;
            }
            Message::History(records) => self.history = records,
            Message::Settings(settings) => {
                if settings.logged_in && self.view == View::Login {
                    self.view = View::Contact;
                }
                self.settings = settings;
            }
            Message::Status(status) => self.status = status,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        if self.view == View::Login {
            return self.on_login_key(key.code);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') => {
                self.view = View::Contact;
                Action::None
            }
            KeyCode::Char('h') => {
                self.view = View::History;
                Action::Request(Request::History)
            }
            KeyCode::Char('s') => {
                self.view = View::Settings;
                Action::Request(Request::Settings)
            }
            KeyCode::Char('l') => Action::Event(Event::Logout),
            KeyCode::Char('L') => Action::Request(Request::AuthPrompt),
            _ => Action::None,
        }
    }

    fn on_login_key(&mut self, code: KeyCode) -> Action {
        let form = &mut self.login;
        match code {
            KeyCode::Esc => {
                self.view = View::Contact;
                Action::None
            }
            KeyCode::Tab | KeyCode::Down => {
                form.focus = (form.focus + 1) % FIELD_LABELS.len();
                Action::None
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.focus = (form.focus + FIELD_LABELS.len() - 1) % FIELD_LABELS.len();
                Action::None
            }
            KeyCode::Enter => {
                let credential = form.credential();
                form.fields[PASSWORD_FIELD].clear();
                form.message = "Logging in...".to_string();
                Action::Event(Event::CredentialsSubmitted(credential))
            }
            KeyCode::Backspace => {
                form.fields[form.focus].pop();
                Action::None
            }
            KeyCode::Char(c) => {
                form.fields[form.focus].push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(f.area());

        let who = if self.settings.logged_in {
            self.settings.name.as_str()
        } else {
            "not logged in"
        };
        f.render_widget(Paragraph::new(format!("crm-screen-pop  ({})", who)), header);

        let (title, lines) = match self.view {
            View::Contact => (
                " Contact ",
                match &self.contact {
                    Some(record) => contact_lines(record),
                    None => vec!["Waiting for a call...".to_string()],
                },
            ),
            View::History => (" History ", history_lines(&self.history)),
            View::Login => (" Log in ", self.login_lines()),
            View::Settings => (" Settings ", settings_lines(&self.settings)),
        };
        let lines: Vec<Line> = lines.into_iter().map(Line::from).collect();
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::bordered().title(title))
                .wrap(Wrap { trim: false }),
            body,
        );

        let keys = if self.view == View::Login {
            "Tab next field  Enter log in  Esc cancel"
        } else {
            "c contact  h history  s settings  L log in  l log out  q quit"
        };
        let footer_text = if self.status.is_empty() {
            keys.to_string()
        } else {
            format!("{}  |  {}", self.status, keys)
        };
        f.render_widget(Paragraph::new(footer_text), footer);
    }

    fn login_lines(&self) -> Vec<String> {
        let form = &self.login;
        let mut lines = vec![form.message.clone(), String::new()];
        for (i, label) in FIELD_LABELS.iter().enumerate() {
            let value = if i == PASSWORD_FIELD {
                "*".repeat(form.fields[i].chars().count())
            } else {
                form.fields[i].clone()
            };
            let cursor = if i == form.focus { ">" } else { " " };
            lines.push(format!("{} {:<9} {}", cursor, label, value));
        }
        if let Some(pending) = &form.pending {
            lines.push(String::new());
            lines.push(format!("Lookup of {} will run after login.", pending));
        }
        lines
    }
}

fn status_label(record: &LookupRecord) -> &'static str {
    match record.status {
        LookupStatus::Pending => "looking up",
        LookupStatus::Success if record.results.is_empty() => "no match",
        LookupStatus::Success => "found",
        LookupStatus::Failed => "failed",
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Every matched contact with its scalar fields.
pub fn contact_lines(record: &LookupRecord) -> Vec<String> {
    let mut lines = vec![
        format!("{}  [{}]", record.raw_input, status_label(record)),
        record.details.clone(),
    ];
    for contact in &record.results {
        lines.push(String::new());
        lines.push(contact.display_name());
        for (key, value) in &contact.crm {
            if let Some(text) = scalar(value) {
                lines.push(format!("  {}: {}", key, text));
            }
        }
    }
    lines
}

/// One line per lookup, newest first.
pub fn history_lines(records: &[LookupRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No lookups yet.".to_string()];
    }
    records
        .iter()
        .rev()
        .map(|record| {
            let summary = match record.results.first() {
                Some(first) if record.results.len() > 1 => {
                    format!("{} (+{} more)", first.display_name(), record.results.len() - 1)
                }
                Some(first) => first.display_name(),
                None => record.details.clone(),
            };
            format!(
                "{}  {:<16} {:<10} {}",
                record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                record.raw_input,
                status_label(record),
                summary
            )
        })
        .collect()
}

fn settings_lines(settings: &SettingsView) -> Vec<String> {
    if settings.logged_in {
        vec![
            format!("Logged in as {}", settings.name),
            format!("User id: {}", settings.id),
        ]
    } else {
        vec!["Not logged in. Press L to log in.".to_string()]
    }
}

#[cfg(test)]
mod tests;
