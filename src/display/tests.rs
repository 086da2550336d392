use super::*;
use crate::model::Contact;
use crossterm::event::KeyModifiers;
use ratatui::{Terminal, backend::TestBackend};
use serde_json::json;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn logged_out() -> SettingsView {
    SettingsView {
        logged_in: false,
        name: String::new(),
        id: 0,
    }
}

fn record(contacts: Vec<serde_json::Value>) -> LookupRecord {
    let at = "2026-02-04T10:00:00Z".parse().unwrap();
    let mut record = LookupRecord::pending("Redtail", "+1-555-456-7890", at);
    record.status = LookupStatus::Success;
    record.results = contacts
        .into_iter()
        .map(|c| Contact::from_crm(c, "5554567890", at))
        .collect();
    record.details = format!("{} found", record.results.len());
    record
}

fn prompt(message: &str) -> AuthPrompt {
    AuthPrompt {
        message: message.to_string(),
        pending_input: Some("+1-555-456-7890".into()),
        remembered: Credential {
            api_key: "api".into(),
            username: "jane".into(),
            password: String::new(),
        },
    }
}

#[test]
fn contact_lines_show_each_match_and_scalar_fields() {
    let lines = contact_lines(&record(vec![
        json!({"first_name": "Ada", "last_name": "Lovelace", "id": 1, "phones": [{"n": 1}]}),
        json!({"company_name": "Engines Ltd"}),
    ]));

    assert_eq!(lines[0], "+1-555-456-7890  [found]");
    assert!(lines.contains(&"Ada Lovelace".to_string()));
    assert!(lines.contains(&"  id: 1".to_string()));
    assert!(lines.contains(&"Engines Ltd".to_string()));
    assert!(!lines.iter().any(|l| l.contains("phones")));
}

#[test]
fn no_match_is_labelled_as_such() {
    let lines = contact_lines(&record(vec![]));

    assert_eq!(lines[0], "+1-555-456-7890  [no match]");
}

#[test]
fn history_is_newest_first_and_counts_extra_matches() {
    let mut older = record(vec![json!({"first_name": "Ada"})]);
    older.raw_input = "older".into();
    let newer = record(vec![json!({"first_name": "Bea"}), json!({"first_name": "Cy"})]);

    let lines = history_lines(&[older, newer]);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Bea (+1 more)"));
    assert!(lines[1].contains("older"));
}

#[test]
fn empty_history_has_placeholder() {
    assert_eq!(history_lines(&[]), vec!["No lookups yet.".to_string()]);
}

#[test]
fn auth_prompt_opens_prefilled_login() {
    let mut display = Display::new(logged_out());

    display.apply(Message::AuthPrompt(prompt("Please log in")));

    assert_eq!(display.view(), View::Login);
    assert_eq!(display.login.fields[API_KEY_FIELD], "api");
    assert_eq!(display.login.fields[USERNAME_FIELD], "jane");
    assert_eq!(display.login.focus, PASSWORD_FIELD);
}

#[test]
fn typing_and_enter_submit_credentials_and_clear_password() {
    let mut display = Display::new(logged_out());
    display.apply(Message::AuthPrompt(prompt("Please log in")));

    for c in "pw1x".chars() {
        display.on_key(key(KeyCode::Char(c)));
    }
    display.on_key(key(KeyCode::Backspace));
    let action = display.on_key(key(KeyCode::Enter));

    assert_eq!(
        action,
        Action::Event(Event::CredentialsSubmitted(Credential {
            api_key: "api".into(),
            username: "jane".into(),
            password: "pw1".into(),
        }))
    );
    assert!(display.login.fields[PASSWORD_FIELD].is_empty());
}

#[test]
fn tab_cycles_fields() {
    let mut display = Display::new(logged_out());
    display.apply(Message::AuthPrompt(prompt("x")));

    display.on_key(key(KeyCode::Tab));
    assert_eq!(display.login.focus, API_KEY_FIELD);
    display.on_key(key(KeyCode::BackTab));
    assert_eq!(display.login.focus, PASSWORD_FIELD);
}

#[test]
fn q_in_login_form_is_text_not_quit() {
    let mut display = Display::new(logged_out());
    display.apply(Message::AuthPrompt(prompt("x")));

    assert_eq!(display.on_key(key(KeyCode::Char('q'))), Action::None);
    assert_eq!(display.login.fields[PASSWORD_FIELD], "q");
}

#[test]
fn successful_login_leaves_form() {
    let mut display = Display::new(logged_out());
    display.apply(Message::AuthPrompt(prompt("x")));

    display.apply(Message::Settings(SettingsView {
        logged_in: true,
        name: "Jane".into(),
        id: 1,
    }));

    assert_eq!(display.view(), View::Contact);
}

#[test]
fn navigation_keys_map_to_requests_and_events() {
    let mut display = Display::new(logged_out());

    assert_eq!(display.on_key(key(KeyCode::Char('h'))), Action::Request(Request::History));
    assert_eq!(display.view(), View::History);
    assert_eq!(display.on_key(key(KeyCode::Char('l'))), Action::Event(Event::Logout));
    assert_eq!(display.on_key(key(KeyCode::Char('L'))), Action::Request(Request::AuthPrompt));
    assert_eq!(display.on_key(key(KeyCode::Char('q'))), Action::Quit);
}

#[test]
fn renders_every_view() {
    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    let mut display = Display::new(logged_out());
    display.apply(Message::ContactData(Some(record(vec![json!({"first_name": "Ada"})]))));

    terminal.draw(|f| display.render(f)).unwrap();
    display.on_key(key(KeyCode::Char('h')));
    terminal.draw(|f| display.render(f)).unwrap();
    display.on_key(key(KeyCode::Char('s')));
    terminal.draw(|f| display.render(f)).unwrap();
    display.apply(Message::AuthPrompt(prompt("Please log in")));
    terminal.draw(|f| display.render(f)).unwrap();
}
