mod app;
mod auth;
mod bridge;
mod crm;
mod display;
mod error;
mod history;
mod ipc;
mod model;
mod phone;
mod secrets;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use app::{App, AppOptions};
use bridge::{Bridge, Message, Request};
use crm::CrmClient;
use display::{Action, Display};
use error::LookupError;
use history::HistoryStore;
use secrets::{KeyringStore, MemoryStore, SecretStore};

const APP_DIR: &str = "crm-screen-pop";

// --- CLI -----------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "crm-screen-pop",
    version,
    about = "Pop up CRM contact details for a phone number"
)]
struct Cli {
    /// Phone number to look up on launch
    #[arg(long, short)]
    phone: Option<String>,

    /// Look up without opening the window and print the record as JSON
    #[arg(long, requires = "phone")]
    print: bool,

    /// Config file (default ~/.config/crm-screen-pop/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep the login in memory only, never touching the OS keychain
    #[arg(long)]
    no_keychain: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forget the stored CRM login
    Logout,
    /// Print the lookup history
    History,
}

// --- Config --------------------------------------------------------------

#[derive(serde::Deserialize, Debug)]
#[serde(default)]
struct Config {
    crm_base_url: String,
    /// Pre-fills the login form; users then only type username and password.
    api_key: Option<String>,
    country_code: String,
    persist_history: bool,
    history_path: Option<PathBuf>,
    ipc_port: u16,
    request_timeout_secs: u64,
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crm_base_url: crm::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            country_code: "1".to_string(),
            persist_history: true,
            history_path: None,
            ipc_port: 47615,
            request_timeout_secs: 15,
            log_level: "info".to_string(),
        }
    }
}

fn app_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME env var not set")?;
    Ok(Path::new(&home).join(".config").join(APP_DIR))
}

fn load_config(path: &Path) -> Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).with_context(|| format!("parsing {:?}", path)),
        Err(_) => Ok(Config::default()),
    }
}

// --- Logging -------------------------------------------------------------

/// File logging, so log lines never draw over the window. `RUST_LOG` wins
/// over the configured level.
fn init_logging(level: &str, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("creating {:?}", log_dir))?;

    let default_level: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log_level {:?}", level))?;
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily(log_dir, "crm-screen-pop.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

// --- Terminal lifecycle -------------------------------------------------

fn setup() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn teardown(term: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    terminal::disable_raw_mode()?;
    execute!(term.backend_mut(), LeaveAlternateScreen)?;
    term.show_cursor()?;
    Ok(())
}

// --- Event loop ---------------------------------------------------------

const TICK_RATE: Duration = Duration::from_millis(100);

fn dispatch(app: &mut App, display: &mut Display, action: Action) -> bool {
    match action {
        Action::None => {}
        Action::Quit => return false,
        Action::Event(event) => app.handle_event(event),
        Action::Request(request) => display.apply(app.handle(request)),
    }
    true
}

fn run_window(mut app: App, rx: Receiver<Message>, listener: ipc::Listener) -> Result<()> {
    let mut display = Display::new(app.settings_view());
    display.apply(app.handle(Request::History));
    display.apply(app.handle(Request::ContactData));

    // Restore terminal on panic so we don't leave alternate screen active
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        hook(info);
    }));

    let mut term = setup()?;

    loop {
        for message in bridge::drain(&rx) {
            display.apply(message);
        }

        term.draw(|f| display.render(f))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                let action = display.on_key(key);
                if !dispatch(&mut app, &mut display, action) {
                    break;
                }
            }
        }

        for number in listener.poll() {
            tracing::info!(input = %number, "lookup requested by another instance");
            // Outcome reaches the display through the bridge.
            let _ = app.lookup(&number);
        }
    }

    teardown(&mut term)
}

// --- Entry point --------------------------------------------------------

fn print_lookup(app: &mut App, phone: &str) -> Result<()> {
    match app.lookup(phone) {
        Err(LookupError::MissingCredentials) | Err(LookupError::AuthRejected(_)) => {
            anyhow::bail!("not logged in to the CRM; run without --print to log in")
        }
        Err(err @ LookupError::InvalidNumber(_)) => Err(err.into()),
        _ => {
            let record = app.latest().context("lookup produced no record")?;
            println!("{}", serde_json::to_string_pretty(record)?);
            Ok(())
        }
    }
}

/// The history key lives in the secret store, so without the keychain a
/// saved file could never be read back. Persistence is off in that mode.
fn history_store(config: &Config, dir: &Path, no_keychain: bool) -> Option<HistoryStore> {
    if !config.persist_history {
        return None;
    }
    if no_keychain {
        tracing::info!("history persistence disabled with --no-keychain");
        return None;
    }
    let path = config
        .history_path
        .clone()
        .unwrap_or_else(|| dir.join("history.bin"));
    Some(HistoryStore::new(&path))
}

fn forwarded_message(phone: Option<&str>) -> &'static str {
    match phone {
        Some(_) => "crm-screen-pop is already running; lookup handed over.",
        None => "crm-screen-pop is already running.",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dir = app_dir()?;
    let config_path = cli.config.clone().unwrap_or_else(|| dir.join("config.toml"));
    let config = load_config(&config_path)?;
    let _log_guard = init_logging(&config.log_level, &dir.join("logs"))?;
    tracing::debug!(?config_path, "configuration loaded");

    let secrets: Box<dyn SecretStore> = if cli.no_keychain {
        Box::new(MemoryStore::new())
    } else {
        Box::new(KeyringStore::new())
    };
    let history = history_store(&config, &dir, cli.no_keychain);
    let client = CrmClient::new(
        &config.crm_base_url,
        Duration::from_secs(config.request_timeout_secs),
    );
    let (bridge, rx) = Bridge::new();
    let mut app = App::new(
        client,
        secrets,
        bridge,
        AppOptions {
            country_code: config.country_code.clone(),
            default_api_key: config.api_key.clone(),
            history,
        },
    );

    match cli.command {
        Some(Command::Logout) => {
            app.logout();
            println!("Logged out.");
            return Ok(());
        }
        Some(Command::History) => {
            for line in display::history_lines(app.records()) {
                println!("{}", line);
            }
            return Ok(());
        }
        None => {}
    }

    if cli.print {
        let phone = cli.phone.as_deref().context("--print needs --phone")?;
        return print_lookup(&mut app, phone);
    }

    let listener = match ipc::claim(config.ipc_port, cli.phone.as_deref())? {
        ipc::Instance::Primary(listener) => listener,
        ipc::Instance::Forwarded => {
            println!("{}", forwarded_message(cli.phone.as_deref()));
            return Ok(());
        }
    };

    if let Some(phone) = &cli.phone {
        // Outcome reaches the display through the bridge.
        let _ = app.lookup(phone);
    }

    run_window(app, rx, listener)
}

// --- Tests --------------------------------------------------------------
