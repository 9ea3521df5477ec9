mod assistant;
mod capture;
mod chat;
mod controller;
mod error;
mod hotkey;
mod output;
mod settings;
mod stream;
mod window;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use dialoguer::{Confirm, Input, Select};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assistant::Assistant;
use capture::XcapScreens;
use controller::{Controller, SettingsForm};
use hotkey::{RESTORE_SHORTCUT, RestoreShortcut};
use output::TerminalSurface;
use settings::SettingsStore;
use window::{CloseAction, TerminalWindow, WindowHost, quit_on_all_closed};

/// Time the terminal gets to move out of the way before the screen is grabbed.
const HIDE_SETTLE: Duration = Duration::from_millis(150);

type App = Controller<Arc<TerminalWindow>, XcapScreens>;

fn cli() -> Command {
    Command::new("screenask")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ask a vision model about what is on your screen")
        .arg(
            Arg::new("settings")
                .long("settings")
                .value_name("PATH")
                .help("Settings file (default: <config dir>/screenask/settings.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ask")
                .long("ask")
                .value_name("TEXT")
                .help("Capture once, ask TEXT, print the answer and exit"),
        )
        .arg(
            Arg::new("no-hotkey")
                .long("no-hotkey")
                .action(ArgAction::SetTrue)
                .help(format!("Do not register the global {RESTORE_SHORTCUT} restore shortcut")),
        )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();

    let matches = cli().get_matches();

    let settings_path = matches
        .get_one::<PathBuf>("settings")
        .cloned()
        .unwrap_or_else(SettingsStore::default_path);
    let store = SettingsStore::new(settings_path);
    log::info!("Settings file: {:?}", store.path());

    let window = Arc::new(TerminalWindow::new(HIDE_SETTLE));
    let assistant = Assistant::new(Arc::clone(&window), XcapScreens::new())?;
    let mut app: App = Controller::new(assistant, store);

    if let Some(question) = matches.get_one::<String>("ask") {
        let mut surface = TerminalSurface::new(io::stdout());
        app.send(question, &mut surface).await;
        return Ok(());
    }

    let shortcut = if matches.get_flag("no-hotkey") {
        None
    } else {
        hotkey::register_restore_shortcut(Arc::clone(&window))
    };

    run_shell(&mut app, shortcut.as_ref()).await
}

async fn run_shell(app: &mut App, shortcut: Option<&RestoreShortcut>) -> Result<()> {
    println!("screenask {} (model {})", env!("CARGO_PKG_VERSION"), app.settings().model);
    println!("Type a question and press Enter to capture the screen and ask. /help for commands.");
    if app.settings().api_key.is_empty() {
        println!("No API key set yet; use /settings.");
    }

    let mut surface = TerminalSurface::new(io::stdout());

    loop {
        let line: String = Input::new()
            .with_prompt("Ask")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;

        match line.trim() {
            "/help" => print_help(),
            "/settings" => edit_settings(app)?,
            "/close" => {
                if !close_window(app, shortcut)? {
                    break;
                }
            }
            "/quit" | "/exit" => break,
            question => {
                app.send(question, &mut surface).await;
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("  <text>      capture the screen and ask <text> (empty asks what is on screen)");
    println!("  /settings   edit settings (save / cancel / restore defaults)");
    println!("  /close      close the window (minimizes when minimize-on-close is set)");
    println!("  /quit       exit");
}

/// Applies the close policy. Returns `false` when the app should exit.
fn close_window(app: &App, shortcut: Option<&RestoreShortcut>) -> Result<bool> {
    let minimize = match app.close_action() {
        CloseAction::Minimize => true,
        CloseAction::Quit => !quit_on_all_closed(std::env::consts::OS),
    };
    if !minimize {
        return Ok(false);
    }

    app.window().hide();
    match shortcut {
        Some(shortcut) => {
            println!("Minimized. Press {RESTORE_SHORTCUT} to restore.");
            if !shortcut.wait_for_restore() {
                log::warn!("Restore shortcut listener stopped");
            }
        }
        None => {
            println!("Minimized. Press Enter to restore.");
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).context("Failed to read input")?;
        }
    }
    app.window().show();
    Ok(true)
}

fn edit_settings(app: &mut App) -> Result<()> {
    let mut form = app.open_settings();

    loop {
        form = prompt_form(form)?;

        let choice = Select::new()
            .with_prompt("Settings")
            .items(&["Save", "Cancel", "Restore defaults"])
            .default(0)
            .interact()
            .context("Failed to read choice")?;

        match choice {
            0 => {
                app.save_settings(&form)?;
                println!("Settings saved.");
                return Ok(());
            }
            1 => {
                let kept = app.cancel_settings();
                println!("Changes discarded. Keeping {} at {}.", kept.model, kept.api_host);
                return Ok(());
            }
            _ => form = app.restore_defaults(),
        }
    }
}

fn prompt_form(form: SettingsForm) -> Result<SettingsForm> {
    Ok(SettingsForm {
        api_key: prompt_text("API key", &form.api_key)?,
        api_host: prompt_text("API host", &form.api_host)?,
        model: prompt_text("Model", &form.model)?,
        temperature: prompt_text("Temperature (0-2)", &form.temperature)?,
        top_p: prompt_text("Top P (0-1)", &form.top_p)?,
        presence_penalty: prompt_text("Presence penalty", &form.presence_penalty)?,
        frequency_penalty: prompt_text("Frequency penalty", &form.frequency_penalty)?,
        minimize_on_close: prompt_flag("Minimize on close", form.minimize_on_close)?,
        always_on_top: prompt_flag("Always on top", form.always_on_top)?,
        start_on_boot: prompt_flag("Start on boot", form.start_on_boot)?,
    })
}

fn prompt_text(label: &str, current: &str) -> Result<String> {
    Input::new()
        .with_prompt(label)
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read {label}"))
}

fn prompt_flag(label: &str, current: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(label)
        .default(current)
        .interact()
        .with_context(|| format!("Failed to read {label}"))
}
