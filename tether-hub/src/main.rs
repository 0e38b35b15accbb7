//! Tether Hub: entry point.
//!
//! ```text
//! tether-hub                  Run the dashboard
//! tether-hub --config <path>  Load a custom config TOML
//! tether-hub --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tether_hub::{App, Hub, HubConfig, HubEvent, Tab, UiEvent};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tether-hub", about = "Tether hub dashboard")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tether-hub.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", toml::to_string_pretty(&HubConfig::default())?);
        return Ok(());
    }

    let config = HubConfig::load(&cli.config);

    // The terminal belongs to the dashboard; logs go to a file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.file)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
    info!("tether-hub v{}", env!("CARGO_PKG_VERSION"));

    // 1. Channels
    let (hub_tx, mut hub_rx) = mpsc::unbounded_channel::<HubEvent>();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<String>();

    // 2. Input thread (blocking crossterm poll)
    tokio::task::spawn_blocking(move || {
        loop {
            if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
                if ui_tx.is_closed() {
                    break;
                }
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) => ui_tx.send(UiEvent::Key(key)),
                Ok(Event::Resize(w, h)) => ui_tx.send(UiEvent::Resize(w, h)),
                _ => Ok(()),
            };
            if forwarded.is_err() {
                break;
            }
        }
    });

    // 3. Hub task: owns the engine, runs console commands in order.
    let mut hub = Hub::new(&config, hub_tx.clone())?;
    let hub_task = tokio::spawn(async move {
        hub.start();
        while let Some(line) = cmd_rx.recv().await {
            if let Err(e) = hub.execute_command(&line).await {
                let _ = hub_tx.send(HubEvent::Error(e.to_string()));
            }
        }
        hub.stop().await;
    });

    // 4. Terminal
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    terminal.clear()?;

    let mut app = App::new();

    // 5. UI loop
    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            Some(event) = hub_rx.recv() => app.update(event),

            Some(UiEvent::Key(key)) = ui_rx.recv() => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::F(1) => app.set_tab(Tab::Main),
                    KeyCode::F(2) => app.set_tab(Tab::Satellite),
                    KeyCode::Esc => app.handle_esc(),
                    KeyCode::Tab if app.active_tab == Tab::Main => app.handle_tab(),
                    KeyCode::Char(c) if app.active_tab == Tab::Main => {
                        app.command_to_execute.push(c);
                        app.on_input_change();
                    }
                    KeyCode::Backspace if app.active_tab == Tab::Main => {
                        app.command_to_execute.pop();
                        app.on_input_change();
                    }
                    KeyCode::Up => app.handle_up(),
                    KeyCode::Down => app.handle_down(),
                    KeyCode::PageUp => {
                        app.log_scroll = (app.log_scroll + 10).min(app.logs.len().saturating_sub(1));
                        app.autoscroll = false;
                    }
                    KeyCode::PageDown => {
                        app.log_scroll = app.log_scroll.saturating_sub(10);
                        if app.log_scroll == 0 {
                            app.autoscroll = true;
                        }
                    }
                    KeyCode::Enter if app.active_tab == Tab::Main => {
                        if let Some(cmd) = app.handle_enter() {
                            app.logs.push(format!("> {cmd}"));
                            let _ = cmd_tx.send(cmd);
                        }
                    }
                    _ => {}
                }
            }

            // Debounced completion refresh
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if app.needs_completion_update
                    && app.last_input_time.elapsed() >= Duration::from_millis(150)
                {
                    app.update_completion();
                }
            }
        }

        if app.exit {
            break;
        }
    }

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;

    // Closing the command channel stops the engine.
    drop(cmd_tx);
    drop(ui_rx);
    let _ = hub_task.await;
    info!("tether-hub exited");
    Ok(())
}
