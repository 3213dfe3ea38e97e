use anyhow::{anyhow, Result};
use clap::Parser;

mod app;
mod assist;
mod claim;
mod config;
mod handler;
mod knowledge;
mod tui;
mod ui;

use app::App;
use assist::Backend;
use config::Config;

#[derive(Parser)]
#[command(name = "claims")]
#[command(about = "TUI for insurance claim tracking with AI-assisted policy consultation")]
struct Cli {
    /// Assist backend to use: mock or remote
    #[arg(short, long)]
    backend: Option<String>,

    /// Base URL of the remote assist service
    #[arg(short, long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new());

    // CLI flags override the saved config and become the new default
    let mut changed = false;
    if let Some(backend) = &cli.backend {
        let backend = Backend::from_str(backend)
            .ok_or_else(|| anyhow!("unknown backend '{}', expected mock or remote", backend))?;
        config.backend = Some(backend.as_str().to_string());
        changed = true;
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
        changed = true;
    }
    if changed {
        config.save()?;
    }

    let backend = config
        .backend
        .as_deref()
        .and_then(Backend::from_str)
        .unwrap_or(Backend::Mock);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(events.sender(), backend, config.endpoint.as_deref());

    let result = run(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
