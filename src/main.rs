use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod actions;
mod annotation;
mod app;
mod config;
mod error;
mod prompt;
mod runner;
mod tmux;

use actions::Action;
use annotation::DisplayOptions;
use app::{build_lenses, App};
use config::Settings;
use error::RunnerError;
use prompt::TuiPrompt;
use runner::{DocumentContext, NoticeLevel, RunOutcome, SessionManager};
use tmux::TmuxClient;

/// Run the `run`-annotated commands of a text file in named tmux sessions
#[derive(Debug, Parser)]
#[command(name = "command-runner", version, about)]
struct Cli {
    /// Markdown or plain-text file containing run annotations
    file: PathBuf,

    /// Workspace root used for ${workspaceFolder} and ${relativeFile}
    /// (defaults to the current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the annotations and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(false)
        .with_writer(log_writer())
        .init();

    let settings = Settings::load(cli.config.as_deref())?;
    let file = cli
        .file
        .canonicalize()
        .with_context(|| format!("Cannot open {}", cli.file.display()))?;
    let workspace = match cli.workspace {
        Some(dir) => Some(
            dir.canonicalize()
                .with_context(|| format!("Cannot open workspace {}", dir.display()))?,
        ),
        None => std::env::current_dir().ok(),
    };
    let context = DocumentContext::new(Some(file.clone()), workspace);
    let display = DisplayOptions::from(&settings);

    let text = read_document(&file).await?;

    if cli.list {
        for lens in build_lenses(&text, &display) {
            println!("{:>5}  {}", lens.line, lens.title);
        }
        return Ok(());
    }

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Create session manager
    let mut manager = SessionManager::new(TmuxClient::new(settings.tmux_path.clone()), &settings);
    manager.initialize();

    // Create app state
    let file_name = file
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());
    let mut app = App::new(file_name, display, settings.show_hover_info);
    app.set_lenses(build_lenses(&text, &app.display));
    app.sync(&manager, &context);

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    let input_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press && input_tx.send(Action::KeyPress(key)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Spawn refresh ticker
    let tick_tx = tx.clone();
    let refresh_period = settings.refresh_period();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_period);
        interval.tick().await;
        loop {
            interval.tick().await;
            if tick_tx.send(Action::Tick).is_err() {
                break;
            }
        }
    });

    // Main event loop
    let result = loop {
        // Render
        if let Err(e) = terminal.draw(|f| app.render(f)) {
            break Err(e.into());
        }

        // Process any pending actions from the app
        for pending_action in app.take_pending_actions() {
            match pending_action {
                Action::RunCommand {
                    command,
                    terminal_name,
                } => {
                    let mut prompt = TuiPrompt::new(&mut terminal, &mut app, &mut rx);
                    let outcome = manager
                        .run(&command, terminal_name.as_deref(), &context, &mut prompt)
                        .await;
                    for action in prompt.into_deferred() {
                        let _ = tx.send(action);
                    }

                    match outcome {
                        RunOutcome::Executed(record) => app.set_status(
                            NoticeLevel::Info,
                            format!(
                                "Sent `{}` to terminal \"{}\"",
                                annotation::truncate_for_display(&record.command, 40),
                                record.terminal_name
                            ),
                        ),
                        RunOutcome::Failed(e @ RunnerError::SessionCreate { .. }) => app.set_status(
                            NoticeLevel::Error,
                            format!("{} (tmuxPath is \"{}\")", e, settings.tmux_path),
                        ),
                        _ => {}
                    }
                    app.sync(&manager, &context);
                }
                Action::AttachSession(terminal_name) => {
                    let Some(session) = manager.session_for(terminal_name.as_deref()).cloned() else {
                        app.set_status(
                            NoticeLevel::Warning,
                            "No session yet for this annotation. Run it first.",
                        );
                        continue;
                    };

                    // Suspend TUI and attach to session
                    ratatui::restore();

                    let cmd = manager.host().attach_command(&session);
                    let status = std::process::Command::new(&cmd[0])
                        .args(&cmd[1..])
                        .stdin(Stdio::inherit())
                        .stdout(Stdio::inherit())
                        .stderr(Stdio::inherit())
                        .status();

                    // Resume TUI
                    terminal = ratatui::init();

                    if let Err(e) = status {
                        app.set_status(NoticeLevel::Error, format!("Failed to attach: {}", e));
                    }
                }
                Action::ClearHistory => {
                    manager.clear_history();
                    app.sync(&manager, &context);
                    app.view = app::View::Annotations;
                    app.set_status(NoticeLevel::Info, "Command history cleared");
                }
                Action::CopyCommand(command) => match arboard::Clipboard::new() {
                    Ok(mut clipboard) => {
                        if let Err(e) = clipboard.set_text(command) {
                            app.set_status(NoticeLevel::Error, format!("Clipboard error: {}", e));
                        } else {
                            app.set_status(NoticeLevel::Info, "Command copied to clipboard!");
                        }
                    }
                    Err(e) => {
                        app.set_status(NoticeLevel::Error, format!("Clipboard error: {}", e));
                    }
                },
                refresh @ (Action::Tick | Action::Rescan) => {
                    let rescan_requested = matches!(refresh, Action::Rescan);
                    match read_document(&file).await {
                        Ok(text) => {
                            app.set_lenses(build_lenses(&text, &app.display));
                            if rescan_requested {
                                app.set_status(
                                    NoticeLevel::Info,
                                    format!("Found {} annotations", app.lenses.len()),
                                );
                            }
                        }
                        Err(e) => app.set_status(NoticeLevel::Error, format!("{:#}", e)),
                    }
                    manager.process_close_events();
                    app.sync(&manager, &context);
                }
                _ => {}
            }
        }

        // Handle events from channel
        tokio::select! {
            Some(action) = rx.recv() => {
                match app.handle_action(action) {
                    Ok(should_quit) => {
                        if should_quit {
                            break Ok(());
                        }
                    }
                    Err(e) => {
                        break Err(e);
                    }
                }
            }
        }
    };

    // Restore terminal
    ratatui::restore();
    manager.dispose().await;
    result
}

async fn read_document(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Logs go to a file so they do not draw over the TUI
fn log_writer() -> BoxMakeWriter {
    let file = dirs::cache_dir().and_then(|dir| {
        let dir = dir.join("command-runner");
        std::fs::create_dir_all(&dir).ok()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("command-runner.log"))
            .ok()
    });

    match file {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::sink),
    }
}
