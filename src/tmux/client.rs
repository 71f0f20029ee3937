use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::runner::{CloseSubscription, SessionHandle, SessionHost};

/// How often the close watcher polls tmux
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const LIST_FORMAT: &str = "#{session_id}|#{session_name}";

/// Client for interacting with tmux via CLI
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
}

impl TmuxClient {
    pub fn new(tmux_path: impl Into<String>) -> Self {
        Self {
            tmux_path: tmux_path.into(),
        }
    }

    /// List all tmux sessions
    pub async fn list_sessions(&self) -> Result<Vec<SessionHandle>> {
        let output = Command::new(&self.tmux_path)
            .args(["list-sessions", "-F", LIST_FORMAT])
            .output()
            .await
            .context("Failed to execute tmux list-sessions")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no server running") || stderr.contains("no sessions") {
                return Ok(Vec::new());
            }
            anyhow::bail!("tmux list-sessions failed: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_session_line).collect())
    }

    /// Run a tmux subcommand and return its stdout
    async fn tmux(&self, args: &[&str], what: &str) -> Result<String> {
        let output = Command::new(&self.tmux_path)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to {}", what))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to {}: {}", what, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get the command to attach to a session (for external execution)
    pub fn attach_command(&self, session: &SessionHandle) -> Vec<String> {
        vec![
            self.tmux_path.clone(),
            "attach-session".to_string(),
            "-t".to_string(),
            session.id.clone(),
        ]
    }

    fn history_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".command-runner")
            .join("history")
    }
}

#[async_trait]
impl SessionHost for TmuxClient {
    /// Create a detached session with isolated shell history, or adopt an
    /// existing session of the same name
    async fn create(&self, name: &str) -> Result<SessionHandle> {
        if let Some(existing) = self
            .list_sessions()
            .await?
            .into_iter()
            .find(|s| s.name == name)
        {
            tracing::debug!(session = %name, id = %existing.id, "Adopting existing tmux session");
            return Ok(existing);
        }

        let history_dir = Self::history_dir();

        // Ensure history directory exists
        tokio::fs::create_dir_all(&history_dir).await?;

        let history_file = history_dir.join(format!("{}.hist", name));

        let output = Command::new(&self.tmux_path)
            .args(["new-session", "-d", "-s", name, "-P", "-F", "#{session_id}"])
            .env("HISTFILE", &history_file)
            .output()
            .await
            .context("Failed to create tmux session")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to create session: {}", stderr.trim());
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            anyhow::bail!("Session created but tmux reported no id");
        }

        Ok(SessionHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn show(&self, session: &SessionHandle) -> Result<()> {
        self.tmux(&["select-window", "-t", &session.id], "select tmux window")
            .await
            .map(|_| ())
    }

    async fn send_text(&self, session: &SessionHandle, text: &str, execute: bool) -> Result<()> {
        let args = send_keys_args(&session.id, text);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.tmux(&args, "send keys to tmux session").await?;

        if execute {
            self.tmux(&["send-keys", "-t", &session.id, "Enter"], "send Enter to tmux session")
                .await?;
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<SessionHandle>> {
        self.list_sessions().await
    }

    /// Kill a session
    async fn close(&self, session: &SessionHandle) -> Result<()> {
        self.tmux(&["kill-session", "-t", &session.id], "kill tmux session")
            .await
            .map(|_| ())
    }

    /// Poll tmux and report sessions that disappeared since the last poll
    fn subscribe_closed(&self) -> CloseSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        let watcher = tokio::spawn(async move {
            let mut known: HashMap<String, SessionHandle> = HashMap::new();
            loop {
                match client.list_sessions().await {
                    Ok(sessions) => {
                        let current: HashMap<String, SessionHandle> =
                            sessions.into_iter().map(|s| (s.id.clone(), s)).collect();
                        for (id, session) in known.drain() {
                            if !current.contains_key(&id) && tx.send(session).is_err() {
                                return;
                            }
                        }
                        known = current;
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to poll tmux sessions"),
                }
                tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
            }
        });

        CloseSubscription::new(rx, Some(watcher))
    }
}

/// Arguments for typing `text` literally into `target`.
///
/// tmux reads a trailing `;` on any argument as a command separator and turns
/// a trailing `\;` into `;`, so a final `;` gets a backslash to survive.
fn send_keys_args(target: &str, text: &str) -> Vec<String> {
    let literal = match text.strip_suffix(';') {
        Some(head) => format!("{head}\\;"),
        None => text.to_string(),
    };
    ["send-keys", "-t", target, "-l", "--"]
        .into_iter()
        .map(str::to_string)
        .chain(std::iter::once(literal))
        .collect()
}

/// Parse one `session_id|session_name` line of `list-sessions` output
fn parse_session_line(line: &str) -> Option<SessionHandle> {
    let (id, name) = line.split_once('|')?;
    if id.is_empty() {
        return None;
    }
    Some(SessionHandle {
        id: id.to_string(),
        name: name.to_string(),
    })
}
