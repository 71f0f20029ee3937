use thiserror::Error;

/// Failures while getting a command into a shell session
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to create terminal \"{name}\": {source}")]
    SessionCreate {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to send command to terminal \"{name}\": {source}")]
    Send {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to query active terminals: {0}")]
    Host(#[source] anyhow::Error),
}
