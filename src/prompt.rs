use async_trait::async_trait;
use ratatui::backend::Backend;
use ratatui::Terminal;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::actions::Action;
use crate::app::App;
use crate::runner::{NoticeLevel, UserPrompt};

/// Answers confirmations through the TUI's dialog.
///
/// While a question is open, key presses go to the dialog and every other
/// action is set aside; the caller replays them with [`TuiPrompt::into_deferred`].
pub struct TuiPrompt<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    app: &'a mut App,
    rx: &'a mut UnboundedReceiver<Action>,
    deferred: Vec<Action>,
}

impl<'a, B: Backend> TuiPrompt<'a, B> {
    pub fn new(
        terminal: &'a mut Terminal<B>,
        app: &'a mut App,
        rx: &'a mut UnboundedReceiver<Action>,
    ) -> Self {
        Self {
            terminal,
            app,
            rx,
            deferred: Vec::new(),
        }
    }

    pub fn into_deferred(self) -> Vec<Action> {
        self.deferred
    }
}

#[async_trait]
impl<B: Backend + Send> UserPrompt for TuiPrompt<'_, B> {
    async fn confirm(&mut self, message: &str) -> bool {
        self.app.ask(message, None);

        loop {
            let app = &mut *self.app;
            if let Err(e) = self.terminal.draw(|f| app.render(f)) {
                tracing::warn!(error = %e, "Failed to draw confirmation");
                self.app.confirmation = None;
                return false;
            }

            let Some(action) = self.rx.recv().await else {
                self.app.confirmation = None;
                return false;
            };

            match action {
                Action::KeyPress(key) => {
                    if let Some(answer) = self.app.answer_confirmation(key) {
                        return answer;
                    }
                }
                other => self.deferred.push(other),
            }
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.app.set_status(level, message);
    }
}
