//! Desktop prompt adapter
//!
//! Presents question prompts through `notify-send --action`. The tool blocks
//! until the notification is acted on or dismissed and prints the chosen
//! action key, so each prompt gets a waiter thread that turns the result into
//! a `PromptAction`/`PromptClosed` event on the handler's loop. The caller
//! never blocks.

use crate::events::EngineEvent;
use crate::services::{NotificationSink, PromptId};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

const NOTIFY_SEND: &str = "notify-send";
const APP_NAME: &str = "content-handlers";

/// [`NotificationSink`] backed by the desktop notification service.
pub struct DesktopNotifier {
    program: PathBuf,
    events: Sender<EngineEvent>,
    next_prompt: u64,
}

impl DesktopNotifier {
    pub fn new(events: Sender<EngineEvent>) -> Self {
        Self::with_command(NOTIFY_SEND, events)
    }

    /// Use a custom prompt command (tests, nonstandard notifiers).
    pub fn with_command(program: impl Into<PathBuf>, events: Sender<EngineEvent>) -> Self {
        Self {
            program: program.into(),
            events,
            next_prompt: 0,
        }
    }
}

impl NotificationSink for DesktopNotifier {
    fn present(&mut self, title: &str, body: &str, actions: &[&str]) -> PromptId {
        let prompt = PromptId(self.next_prompt);
        self.next_prompt += 1;

        let mut command = Command::new(&self.program);
        command
            .arg(format!("--app-name={APP_NAME}"))
            .arg("--wait");
        // Action keys are the 0-based indices the relay expects back.
        for (index, action) in actions.iter().enumerate() {
            command.arg(format!("--action={index}={action}"));
        }
        command
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!(%prompt, title, "presenting prompt");
        let events = self.events.clone();
        thread::spawn(move || {
            let event = match command.output() {
                Ok(output) => {
                    let choice = String::from_utf8_lossy(&output.stdout);
                    match choice.trim().parse::<usize>() {
                        Ok(action) => EngineEvent::PromptAction { prompt, action },
                        Err(_) => EngineEvent::PromptClosed { prompt },
                    }
                }
                Err(err) => {
                    warn!(%err, %prompt, "couldn't present prompt");
                    EngineEvent::PromptClosed { prompt }
                }
            };
            let _ = events.send(event);
        });
        prompt
    }
}
