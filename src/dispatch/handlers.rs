//! Built-in command handlers

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Local;

use super::Handler;
use crate::{Error, Result};

/// Answers "what time is it" from the local clock
#[derive(Debug, Default)]
pub struct TimeHandler;

impl TimeHandler {
    /// Create the handler
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Handler for TimeHandler {
    fn name(&self) -> &str {
        "time"
    }

    async fn handle(&self, _command: &str) -> Result<String> {
        let now = Local::now();
        Ok(now.format("It's %I:%M %p").to_string())
    }
}

/// Launches configured applications by name
///
/// The app table maps spoken names ("calculator") to executable paths or
/// commands; only configured entries can be launched.
pub struct AppLaunchHandler {
    apps: HashMap<String, String>,
}

impl AppLaunchHandler {
    /// Create a handler over the configured application table
    #[must_use]
    pub fn new(apps: HashMap<String, String>) -> Self {
        let apps = apps
            .into_iter()
            .map(|(name, path)| (name.to_lowercase(), path))
            .collect();
        Self { apps }
    }

    fn match_app(&self, command: &str) -> Option<(&str, &str)> {
        let lower = command.to_lowercase();
        self.apps
            .iter()
            .find(|(name, _)| lower.contains(name.as_str()))
            .map(|(name, path)| (name.as_str(), path.as_str()))
    }
}

#[async_trait]
impl Handler for AppLaunchHandler {
    fn name(&self) -> &str {
        "app-launch"
    }

    async fn handle(&self, command: &str) -> Result<String> {
        let Some((name, path)) = self.match_app(command) else {
            return Err(Error::Handler(format!(
                "no configured application matches '{command}'"
            )));
        };

        tracing::info!(app = name, path, "launching application");

        let mut child = tokio::process::Command::new(path)
            .spawn()
            .map_err(|e| Error::Handler(format!("failed to launch {name}: {e}")))?;

        // The child outlives the command; reap it in the background so it
        // never lingers as a zombie
        let app = name.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::debug!(app, %status, "application exited"),
                Err(e) => tracing::warn!(app, error = %e, "failed to reap application"),
            }
        });

        Ok(format!("Opening {name}"))
    }
}

/// Fallback for commands no specialized handler claims
#[derive(Debug)]
pub struct GenericHandler {
    reply: String,
}

impl GenericHandler {
    /// Create a fallback with the configured reply
    #[must_use]
    pub fn new(reply: String) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl Handler for GenericHandler {
    fn name(&self) -> &str {
        "generic"
    }

    async fn handle(&self, command: &str) -> Result<String> {
        tracing::debug!(command, "generic fallback reply");
        Ok(self.reply.clone())
    }
}
