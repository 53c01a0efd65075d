//! Intent classification and command dispatch
//!
//! Maps recognized command text to a registered handler ("agent") and
//! always produces a speakable result: handler errors, timeouts, and
//! panics are converted to typed failures at this boundary, never
//! propagated into the pipeline.

mod handlers;

pub use handlers::{AppLaunchHandler, GenericHandler, TimeHandler};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Closed set of command intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Machine/system questions (memory, disk, gpu)
    Hardware,
    /// File search
    Files,
    /// Code writing
    Code,
    /// Weather lookup
    Weather,
    /// Time of day
    Time,
    /// Launching applications
    AppLaunch,
    /// Everything else
    Generic,
}

impl Intent {
    /// Stable tag for logging
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Files => "files",
            Self::Code => "code",
            Self::Weather => "weather",
            Self::Time => "time",
            Self::AppLaunch => "app-launch",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pluggable classification strategy
///
/// Must be deterministic: identical input text always yields the same
/// intent.
pub trait IntentClassifier: Send + Sync {
    /// Predict the intent for a command
    fn predict(&self, text: &str) -> Intent;
}

/// Ordered keyword-rule classifier
///
/// Rules are checked in priority order; the first match wins. Ambiguous
/// commands therefore resolve the same way every time.
#[derive(Debug, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    /// Create the default rule table
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

impl IntentClassifier for RuleClassifier {
    fn predict(&self, text: &str) -> Intent {
        let cmd = text.to_lowercase();

        if contains_any(&cmd, &["memory", "ram", "disk", "storage", "gpu", "cpu"])
            || cmd.contains("disk space")
        {
            return Intent::Hardware;
        }

        if contains_any(&cmd, &["find", "search", "look for", "locate", "where is"])
            && contains_any(&cmd, &["file", "document", "resume", "pdf", "doc", "folder"])
        {
            return Intent::Files;
        }

        if contains_any(&cmd, &["write", "create", "make", "build"])
            && contains_any(&cmd, &["code", "script", "program", "function"])
        {
            return Intent::Code;
        }

        if contains_any(&cmd, &["open", "launch", "start", "run"])
            && contains_any(
                &cmd,
                &[
                    "word",
                    "excel",
                    "notepad",
                    "chrome",
                    "firefox",
                    "calculator",
                    "browser",
                    "editor",
                    "terminal",
                ],
            )
        {
            return Intent::AppLaunch;
        }

        if contains_any(&cmd, &["weather", "temperature", "forecast"]) {
            return Intent::Weather;
        }

        if cmd.contains("time") && contains_any(&cmd, &["what", "current", "tell"]) {
            return Intent::Time;
        }

        Intent::Generic
    }
}

/// A registered capability handler
///
/// Handlers may perform arbitrary I/O but must honor the dispatcher's
/// timeout; slow handlers are cut off and reported as a timeout.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Human-readable handler name for logging
    fn name(&self) -> &str;

    /// Produce a spoken response for the command
    ///
    /// # Errors
    ///
    /// Returns error if the capability fails; the dispatcher converts it
    /// to a typed failure
    async fn handle(&self, command: &str) -> Result<String>;
}

/// Outcome of dispatching one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Handler produced a response
    Success {
        /// Text to speak back
        text: String,
    },
    /// No handler registered for the intent and no fallback
    NoHandler,
    /// Handler exceeded the dispatch timeout
    HandlerTimeout,
    /// Handler returned an error or panicked
    HandlerError(String),
}

impl DispatchResult {
    /// A user-facing utterance for every outcome
    ///
    /// Failures become a short spoken apology so the orchestrator always
    /// has something to say.
    #[must_use]
    pub fn spoken_text(&self) -> &str {
        match self {
            Self::Success { text } => text,
            Self::NoHandler => "I'm not sure how to help with that yet.",
            Self::HandlerTimeout => "Sorry, that took too long. Please try again.",
            Self::HandlerError(_) => "Sorry, I ran into a problem with that.",
        }
    }

    /// Whether the dispatch succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Routes commands to handlers by intent
pub struct CommandDispatcher {
    classifier: Box<dyn IntentClassifier>,
    handlers: Vec<(Intent, Arc<dyn Handler>)>,
    fallback: Option<Arc<dyn Handler>>,
    timeout: Duration,
}

impl CommandDispatcher {
    /// Create a dispatcher with the given classification strategy
    #[must_use]
    pub fn new(classifier: Box<dyn IntentClassifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            handlers: Vec::new(),
            fallback: None,
            timeout,
        }
    }

    /// Register a handler for an intent
    ///
    /// The first registration for an intent wins on lookup.
    pub fn register(&mut self, intent: Intent, handler: Arc<dyn Handler>) {
        tracing::debug!(intent = %intent, handler = handler.name(), "handler registered");
        self.handlers.push((intent, handler));
    }

    /// Set the fallback handler for unmatched intents
    pub fn set_fallback(&mut self, handler: Arc<dyn Handler>) {
        self.fallback = Some(handler);
    }

    /// Classify a command without dispatching
    #[must_use]
    pub fn classify(&self, text: &str) -> Intent {
        self.classifier.predict(text)
    }

    /// Dispatch a command, always returning a result
    ///
    /// The handler runs on its own task so a panic is contained here and
    /// mapped to [`DispatchResult::HandlerError`].
    pub async fn dispatch(&self, text: &str) -> DispatchResult {
        let intent = self.classifier.predict(text);

        let handler = self
            .handlers
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, h)| h)
            .or_else(|| self.fallback.as_ref());

        let Some(handler) = handler else {
            tracing::warn!(intent = %intent, command = %text, "no handler for intent");
            return DispatchResult::NoHandler;
        };

        tracing::info!(intent = %intent, handler = handler.name(), command = %text, "dispatching");

        let task_handler = Arc::clone(handler);
        let command = text.to_string();
        let task = tokio::spawn(async move { task_handler.handle(&command).await });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                tracing::warn!(intent = %intent, timeout = ?self.timeout, "handler timed out");
                DispatchResult::HandlerTimeout
            }
            Ok(Err(join_err)) => {
                tracing::error!(intent = %intent, error = %join_err, "handler panicked");
                DispatchResult::HandlerError(join_err.to_string())
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(intent = %intent, error = %e, "handler failed");
                DispatchResult::HandlerError(e.to_string())
            }
            Ok(Ok(Ok(response))) => DispatchResult::Success { text: response },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn classifier_rule_priority() {
        let c = RuleClassifier::new();

        assert_eq!(c.predict("how much memory do I have"), Intent::Hardware);
        assert_eq!(c.predict("find my resume file"), Intent::Files);
        assert_eq!(c.predict("write a python script"), Intent::Code);
        assert_eq!(c.predict("open the calculator"), Intent::AppLaunch);
        assert_eq!(c.predict("what's the weather today"), Intent::Weather);
        assert_eq!(c.predict("what time is it"), Intent::Time);
        assert_eq!(c.predict("tell me a joke"), Intent::Generic);
    }

    #[test]
    fn classifier_is_deterministic() {
        let c = RuleClassifier::new();
        // "find the weather file" matches both files and weather rules;
        // the earlier rule must win every time
        for _ in 0..10 {
            assert_eq!(c.predict("find the weather file"), Intent::Files);
        }
    }

    struct StaticHandler(&'static str);

    #[async_trait]
    impl Handler for StaticHandler {
        fn name(&self) -> &str {
            "static"
        }

        async fn handle(&self, _command: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl Handler for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }

        async fn handle(&self, _command: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _command: &str) -> Result<String> {
            Err(Error::Handler("backend unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_intent() {
        let mut d = CommandDispatcher::new(Box::new(RuleClassifier::new()), Duration::from_secs(5));
        d.register(Intent::Time, Arc::new(StaticHandler("It's noon")));

        let result = d.dispatch("what time is it").await;
        assert_eq!(
            result,
            DispatchResult::Success {
                text: "It's noon".to_string()
            }
        );
    }

    #[tokio::test]
    async fn dispatch_without_handler() {
        let d = CommandDispatcher::new(Box::new(RuleClassifier::new()), Duration::from_secs(5));

        let result = d.dispatch("what time is it").await;
        assert_eq!(result, DispatchResult::NoHandler);
        assert!(!result.spoken_text().is_empty());
    }

    #[tokio::test]
    async fn dispatch_falls_back() {
        let mut d = CommandDispatcher::new(Box::new(RuleClassifier::new()), Duration::from_secs(5));
        d.set_fallback(Arc::new(StaticHandler("fallback answer")));

        let result = d.dispatch("tell me a joke").await;
        assert!(result.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_times_out_slow_handler() {
        let mut d =
            CommandDispatcher::new(Box::new(RuleClassifier::new()), Duration::from_millis(100));
        d.register(Intent::Time, Arc::new(SlowHandler));

        let result = d.dispatch("what time is it").await;
        assert_eq!(result, DispatchResult::HandlerTimeout);
        assert!(result.spoken_text().contains("too long"));
    }

    #[tokio::test]
    async fn dispatch_maps_handler_errors() {
        let mut d = CommandDispatcher::new(Box::new(RuleClassifier::new()), Duration::from_secs(5));
        d.register(Intent::Time, Arc::new(FailingHandler));

        let result = d.dispatch("what time is it").await;
        assert!(matches!(result, DispatchResult::HandlerError(_)));
        assert!(result.spoken_text().contains("Sorry"));
    }
}
