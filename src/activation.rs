//! Wake-word activation state machine
//!
//! Decides whether a transcript is a wake trigger, an in-session command,
//! an exit request, or noise to discard. This is the only mutable shared
//! state in the pipeline; exactly one worker owns and writes it.

use std::time::{Duration, Instant};

/// Activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Waiting for a wake word
    Idle,
    /// In a session; transcripts are commands until the window times out
    Active,
}

/// What the pipeline should do with a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not addressed to us; discard silently
    Ignore,
    /// Wake word alone; speak a short acknowledgement and await a command
    Acknowledge,
    /// Dispatch this command text to a handler
    Dispatch(String),
    /// Exit phrase; end the listening session
    Exit,
}

/// Wake-word prefixes stripped along with the wake word itself
const WAKE_PREFIXES: &[&str] = &["hey", "hi", "hello", "ok"];

/// Minimum residual command length for immediate dispatch on wake
const MIN_COMMAND_CHARS: usize = 3;

/// Owns wake-word matching, the activation window, and exit phrases
pub struct ActivationMachine {
    wake_words: Vec<String>,
    exit_phrases: Vec<String>,
    timeout: Duration,
    state: ActivationState,
    last_activation: Option<Instant>,
}

impl ActivationMachine {
    /// Create a machine with the configured wake words and exit phrases
    ///
    /// Words are normalized to lowercase. The wake alias set (e.g. "nina",
    /// "nena", "mina", "lina") is tunable configuration, not logic.
    #[must_use]
    pub fn new(wake_words: Vec<String>, exit_phrases: Vec<String>, timeout: Duration) -> Self {
        let wake_words: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .collect();
        let exit_phrases: Vec<String> = exit_phrases
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .collect();

        tracing::debug!(?wake_words, ?exit_phrases, "activation machine initialized");

        Self {
            wake_words,
            exit_phrases,
            timeout,
            state: ActivationState::Idle,
            last_activation: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ActivationState {
        self.state
    }

    /// Expire the activation window if it has timed out
    ///
    /// The transition back to idle is silent (no spoken notice). Returns
    /// true if a transition occurred.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state == ActivationState::Active && self.timed_out(now) {
            self.state = ActivationState::Idle;
            tracing::info!("activation window expired, returning to idle");
            return true;
        }
        false
    }

    /// Classify a transcript and advance the state machine
    ///
    /// An event arriving after the window expired is re-evaluated as a
    /// fresh wake check. Exit takes precedence when a transcript matches
    /// both a wake word and an exit phrase.
    pub fn handle(&mut self, text: &str, now: Instant) -> Decision {
        self.tick(now);

        let lower = text.to_lowercase();

        match self.state {
            ActivationState::Idle => {
                if !self.contains_wake(&lower) {
                    return Decision::Ignore;
                }

                if self.contains_exit(&lower) {
                    tracing::info!(transcript = %text, "exit phrase with wake word");
                    return Decision::Exit;
                }

                let command = self.strip_wake(&lower);
                self.state = ActivationState::Active;
                self.last_activation = Some(now);
                tracing::info!(transcript = %text, "wake word detected, session active");

                if command.chars().count() >= MIN_COMMAND_CHARS {
                    Decision::Dispatch(command)
                } else {
                    Decision::Acknowledge
                }
            }
            ActivationState::Active => {
                if self.contains_exit(&lower) {
                    self.state = ActivationState::Idle;
                    tracing::info!("exit phrase, session ended");
                    return Decision::Exit;
                }

                self.last_activation = Some(now);
                Decision::Dispatch(self.strip_wake(&lower))
            }
        }
    }

    fn timed_out(&self, now: Instant) -> bool {
        self.last_activation
            .is_none_or(|last| now.duration_since(last) >= self.timeout)
    }

    /// Wake words match whole words only, so "mina" does not fire inside
    /// "terminal"
    fn contains_wake(&self, lower: &str) -> bool {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| self.wake_words.iter().any(|w| w == token))
    }

    /// Exit phrases match whole words only, so "stop" does not fire on
    /// "stopwatch"
    fn contains_exit(&self, lower: &str) -> bool {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| self.exit_phrases.iter().any(|p| p == token))
    }

    /// Remove the first wake word (with any greeting prefix) at word
    /// boundaries; text without a wake word passes through untouched
    fn strip_wake(&self, lower: &str) -> String {
        let tokens: Vec<&str> = lower.split_whitespace().collect();
        let bare = |token: &str| -> String {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        };

        let Some(pos) = tokens
            .iter()
            .position(|t| self.wake_words.iter().any(|w| *w == bare(t)))
        else {
            return lower.trim().to_string();
        };

        let start = if pos > 0 && WAKE_PREFIXES.contains(&bare(tokens[pos - 1]).as_str()) {
            pos - 1
        } else {
            pos
        };

        tokens[..start]
            .iter()
            .chain(&tokens[pos + 1..])
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
