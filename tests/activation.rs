//! Wake-word session scenario tests

use std::time::{Duration, Instant};

use vesper::{ActivationMachine, ActivationState, Decision};

fn machine() -> ActivationMachine {
    ActivationMachine::new(
        vec![
            "nina".to_string(),
            "nena".to_string(),
            "mina".to_string(),
            "lina".to_string(),
        ],
        vec![
            "goodbye".to_string(),
            "bye".to_string(),
            "stop".to_string(),
            "exit".to_string(),
            "quit".to_string(),
        ],
        Duration::from_secs(8),
    )
}

#[test]
fn wake_then_command_then_expiry() {
    let mut m = machine();
    let t0 = Instant::now();

    // Bare wake word: acknowledge and open the session
    assert_eq!(m.handle("Nina", t0), Decision::Acknowledge);
    assert_eq!(m.state(), ActivationState::Active);

    // Command inside the window dispatches without a wake word
    assert_eq!(
        m.handle("what time is it", t0 + Duration::from_secs(3)),
        Decision::Dispatch("what time is it".to_string())
    );

    // Long silence; next transcript misses the window and is ignored
    assert_eq!(
        m.handle("open the calculator", t0 + Duration::from_secs(30)),
        Decision::Ignore
    );
    assert_eq!(m.state(), ActivationState::Idle);
}

#[test]
fn single_breath_wake_and_command() {
    let mut m = machine();

    assert_eq!(
        m.handle("Hey Nina, what's the weather today?", Instant::now()),
        Decision::Dispatch("what's the weather today?".to_string())
    );
    assert_eq!(m.state(), ActivationState::Active);
}

#[test]
fn unrelated_speech_never_activates() {
    let mut m = machine();
    let t0 = Instant::now();

    for (i, text) in [
        "so anyway I told him",
        "the meeting is at three",
        "could you pass the salt",
    ]
    .iter()
    .enumerate()
    {
        assert_eq!(
            m.handle(text, t0 + Duration::from_secs(i as u64)),
            Decision::Ignore
        );
        assert_eq!(m.state(), ActivationState::Idle);
    }
}

#[test]
fn consecutive_commands_keep_session_alive() {
    let mut m = machine();
    let t0 = Instant::now();

    m.handle("nina", t0);
    let mut t = t0;
    for text in ["first thing", "second thing", "third thing"] {
        t += Duration::from_secs(6);
        assert_eq!(m.handle(text, t), Decision::Dispatch(text.to_string()));
    }
    assert_eq!(m.state(), ActivationState::Active);
}

#[test]
fn goodbye_ends_the_session() {
    let mut m = machine();
    let t0 = Instant::now();

    m.handle("nina", t0);
    assert_eq!(
        m.handle("goodbye", t0 + Duration::from_secs(2)),
        Decision::Exit
    );
    assert_eq!(m.state(), ActivationState::Idle);

    // Post-exit speech is inert without a fresh wake word
    assert_eq!(
        m.handle("what time is it", t0 + Duration::from_secs(3)),
        Decision::Ignore
    );
}

#[test]
fn wake_word_with_exit_phrase_exits() {
    let mut m = machine();

    assert_eq!(m.handle("nina goodbye", Instant::now()), Decision::Exit);
    assert_eq!(m.state(), ActivationState::Idle);
}

#[test]
fn mis_transcribed_wake_word_still_wakes() {
    for heard in ["nena turn it up", "mina turn it up", "lina turn it up"] {
        let mut m = machine();
        assert_eq!(
            m.handle(heard, Instant::now()),
            Decision::Dispatch("turn it up".to_string()),
            "transcript '{heard}' did not wake"
        );
    }
}

#[test]
fn stopwatch_is_not_an_exit_phrase() {
    let mut m = machine();
    let t0 = Instant::now();

    m.handle("nina", t0);
    assert_eq!(
        m.handle("start the stopwatch", t0 + Duration::from_secs(1)),
        Decision::Dispatch("start the stopwatch".to_string())
    );
    assert_eq!(m.state(), ActivationState::Active);
}
