//! Pipeline orchestration
//!
//! Wires capture, segmentation, activation, dispatch, and playback into a
//! running assistant. Ownership is single-writer throughout: the frame
//! loop owns the detector, the utterance worker owns the activation
//! machine, and the playback worker owns the synthesizer and player. The
//! stages communicate only through bounded queues and the playback
//! handle's atomic cancel flag.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, mpsc};

use crate::activation::{ActivationMachine, Decision};
use crate::audio::{AudioFrame, AudioSource, PlaybackHandle, SpeechPlayer, Utterance};
use crate::config::{Config, SttProviderKind, TtsProviderKind};
use crate::dispatch::{
    AppLaunchHandler, CommandDispatcher, GenericHandler, Intent, RuleClassifier, TimeHandler,
};
use crate::stt::{SpeechToText, TranscriptEvent, Transcriber};
use crate::tts::TextToSpeech;
use crate::vad::VoiceActivityDetector;
use crate::{Error, Result, samples_to_wav};

/// Capture frame queue depth (64 x 100ms = 6.4s of buffering)
const FRAME_QUEUE_DEPTH: usize = 64;

/// Pending utterance queue depth; older entries are dropped first
const UTTERANCE_QUEUE_DEPTH: usize = 2;

/// Playback request queue depth
const PLAYBACK_QUEUE_DEPTH: usize = 1;

/// Bounded utterance queue with drop-oldest overflow
///
/// When transcription falls behind, stale utterances are worth less than
/// fresh ones, so the oldest pending entry is evicted.
struct UtteranceQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

struct QueueInner {
    items: VecDeque<Utterance>,
    closed: bool,
}

impl UtteranceQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    async fn push(&self, utterance: Utterance) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        if inner.items.len() >= self.capacity {
            inner.items.pop_front();
            tracing::warn!("transcription backlog, dropping oldest utterance");
        }
        inner.items.push_back(utterance);
        drop(inner);
        self.notify.notify_one();
    }

    /// Wait for the next utterance; `None` once closed and drained
    async fn pop(&self) -> Option<Utterance> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(utterance) = inner.items.pop_front() {
                    return Some(utterance);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.notify.notify_waiters();
    }
}

/// The always-listening assistant loop
pub struct Pipeline {
    config: Config,
    transcriber: Arc<dyn Transcriber>,
    dispatcher: Arc<CommandDispatcher>,
    tts: TextToSpeech,
}

impl Pipeline {
    /// Assemble a pipeline from explicit components
    #[must_use]
    pub fn new(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        dispatcher: Arc<CommandDispatcher>,
        tts: TextToSpeech,
    ) -> Self {
        Self {
            config,
            transcriber,
            dispatcher,
            tts,
        }
    }

    /// Build transcriber, synthesizer, and the default handler set from
    /// configuration
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing
    pub fn from_config(config: Config) -> Result<Self> {
        let transcriber: Arc<dyn Transcriber> = match config.stt.provider {
            SttProviderKind::Whisper => Arc::new(SpeechToText::new_whisper(
                config.api_keys.openai.clone().unwrap_or_default(),
                config.stt.model.clone(),
            )?),
            SttProviderKind::Deepgram => Arc::new(SpeechToText::new_deepgram(
                config.api_keys.deepgram.clone().unwrap_or_default(),
                config.stt.model.clone(),
            )?),
        };

        let tts = match config.tts.provider {
            TtsProviderKind::OpenAI => TextToSpeech::new_openai(
                config.api_keys.openai.clone().unwrap_or_default(),
                config.tts.voice.clone(),
                config.tts.speed,
                config.tts.model.clone(),
            )?,
            TtsProviderKind::ElevenLabs => TextToSpeech::new_elevenlabs(
                config.api_keys.elevenlabs.clone().unwrap_or_default(),
                config.tts.voice.clone(),
                config.tts.model.clone(),
            )?,
        };

        let mut dispatcher = CommandDispatcher::new(
            Box::new(RuleClassifier::new()),
            config.dispatch.handler_timeout,
        );
        dispatcher.register(Intent::Time, Arc::new(TimeHandler::new()));
        dispatcher.register(
            Intent::AppLaunch,
            Arc::new(AppLaunchHandler::new(config.applications.clone())),
        );
        dispatcher.set_fallback(Arc::new(GenericHandler::new(
            config.responses.fallback.clone(),
        )));

        Ok(Self {
            config,
            transcriber,
            dispatcher: Arc::new(dispatcher),
            tts,
        })
    }

    /// Run the assistant until an exit phrase, ctrl-c, or a device failure
    ///
    /// The capture stream is owned by this future and must stay on the
    /// calling task, so the frame loop runs inline while the utterance and
    /// playback workers are spawned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the audio device fails; all other
    /// failures are absorbed into spoken fallbacks or skipped turns
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let (frames_tx, frames_rx) = mpsc::channel::<AudioFrame>(FRAME_QUEUE_DEPTH);
        let (fault_tx, fault_rx) = mpsc::channel::<String>(1);
        let (playback_tx, playback_rx) = mpsc::channel::<String>(PLAYBACK_QUEUE_DEPTH);

        let queue = Arc::new(UtteranceQueue::new(UTTERANCE_QUEUE_DEPTH));

        let player = SpeechPlayer::new()?;
        let playback_handle = player.handle();

        let mut source = AudioSource::open(self.config.audio.sample_rate, self.config.audio.frame_size)?;
        source.start(frames_tx, fault_tx)?;

        tracing::info!(
            wake_words = ?self.config.wake.words,
            sample_rate = self.config.audio.sample_rate,
            "listening"
        );

        let activation = ActivationMachine::new(
            self.config.wake.words.clone(),
            self.config.wake.exit_phrases.clone(),
            self.config.wake.activation_timeout,
        );

        let mut utterance_task = tokio::spawn(run_utterance_worker(
            Arc::clone(&queue),
            activation,
            Arc::clone(&self.transcriber),
            Arc::clone(&self.dispatcher),
            playback_tx,
            self.config.clone(),
        ));

        let mut playback_task = tokio::spawn(run_playback_worker(playback_rx, self.tts, player));

        let vad = VoiceActivityDetector::new(
            self.config.vad.onset_threshold,
            self.config.vad.silence_frames_to_end,
            self.config.vad.min_speech_frames,
            self.config.vad.max_utterance_frames,
        );

        let result = tokio::select! {
            r = run_frame_loop(frames_rx, fault_rx, vad, &queue, &playback_handle) => r,
            r = &mut utterance_task => {
                if let Err(e) = r {
                    tracing::error!(error = %e, "utterance worker failed");
                }
                Ok(())
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                Ok(())
            }
        };

        // Orderly drain: stop the mic, let the workers finish the goodbye.
        // On a fatal capture error the reply mid-play is stale; cut it off
        // instead of gating shutdown on it finishing.
        source.stop();
        cancel_playback_on_fatal(&result, &playback_handle);
        queue.close().await;

        let drain = async {
            if !utterance_task.is_finished() {
                let _ = (&mut utterance_task).await;
            }
            let _ = (&mut playback_task).await;
        };
        if tokio::time::timeout(Duration::from_secs(10), drain)
            .await
            .is_err()
        {
            tracing::warn!("workers did not drain in time, aborting");
            utterance_task.abort();
            playback_task.abort();
        }

        tracing::info!("pipeline stopped");
        result
    }
}

/// Cancel any in-flight reply when the pipeline is going down with an error
fn cancel_playback_on_fatal(result: &Result<()>, playback: &PlaybackHandle) {
    if result.is_err() {
        playback.cancel();
    }
}

/// Consume captured frames, feeding the detector and the barge-in check
///
/// While a reply is playing the detector is suppressed so the assistant
/// does not transcribe itself; a speech onset during playback cancels the
/// reply and starts collecting the interrupting utterance.
async fn run_frame_loop(
    mut frames_rx: mpsc::Receiver<AudioFrame>,
    mut fault_rx: mpsc::Receiver<String>,
    mut vad: VoiceActivityDetector,
    queue: &UtteranceQueue,
    playback: &PlaybackHandle,
) -> Result<()> {
    loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!("frame channel closed");
                    return Ok(());
                };

                if playback.is_playing() {
                    if vad.is_onset(&frame) {
                        tracing::info!(seq = frame.seq, "barge-in, cancelling playback");
                        playback.cancel();
                    } else {
                        continue;
                    }
                }

                if let Some(utterance) = vad.push(&frame) {
                    tracing::debug!(
                        frames = utterance.frames,
                        first_seq = utterance.first_seq,
                        "utterance segmented"
                    );
                    queue.push(utterance).await;
                }
            }
            fault = fault_rx.recv() => {
                let message = fault.unwrap_or_else(|| "capture fault channel closed".to_string());
                return Err(Error::Device(message));
            }
        }
    }
}

/// Transcribe queued utterances and act on the activation decision
///
/// STT failures and timeouts are recoverable misses: the turn is dropped
/// and the loop continues. Returns after an exit phrase or once the queue
/// closes.
async fn run_utterance_worker(
    queue: Arc<UtteranceQueue>,
    mut activation: ActivationMachine,
    transcriber: Arc<dyn Transcriber>,
    dispatcher: Arc<CommandDispatcher>,
    playback_tx: mpsc::Sender<String>,
    config: Config,
) {
    let mut expiry = tokio::time::interval(Duration::from_secs(1));

    loop {
        let utterance = tokio::select! {
            utterance = queue.pop() => match utterance {
                Some(utterance) => utterance,
                None => return,
            },
            // Expire the session window even when nothing is heard
            _ = expiry.tick() => {
                activation.tick(Instant::now());
                continue;
            }
        };

        let duration = utterance.duration_secs(config.audio.sample_rate);
        tracing::debug!(duration_secs = duration, "transcribing utterance");

        let wav = match samples_to_wav(&utterance.samples, config.audio.sample_rate) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode utterance");
                continue;
            }
        };

        let text = match tokio::time::timeout(config.stt.timeout, transcriber.transcribe(&wav))
            .await
        {
            Err(_) => {
                tracing::warn!(timeout = ?config.stt.timeout, "transcription timed out");
                continue;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "transcription failed");
                continue;
            }
            Ok(Ok(text)) => text,
        };

        let Some(event) = TranscriptEvent::from_text(&text, None) else {
            tracing::debug!("empty transcript, skipping");
            continue;
        };

        tracing::info!(transcript = %event.text, "heard");

        match activation.handle(&event.text, Instant::now()) {
            Decision::Ignore => {}
            Decision::Acknowledge => {
                if playback_tx
                    .send(config.responses.acknowledgement.clone())
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Decision::Dispatch(command) => {
                let result = dispatcher.dispatch(&command).await;
                if playback_tx
                    .send(result.spoken_text().to_string())
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Decision::Exit => {
                tracing::info!("exit requested");
                let _ = playback_tx.send(config.responses.goodbye.clone()).await;
                return;
            }
        }
    }
}

/// Synthesize and play queued replies
///
/// Synthesis failure skips the reply rather than killing the loop; the
/// user just hears nothing for that turn.
async fn run_playback_worker(
    mut playback_rx: mpsc::Receiver<String>,
    tts: TextToSpeech,
    player: SpeechPlayer,
) {
    while let Some(text) = playback_rx.recv().await {
        tracing::debug!(text = %text, "synthesizing reply");

        let mp3 = match tts.synthesize(&text).await {
            Ok(mp3) => mp3,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, skipping reply");
                continue;
            }
        };

        if let Err(e) = player.play_mp3(mp3).await {
            tracing::warn!(error = %e, "playback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(first_seq: u64) -> Utterance {
        Utterance {
            samples: vec![0; 1_600],
            frames: 1,
            first_seq,
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn queue_delivers_in_order() {
        let q = UtteranceQueue::new(2);
        q.push(utterance(1)).await;
        q.push(utterance(2)).await;

        assert_eq!(q.pop().await.unwrap().first_seq, 1);
        assert_eq!(q.pop().await.unwrap().first_seq, 2);
    }

    #[tokio::test]
    async fn queue_drops_oldest_on_overflow() {
        let q = UtteranceQueue::new(2);
        q.push(utterance(1)).await;
        q.push(utterance(2)).await;
        q.push(utterance(3)).await;

        assert_eq!(q.pop().await.unwrap().first_seq, 2);
        assert_eq!(q.pop().await.unwrap().first_seq, 3);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let q = UtteranceQueue::new(2);
        q.push(utterance(1)).await;
        q.close().await;

        assert!(q.pop().await.is_some());
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn closed_queue_rejects_pushes() {
        let q = UtteranceQueue::new(2);
        q.close().await;
        q.push(utterance(1)).await;

        assert!(q.pop().await.is_none());
    }

    fn frame(seq: u64, amplitude: i16) -> AudioFrame {
        AudioFrame {
            samples: vec![amplitude; 1_600],
            seq,
            captured_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn barge_in_cancels_playback_and_collects_utterance() {
        let (frames_tx, frames_rx) = mpsc::channel(64);
        let (_fault_tx, fault_rx) = mpsc::channel(1);
        let queue = Arc::new(UtteranceQueue::new(2));

        let handle = PlaybackHandle::default();
        handle.set_playing(true);

        let vad = VoiceActivityDetector::new(0.03, 2, 1, 100);
        let loop_queue = Arc::clone(&queue);
        let loop_handle = handle.clone();
        let loop_task = tokio::spawn(async move {
            run_frame_loop(frames_rx, fault_rx, vad, &loop_queue, &loop_handle).await
        });

        // Speech onset while a reply is playing cancels the reply
        frames_tx.send(frame(0, 16_000)).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !handle.was_cancelled() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cancel never observed");

        // Playback winds down; the interrupting speech still becomes an
        // utterance starting at the barge-in frame
        handle.set_playing(false);
        frames_tx.send(frame(1, 16_000)).await.unwrap();
        frames_tx.send(frame(2, 0)).await.unwrap();
        frames_tx.send(frame(3, 0)).await.unwrap();

        let utt = tokio::time::timeout(std::time::Duration::from_secs(1), queue.pop())
            .await
            .expect("no utterance emitted")
            .unwrap();
        assert_eq!(utt.first_seq, 0);

        drop(frames_tx);
        assert!(loop_task.await.unwrap().is_ok());
    }

    #[test]
    fn fatal_shutdown_cancels_active_playback() {
        let handle = PlaybackHandle::default();
        handle.set_playing(true);

        cancel_playback_on_fatal(&Err(Error::Device("gone".to_string())), &handle);
        assert!(handle.was_cancelled());
    }

    #[test]
    fn clean_shutdown_leaves_playback_alone() {
        let handle = PlaybackHandle::default();
        handle.set_playing(true);

        cancel_playback_on_fatal(&Ok(()), &handle);
        assert!(!handle.was_cancelled());
    }

    #[tokio::test]
    async fn device_fault_is_terminal() {
        let (_frames_tx, frames_rx) = mpsc::channel::<AudioFrame>(64);
        let (fault_tx, fault_rx) = mpsc::channel(1);
        let queue = UtteranceQueue::new(2);
        let handle = PlaybackHandle::default();
        let vad = VoiceActivityDetector::new(0.03, 2, 1, 100);

        fault_tx.send("device disconnected".to_string()).await.unwrap();

        let result = run_frame_loop(frames_rx, fault_rx, vad, &queue, &handle).await;
        assert!(matches!(result, Err(Error::Device(_))));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let q = Arc::new(UtteranceQueue::new(2));
        let q2 = Arc::clone(&q);

        let waiter = tokio::spawn(async move { q2.pop().await });
        tokio::task::yield_now().await;
        q.push(utterance(7)).await;

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.first_seq, 7);
    }
}
