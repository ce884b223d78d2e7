//! Sentence-level speech/reveal coupling for one utterance.
//!
//! ## Design
//! - An utterance is split into sentence segments; each segment is revealed
//!   on screen while its synthesized audio plays, and the next segment only
//!   starts after both the reveal's `Done` signal and playback completion.
//! - Stepping is done-signal driven, not time-driven: `speak` first resets
//!   the reveal to empty and waits for that reset's `Done` frame before the
//!   first real segment, so the reset can never race the segment.
//! - Audio is an external collaborator behind the [`AudioSink`] seam; its
//!   `play` future resolves at playback end and aborts on drop, so dropping
//!   the `speak` future cancels in-flight playback and any pending settling
//!   timer in one motion.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::PanelflowError;
use crate::reveal::{RevealDriver, RevealFrame};

/// Characters that terminate a sentence segment. The terminator stays with
/// the preceding segment.
const SENTENCE_TERMINATORS: &[char] = &['。', '．', '！', '？', '!', '?', '.'];

/// Split an utterance into sentence segments on sentence-final punctuation,
/// retaining the punctuation with the preceding segment. A trailing fragment
/// without a terminator becomes its own segment; whitespace-only tails are
/// dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if SENTENCE_TERMINATORS.contains(&ch) {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        segments.push(current);
    }
    segments
}

// ---------------------------------------------------------------------------
// Audio seam
// ---------------------------------------------------------------------------

/// External synthesized-speech playback.
///
/// `play` begins playback of one sentence segment and resolves when playback
/// ends. Implementations must abort playback when the future is dropped.
pub trait AudioSink: Send + Sync {
    fn play(
        &self,
        segment: &str,
        pitch: f64,
        voice_id: u32,
    ) -> BoxFuture<'static, Result<(), PanelflowError>>;
}

/// Sink that completes immediately without producing sound. Used by surfaces
/// that pace on reveal alone.
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(
        &self,
        _segment: &str,
        _pitch: f64,
        _voice_id: u32,
    ) -> BoxFuture<'static, Result<(), PanelflowError>> {
        Box::pin(async { Ok(()) })
    }
}

// ---------------------------------------------------------------------------
// Cursor + events
// ---------------------------------------------------------------------------

/// Ephemeral per-utterance reveal position. Owned exclusively by the
/// synchronizer; reset when a new utterance begins.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealCursor {
    pub segments: Vec<String>,
    /// Index of the segment currently playing; -1 before the first.
    pub index: isize,
    pub speaking: bool,
}

impl Default for RevealCursor {
    fn default() -> Self {
        RevealCursor {
            segments: Vec::new(),
            index: -1,
            speaking: false,
        }
    }
}

/// What the presentation surface receives while an utterance plays out.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// A rendered reveal frame ready for display.
    Frame(RevealFrame),
    /// All segments revealed and played; the advance affordance may be
    /// re-enabled.
    UtteranceComplete,
}

// ---------------------------------------------------------------------------
// SpeechSynchronizer
// ---------------------------------------------------------------------------

/// Couples sentence-level audio playback to reveal progression for a single
/// utterance at a time.
pub struct SpeechSynchronizer {
    reveal: RevealDriver,
    frames_rx: mpsc::UnboundedReceiver<RevealFrame>,
    events_tx: mpsc::UnboundedSender<SpeechEvent>,
    sink: Arc<dyn AudioSink>,
    settle: Duration,
    cursor: RevealCursor,
}

impl SpeechSynchronizer {
    /// Build a synchronizer revealing at `cadence` with `settle` between a
    /// segment's audio tail and the next segment. Returns the event receiver
    /// for the presentation surface.
    pub fn new(
        cadence: Duration,
        settle: Duration,
        sink: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (reveal, frames_rx) = RevealDriver::new(cadence);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            SpeechSynchronizer {
                reveal,
                frames_rx,
                events_tx,
                sink,
                settle,
                cursor: RevealCursor::default(),
            },
            events_rx,
        )
    }

    pub fn cursor(&self) -> &RevealCursor {
        &self.cursor
    }

    pub fn is_speaking(&self) -> bool {
        self.cursor.speaking
    }

    /// Present one full utterance: segment, reveal, and play in lockstep.
    ///
    /// Resolves after the last segment's reveal and playback both complete
    /// and the `UtteranceComplete` event has been emitted. Dropping the
    /// returned future cancels the pending settling timer and aborts
    /// in-flight playback. An empty utterance short-circuits straight to
    /// `UtteranceComplete` without issuing any audio.
    pub async fn speak(
        &mut self,
        utterance: &str,
        pitch: f64,
        voice_id: u32,
    ) -> Result<(), PanelflowError> {
        self.cursor = RevealCursor {
            segments: split_sentences(utterance),
            index: -1,
            speaking: true,
        };

        // Frames from an interrupted previous utterance are stale; the newest
        // utterance is authoritative. Cancel the old tick task before
        // draining so nothing can slip in behind the drain.
        self.reveal.cancel();
        while self.frames_rx.try_recv().is_ok() {}

        // Reset the display. The reset's Done frame, not a timer, gates the
        // first real segment.
        self.reveal.set_target("");
        self.wait_done().await;

        if self.cursor.segments.is_empty() {
            self.cursor.speaking = false;
            let _ = self.events_tx.send(SpeechEvent::UtteranceComplete);
            return Ok(());
        }

        let segments = self.cursor.segments.clone();
        for (idx, segment) in segments.iter().enumerate() {
            self.cursor.index = idx as isize;
            // Settle so the prior segment's audio tail cannot overlap.
            tokio::time::sleep(self.settle).await;
            self.reveal.set_target(segment);
            let done_seen = self.play_while_streaming(segment, pitch, voice_id).await?;
            if !done_seen {
                self.wait_done().await;
            }
        }

        self.cursor.speaking = false;
        let _ = self.events_tx.send(SpeechEvent::UtteranceComplete);
        Ok(())
    }

    /// Await playback completion while forwarding reveal frames as they
    /// arrive, so display never stalls behind audio. Returns whether the
    /// current target's Done frame was already forwarded.
    async fn play_while_streaming(
        &mut self,
        segment: &str,
        pitch: f64,
        voice_id: u32,
    ) -> Result<bool, PanelflowError> {
        let play = self.sink.play(segment, pitch, voice_id);
        tokio::pin!(play);
        let mut done_seen = false;
        loop {
            tokio::select! {
                res = &mut play => {
                    res?;
                    return Ok(done_seen);
                }
                maybe_frame = self.frames_rx.recv() => {
                    if let Some(frame) = maybe_frame {
                        done_seen |= frame.done;
                        let _ = self.events_tx.send(SpeechEvent::Frame(frame));
                    }
                }
            }
        }
    }

    /// Forward frames until the current target's Done frame passes through.
    async fn wait_done(&mut self) {
        while let Some(frame) = self.frames_rx.recv().await {
            let done = frame.done;
            let _ = self.events_tx.send(SpeechEvent::Frame(frame));
            if done {
                return;
            }
        }
    }
}
