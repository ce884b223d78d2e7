//! Character-paced reveal of a single block of text.
//!
//! ## Design
//! - `RevealEngine` is the pure core: a lazy, restartable sequence of prefixes
//!   of the target string, advanced one Unicode scalar at a time by `tick`.
//!   No timers, no networking — fully deterministic and unit-testable.
//! - `RevealDriver` couples the engine to a tokio interval and streams
//!   rendered frames to the consumer. The tick task is an owned handle,
//!   aborted on every retarget and on drop — never left as ambient state.
//! - Partial markup is repaired at each step so the rendered fragment is
//!   always well-formed even though the underlying string is revealed
//!   scalar-by-scalar.

use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Elements that never take a closing tag; repair must not synthesize one.
static VOID_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
        "meta", "source", "track", "wbr",
    ]
    .into_iter()
    .collect()
});

// ---------------------------------------------------------------------------
// Markup repair
// ---------------------------------------------------------------------------

/// Repair a partially revealed markup fragment for rendering.
///
/// Two defects can appear mid-reveal:
/// - a dangling unterminated start marker (`<` with no `>` yet) — stripped
///   from the rendered output;
/// - an opened element whose closing tag has not been revealed — a synthetic
///   closing tag is appended to the rendered output.
///
/// The underlying reveal state is untouched; only the rendered string is
/// adjusted.
pub fn repair_markup(fragment: &str) -> String {
    // Strip a trailing `<...` that has not reached its `>`.
    let visible = match fragment.rfind('<') {
        Some(idx) if !fragment[idx..].contains('>') => &fragment[..idx],
        _ => fragment,
    };

    // Track still-open elements in document order.
    let mut open: Vec<&str> = Vec::new();
    let mut rest = visible;
    while let Some(start) = rest.find('<') {
        let tag_body = &rest[start + 1..];
        let Some(end) = tag_body.find('>') else { break };
        let inner = tag_body[..end].trim();
        rest = &tag_body[end + 1..];
        if inner.is_empty() || inner.ends_with('/') || inner.starts_with('!') {
            continue; // `<>`, self-closing, comments/doctype
        }
        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim();
            if let Some(pos) = open.iter().rposition(|t| *t == name) {
                open.remove(pos);
            }
        } else {
            let name = inner
                .split(|c: char| c.is_whitespace())
                .next()
                .unwrap_or(inner);
            if !VOID_TAGS.contains(name) {
                open.push(name);
            }
        }
    }

    let mut out = String::with_capacity(visible.len() + open.len() * 8);
    out.push_str(visible);
    for name in open.iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}

// ---------------------------------------------------------------------------
// RevealEngine — pure prefix sequence
// ---------------------------------------------------------------------------

/// Result of advancing the reveal by one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealTick {
    /// The prefix advanced by one scalar; more remains.
    Advanced,
    /// The full target is now revealed. Emitted exactly once per target.
    Done,
    /// The target was already fully revealed; nothing to do.
    Idle,
}

/// Drives a character-paced reveal of a single block of text.
///
/// Knows nothing about timers or the network; callers tick it.
#[derive(Debug, Default)]
pub struct RevealEngine {
    target: Vec<char>,
    shown: usize,
    done_emitted: bool,
}

impl RevealEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the reveal with a new complete string, from empty.
    ///
    /// Returns `true` when the target is trivially fully revealed (empty
    /// string) — the `Done` signal fires synchronously in that case and no
    /// ticking is required.
    pub fn set_target(&mut self, text: &str) -> bool {
        self.target = text.chars().collect();
        self.shown = 0;
        if self.target.is_empty() {
            self.done_emitted = true;
            true
        } else {
            self.done_emitted = false;
            false
        }
    }

    /// Advance one Unicode scalar (never a raw byte).
    pub fn tick(&mut self) -> RevealTick {
        if self.done_emitted {
            return RevealTick::Idle;
        }
        self.shown += 1;
        if self.shown >= self.target.len() {
            self.shown = self.target.len();
            self.done_emitted = true;
            RevealTick::Done
        } else {
            RevealTick::Advanced
        }
    }

    /// The current prefix with markup repaired for display.
    pub fn rendered(&self) -> String {
        let prefix: String = self.target[..self.shown].iter().collect();
        repair_markup(&prefix)
    }

    /// The raw (unrepaired) current prefix.
    pub fn raw_prefix(&self) -> String {
        self.target[..self.shown].iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.done_emitted
    }
}

// ---------------------------------------------------------------------------
// RevealDriver — timed frames
// ---------------------------------------------------------------------------

/// One rendered frame of a paced reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    /// Markup-repaired prefix ready for display.
    pub text: String,
    /// Set on exactly the last frame of each target.
    pub done: bool,
}

/// Paces a [`RevealEngine`] on a tokio interval and streams frames out.
///
/// `set_target` cancels the previous tick task before starting a new one, so
/// at most one timer exists per driver instance; drop aborts it.
pub struct RevealDriver {
    cadence: Duration,
    tx: mpsc::UnboundedSender<RevealFrame>,
    task: Option<JoinHandle<()>>,
}

impl RevealDriver {
    /// Create a driver ticking every `cadence`, returning the frame receiver.
    pub fn new(cadence: Duration) -> (Self, mpsc::UnboundedReceiver<RevealFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            RevealDriver {
                cadence,
                tx,
                task: None,
            },
            rx,
        )
    }

    /// Abort the current tick task, if any, without emitting a frame.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Restart the reveal with a new complete string.
    ///
    /// An empty target resets to empty immediately and emits its `Done` frame
    /// synchronously — an empty string is trivially fully revealed.
    pub fn set_target(&mut self, text: &str) {
        self.cancel();
        let mut engine = RevealEngine::new();
        if engine.set_target(text) {
            let _ = self.tx.send(RevealFrame {
                text: String::new(),
                done: true,
            });
            return;
        }
        let tx = self.tx.clone();
        let cadence = self.cadence;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; consume it so the
            // first scalar appears one cadence after retargeting.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.tick() {
                    RevealTick::Advanced => {
                        if tx
                            .send(RevealFrame {
                                text: engine.rendered(),
                                done: false,
                            })
                            .is_err()
                        {
                            break; // consumer gone
                        }
                    }
                    RevealTick::Done => {
                        let _ = tx.send(RevealFrame {
                            text: engine.rendered(),
                            done: true,
                        });
                        break;
                    }
                    RevealTick::Idle => break,
                }
            }
        }));
    }
}

impl Drop for RevealDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}
