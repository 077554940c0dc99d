//! Audio playback of remote-generated narration via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, the stream and sink are confined to a dedicated
//! OS thread and every operation is routed through a command channel. The
//! public [`RodioSink`] is the `Send + Sync` proxy the orchestrator holds.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::cache::PlayableAudio;
use crate::error::NarrationError;

// ── Port ───────────────────────────────────────────────────────────

/// Abstraction over audible playback of a [`PlayableAudio`] handle.
///
/// # Object safety
/// All methods take `&self`, so the trait is object-safe and usable as
/// `Arc<dyn AudioSink>` inside the session. Interior mutability handles
/// state changes inside each implementation.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the audio to completion.
    ///
    /// Resolves `Ok(())` when the audio drains naturally *or* when playback
    /// is stopped externally — an interrupted playback is an expected,
    /// silent outcome. `Err` is reserved for decode/output failures, which
    /// the session answers with its one adapter-level fallback.
    async fn play(&self, audio: &PlayableAudio) -> Result<(), NarrationError>;

    /// Stop playback immediately. Idempotent; safe when nothing plays.
    fn stop(&self);

    /// Whether audio is currently audible.
    fn is_playing(&self) -> bool;
}

// ── Commands ───────────────────────────────────────────────────────

enum SinkCommand {
    /// Decode and play a byte payload.
    Play {
        bytes: Vec<u8>,
        /// Decode/output result, sent before audio starts.
        ack: oneshot::Sender<Result<(), NarrationError>>,
        /// Fires when the sink drains naturally. Dropped (never fired) when
        /// playback is stopped early — both resolve the caller.
        done: oneshot::Sender<()>,
    },

    /// Stop any active playback immediately (fire-and-forget).
    Stop,

    /// Shut down the audio thread, releasing the output stream.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated playback thread.
pub struct RodioSink {
    cmd_tx: mpsc::Sender<SinkCommand>,
    is_playing: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioSink {
    /// Spawn the playback thread and open the default output device.
    ///
    /// Errors from `OutputStream::try_default` are propagated back via a
    /// one-shot init channel.
    pub fn spawn() -> Result<Self, NarrationError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<SinkCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), NarrationError>>();
        let is_playing = Arc::new(AtomicBool::new(false));
        let playing_flag = Arc::clone(&is_playing);

        let thread = thread::Builder::new()
            .name("masal-playback".into())
            .spawn(move || run(&cmd_rx, &init_tx, &playing_flag))
            .map_err(|e| {
                NarrationError::OutputStream(format!("failed to spawn playback thread: {e}"))
            })?;

        // Wait for the playback thread to finish initialisation.
        init_rx.recv().map_err(|_| NarrationError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            is_playing,
            thread: Some(thread),
        })
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, audio: &PlayableAudio) -> Result<(), NarrationError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        self.cmd_tx
            .send(SinkCommand::Play {
                bytes: audio.to_vec(),
                ack: ack_tx,
                done: done_tx,
            })
            .map_err(|_| NarrationError::AudioThreadDied)?;

        ack_rx.await.map_err(|_| NarrationError::AudioThreadDied)??;

        // Resolves on natural drain; a dropped sender means playback was
        // stopped early, which is equally a completed call.
        let _ = done_rx.await;
        Ok(())
    }

    fn stop(&self) {
        let _ = self.cmd_tx.send(SinkCommand::Stop);
        self.is_playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        // Best-effort shutdown — the thread may already be dead.
        let _ = self.cmd_tx.send(SinkCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Playback thread event loop ─────────────────────────────────────

/// The body of the dedicated playback thread. Owns the `rodio` output
/// stream and current sink for their entire lifetime — they never cross
/// thread boundaries.
fn run(
    cmd_rx: &mpsc::Receiver<SinkCommand>,
    init_tx: &mpsc::Sender<Result<(), NarrationError>>,
    is_playing: &Arc<AtomicBool>,
) {
    let stream = match rodio::OutputStream::try_default() {
        Ok((stream, handle)) => (stream, handle),
        Err(e) => {
            let _ = init_tx.send(Err(NarrationError::OutputStream(e.to_string())));
            return;
        }
    };
    let (_stream, stream_handle) = stream;

    if init_tx.send(Ok(())).is_err() {
        // Caller dropped — nothing to do.
        return;
    }

    tracing::info!("Narration playback initialized on default output device");

    let mut current: Option<Arc<rodio::Sink>> = None;
    // Monotonic playback id. Watchers compare against it so a superseded
    // playback's watcher can neither clear the flag for its successor nor
    // report a natural finish it did not have.
    let current_seq = Arc::new(AtomicU64::new(0));

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            SinkCommand::Play { bytes, ack, done } => {
                // Stop whatever is still audible before starting the new line.
                if let Some(old) = current.take() {
                    old.stop();
                }
                is_playing.store(false, Ordering::SeqCst);

                let source = match rodio::Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = ack.send(Err(NarrationError::Decode(e.to_string())));
                        continue;
                    }
                };

                let sink = match rodio::Sink::try_new(&stream_handle) {
                    Ok(sink) => Arc::new(sink),
                    Err(e) => {
                        let _ = ack.send(Err(NarrationError::OutputStream(e.to_string())));
                        continue;
                    }
                };

                sink.append(source);
                let my_seq = current_seq.fetch_add(1, Ordering::SeqCst) + 1;
                is_playing.store(true, Ordering::SeqCst);
                current = Some(Arc::clone(&sink));
                let _ = ack.send(Ok(()));

                // Completion watcher: `sleep_until_end` blocks until the
                // queue drains or `stop()` drops the queued sources.
                let playing_flag = Arc::clone(is_playing);
                let seq = Arc::clone(&current_seq);
                thread::spawn(move || {
                    sink.sleep_until_end();

                    // If stop() was called first, the flag is already false
                    // and `done` is dropped unfired — the caller resolves
                    // either way. A watcher whose playback was superseded
                    // must not touch the successor's flag at all.
                    if finished_naturally(&seq, my_seq, &playing_flag) {
                        tracing::debug!("Narration playback finished naturally");
                        let _ = done.send(());
                    }
                });
            }

            SinkCommand::Stop => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
                is_playing.store(false, Ordering::SeqCst);
                tracing::debug!("Narration playback stopped");
            }

            SinkCommand::Shutdown => break,
        }
    }

    // The output stream is dropped here, on the playback thread.
    tracing::debug!("Playback thread shutting down");
}

/// Completion-watcher decision: a playback finished naturally only if it
/// is still the newest one *and* the flag was still set. Clears the flag
/// as a side effect in exactly that case.
fn finished_naturally(current_seq: &AtomicU64, my_seq: u64, is_playing: &AtomicBool) -> bool {
    current_seq.load(Ordering::SeqCst) == my_seq && is_playing.swap(false, Ordering::SeqCst)
}
