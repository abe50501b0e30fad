//! Voice clip sequencer.
//!
//! Clips are queued FIFO and handed to the playback backend strictly one at
//! a time. Enqueue appends under the lock and, if nothing is in flight,
//! spawns a single drain task that keeps popping until the queue is empty.
//! The in-flight flag is only ever read and written under the same lock as
//! the queue, so a clip enqueued while the drain task is finishing is either
//! seen by that task or starts a new one, never both.

use crate::backend::{PlayRequest, PlaybackBackend};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Playback parameters for a queued clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceClipOptions {
    pub device_name: String,
    pub volume: f32,
    pub rate: f32,
}

impl VoiceClipOptions {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self { device_name: device_name.into(), volume: 1.0, rate: 1.0 }
    }
}

struct PendingClip {
    payload: Vec<u8>,
    options: VoiceClipOptions,
}

impl PendingClip {
    fn into_request(self) -> PlayRequest {
        PlayRequest {
            device_name: self.options.device_name,
            data: self.payload,
            volume: Some(self.options.volume),
            rate: Some(self.options.rate),
            speed: 1.0,
        }
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PendingClip>,
    playing: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    backend: Arc<dyn PlaybackBackend>,
    idle: Notify,
}

/// Serializes voice clips onto a [`PlaybackBackend`].
#[derive(Clone)]
pub struct VoiceClipSequencer {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl VoiceClipSequencer {
    /// Drain tasks are spawned on `runtime`, so `enqueue` may be called from
    /// any thread.
    pub fn new(backend: Arc<dyn PlaybackBackend>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                backend,
                idle: Notify::new(),
            }),
            runtime,
        }
    }

    /// Append a clip and start draining if idle. Never blocks, never fails.
    pub fn enqueue(&self, payload: Vec<u8>, options: VoiceClipOptions) {
        let mut st = self.inner.state.lock();
        st.queue.push_back(PendingClip { payload, options });
        debug!(pending = st.queue.len(), playing = st.playing, "voice clip queued");
        drop(st);
        self.try_drain();
    }

    /// Claim the in-flight flag and spawn the drain task, unless a clip is
    /// already playing or there is nothing to play.
    pub(crate) fn try_drain(&self) {
        {
            let mut st = self.inner.state.lock();
            if st.playing || st.queue.is_empty() {
                return;
            }
            st.playing = true;
        }
        self.runtime.spawn(drain(self.inner.clone()));
    }

    /// Clips waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    /// Resolves once the queue is empty and no clip is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let st = self.inner.state.lock();
                if !st.playing && st.queue.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let clip = {
            let mut st = inner.state.lock();
            match st.queue.pop_front() {
                Some(clip) => clip,
                None => {
                    st.playing = false;
                    break;
                }
            }
        };

        let device = clip.options.device_name.clone();
        let req = clip.into_request();
        // Backend failures, panics included, end this clip only; the queue moves on.
        match AssertUnwindSafe(async { inner.backend.play(req).await }).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%device, "voice clip playback failed: {e}"),
            Err(_) => warn!(%device, "voice clip backend panicked"),
        }
    }
    debug!("voice clip queue drained");
    inner.idle.notify_waiters();
}
