//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use chime_engine::decode::decode_bytes;
use chime_engine::{AssetStore, AudioOutput, DecodedBuffer, Error, MemoryAssetStore, PlayRequest, PlaybackBackend, Result, Voice};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// 16-bit mono WAV; 28 frames make a 100-byte file.
pub fn wav_fixture(frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut w = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for i in 0..frames {
            w.write_sample((i as i16) * 100).unwrap();
        }
        w.finalize().unwrap();
    }
    bytes
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartedVoice {
    pub volume: f32,
    pub detune: f32,
    pub rate: f32,
    pub frames: usize,
}

/// Records every call; keeps started voices alive until `finish_all`.
#[derive(Default)]
pub struct RecordingOutput {
    pub decodes: AtomicUsize,
    pub started: Mutex<Vec<StartedVoice>>,
    live: Mutex<Vec<Voice>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn decode_calls(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<StartedVoice> {
        self.started.lock().clone()
    }

    /// Simulate every live voice reaching its end.
    pub fn finish_all(&self) {
        self.live.lock().clear();
    }
}

impl AudioOutput for RecordingOutput {
    fn sample_rate(&self) -> u32 {
        48_000
    }
    fn channels(&self) -> u16 {
        2
    }
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBuffer> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        decode_bytes(bytes)
    }
    fn start(&self, voice: Voice) -> Result<()> {
        self.started.lock().push(StartedVoice {
            volume: voice.volume(),
            detune: voice.detune(),
            rate: voice.playback_rate(),
            frames: voice.buffer().frames(),
        });
        self.live.lock().push(voice);
        Ok(())
    }
}

/// Memory assets that count lookups.
#[derive(Default)]
pub struct CountingAssets {
    pub inner: MemoryAssetStore,
    pub lookups: AtomicUsize,
}

impl CountingAssets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AssetStore for CountingAssets {
    fn file_buffer(&self, file_id: &str) -> Option<Vec<u8>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.file_buffer(file_id)
    }
}

/// Backend whose calls complete only when the test says so.
pub struct GatedBackend {
    calls: mpsc::UnboundedSender<(PlayRequest, oneshot::Sender<Result<()>>)>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

pub type CallRx = mpsc::UnboundedReceiver<(PlayRequest, oneshot::Sender<Result<()>>)>;

impl GatedBackend {
    pub fn new() -> (Arc<Self>, CallRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            calls: tx,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        (backend, rx)
    }
}

impl PlaybackBackend for GatedBackend {
    fn play(&self, request: PlayRequest) -> BoxFuture<'_, Result<()>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let (done_tx, done_rx) = oneshot::channel();
        let _ = self.calls.send((request, done_tx));
        Box::pin(async move {
            let res = done_rx.await.unwrap_or(Ok(()));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            res
        })
    }
}

/// Backend that settles immediately, recording requests. Payloads listed in
/// `fail_on` are rejected; payloads in `panic_on` panic inside the call.
#[derive(Default)]
pub struct RecordingBackend {
    pub requests: Mutex<Vec<PlayRequest>>,
    pub fail_on: Mutex<Vec<Vec<u8>>>,
    pub panic_on: Mutex<Vec<Vec<u8>>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.requests.lock().iter().map(|r| r.data.clone()).collect()
    }
}

impl PlaybackBackend for RecordingBackend {
    fn play(&self, request: PlayRequest) -> BoxFuture<'_, Result<()>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let fail = self.fail_on.lock().contains(&request.data);
        let crash = self.panic_on.lock().contains(&request.data);
        self.requests.lock().push(request);
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if crash {
                panic!("backend crashed mid-clip");
            }
            if fail {
                Err(Error::Backend("device unplugged".into()))
            } else {
                Ok(())
            }
        })
    }
}
