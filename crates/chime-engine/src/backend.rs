use crate::config::OutputConfig;
use crate::decode::decode_bytes;
use crate::error::{Error, Result};
use crate::mixer::Mixer;
use crate::output::open_stream;
use crate::voice::Voice;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One request to render a buffer on a named device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub device_name: String,
    pub data: Vec<u8>,
    pub volume: Option<f32>,
    pub rate: Option<f32>,
    pub speed: f32,
}

/// Asynchronous device playback. The returned future settles when the
/// buffer has finished playing or the attempt failed.
pub trait PlaybackBackend: Send + Sync {
    fn play(&self, request: PlayRequest) -> BoxFuture<'_, Result<()>>;
}

/// Grace period on top of the clip's own duration before a stalled device
/// is reported as a failure.
const END_GRACE: Duration = Duration::from_secs(2);

/// Plays each request on its own short-lived cpal stream on the requested
/// device, from the blocking pool.
pub struct DeviceBackend {
    base: OutputConfig,
}

impl DeviceBackend {
    /// `base` supplies sample rate and block size; the device comes from
    /// each request.
    pub fn new(base: OutputConfig) -> Self {
        Self { base }
    }
}

impl PlaybackBackend for DeviceBackend {
    fn play(&self, request: PlayRequest) -> BoxFuture<'_, Result<()>> {
        let mut cfg = self.base.clone();
        cfg.device = Some(request.device_name.clone());
        cfg.device_index = None;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || play_blocking(&cfg, request))
                .await
                .map_err(|e| Error::Backend(format!("playback task failed: {e}")))?
        })
    }
}

fn play_blocking(cfg: &OutputConfig, request: PlayRequest) -> Result<()> {
    let rate = request.rate.unwrap_or(1.0) * request.speed;
    if !(rate > 0.0 && rate.is_finite()) {
        return Err(Error::Backend(format!("invalid playback rate {rate}")));
    }
    let buffer = Arc::new(decode_bytes(&request.data)?);
    let expected = buffer.duration().div_f64(rate as f64);

    let mixer = Arc::new(Mutex::new(Mixer::new()));
    let opened = open_stream(cfg, mixer.clone(), false)
        .map_err(|e| Error::Backend(format!("{}: {e:#}", request.device_name)))?;

    let (ended_tx, ended_rx) = mpsc::channel();
    let mut voice = Voice::new(
        buffer,
        opened.sample_rate,
        opened.channels,
        request.volume.unwrap_or(1.0),
    );
    voice.set_playback_rate(rate);
    voice.on_ended(Box::new(move || {
        let _ = ended_tx.send(());
    }));
    mixer.lock().add(voice);
    debug!(device = %request.device_name, ?expected, "device playback started");

    let res = ended_rx
        .recv_timeout(expected + END_GRACE)
        .map_err(|_| Error::Backend(format!("{}: playback did not finish", request.device_name)));
    drop(opened.stream);
    res
}
