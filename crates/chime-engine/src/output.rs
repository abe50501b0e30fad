use crate::config::OutputConfig;
use crate::decode::decode_bytes;
use crate::error::{Error, Result};
use crate::mixer::Mixer;
use crate::voice::{DecodedBuffer, Voice};
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

/// The audio output capability used by the effect engine: decode bytes,
/// then start voices that sum into a shared destination.
pub trait AudioOutput: Send + Sync {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBuffer>;
    /// Start a voice immediately. It is released when it runs out of frames.
    fn start(&self, voice: Voice) -> Result<()>;
}

/// cpal-backed output. The stream lives on its own thread since cpal streams
/// are not `Send` on every host; voices are handed over through the mixer.
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    channels: u16,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open(cfg: &OutputConfig) -> Result<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::new()));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_mixer = mixer.clone();
        let thread_cfg = cfg.clone();
        let thread = std::thread::Builder::new()
            .name("chime-output".into())
            .spawn(move || match open_stream(&thread_cfg, thread_mixer, true) {
                Ok(opened) => {
                    let _ = ready_tx.send(Ok((opened.sample_rate, opened.channels)));
                    // Parked until the handle is dropped.
                    let _ = stop_rx.recv();
                    drop(opened.stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| Error::Output("output thread exited before opening a stream".into()))?
            .map_err(|e| Error::Output(format!("{e:#}")))?;

        info!(sample_rate, channels, "effect output stream running");
        Ok(Self { mixer, sample_rate, channels, stop: Some(stop_tx), thread: Some(thread) })
    }

    pub fn active_voices(&self) -> usize {
        self.mixer.lock().len()
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    fn channels(&self) -> u16 {
        self.channels
    }
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBuffer> {
        decode_bytes(bytes)
    }
    fn start(&self, voice: Voice) -> Result<()> {
        self.mixer.lock().add(voice);
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

pub(crate) struct OpenedStream {
    pub stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Open and start an output stream on the configured device that renders
/// `mixer` on every callback. Without `fallback`, a device name that matches
/// nothing is an error instead of selecting the default device.
pub(crate) fn open_stream(
    cfg: &OutputConfig,
    mixer: Arc<Mutex<Mixer>>,
    fallback: bool,
) -> anyhow::Result<OpenedStream> {
    let host = cpal::default_host();
    let dev = pick_output_device(&host, cfg.device.as_deref(), cfg.device_index, fallback)?
        .context("No output device matched (and no default available)")?;

    let cfg_any = dev.default_output_config().context("No default output config")?;
    let mut out_cfg = cfg_any.config();

    // Honor sample_rate/block_size if provided (best-effort)
    if let Some(sr) = cfg.sample_rate {
        out_cfg.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(bs) = cfg.block_size {
        out_cfg.buffer_size = cpal::BufferSize::Fixed(bs);
    }

    let sample_rate = out_cfg.sample_rate.0;
    let channels = out_cfg.channels;
    let on_err = |err: cpal::StreamError| error!("output stream error: {err}");

    let stream = match cfg_any.sample_format() {
        cpal::SampleFormat::F32 => dev.build_output_stream::<f32, _, _>(
            &out_cfg,
            move |out: &mut [f32], _| match mixer.try_lock() {
                Some(mut m) => m.mix(out),
                None => out.fill(0.0),
            },
            on_err,
            None,
        )?,
        cpal::SampleFormat::I16 => {
            let mut tmp = Vec::<f32>::new();
            dev.build_output_stream::<i16, _, _>(
                &out_cfg,
                move |out: &mut [i16], _| {
                    tmp.resize(out.len(), 0.0);
                    match mixer.try_lock() {
                        Some(mut m) => m.mix(&mut tmp),
                        None => tmp.fill(0.0),
                    }
                    for (o, &v) in out.iter_mut().zip(tmp.iter()) {
                        *o = (v.clamp(-1.0, 1.0) * 32767.0) as i16;
                    }
                },
                on_err,
                None,
            )?
        }
        cpal::SampleFormat::U16 => {
            let mut tmp = Vec::<f32>::new();
            dev.build_output_stream::<u16, _, _>(
                &out_cfg,
                move |out: &mut [u16], _| {
                    tmp.resize(out.len(), 0.0);
                    match mixer.try_lock() {
                        Some(mut m) => m.mix(&mut tmp),
                        None => tmp.fill(0.0),
                    }
                    for (o, &v) in out.iter_mut().zip(tmp.iter()) {
                        *o = (((v.clamp(-1.0, 1.0) + 1.0) * 0.5) * 65535.0) as u16;
                    }
                },
                on_err,
                None,
            )?
        }
        other => return Err(anyhow!("Unsupported output format: {other:?}")),
    };

    stream.play().context("Failed to play output stream")?;
    Ok(OpenedStream { stream, sample_rate, channels })
}

/* ---------- device picking (by name or index) ---------- */

fn pick_output_device(
    host: &cpal::Host,
    name_substr: Option<&str>,
    index: Option<usize>,
    fallback: bool,
) -> anyhow::Result<Option<cpal::Device>> {
    // Try explicit index first
    if let Some(idx) = index {
        if let Some(dev) = host.output_devices()?.nth(idx) {
            return Ok(Some(dev));
        }
        // fallthrough to name/default if index not found
    }

    if let Some(q) = name_substr.filter(|q| !q.is_empty()) {
        let qn = q.to_lowercase();
        for dev in host.output_devices()? {
            let name = dev.name().unwrap_or_default();
            if name.to_lowercase().contains(&qn) {
                return Ok(Some(dev));
            }
        }
    }

    if !fallback && (index.is_some() || name_substr.is_some_and(|q| !q.is_empty())) {
        return Ok(None);
    }
    Ok(host.default_output_device())
}
