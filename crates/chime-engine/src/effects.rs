//! One-shot sound effects: decode once per id, then play any number of
//! overlapping voices with optional randomized detune and playback rate.

use crate::assets::AssetStore;
use crate::error::{Error, Result};
use crate::output::AudioOutput;
use crate::voice::{DecodedBuffer, Voice};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub const DETUNE_MIN_CENTS: f32 = -1200.0;
pub const DETUNE_MAX_CENTS: f32 = 1200.0;
pub const PLAYBACK_RATE_MIN: f32 = 0.1;
pub const PLAYBACK_RATE_MAX: f32 = 3.0;

/// Per-play parameters. Unset bounds fall back to the neutral value
/// (0 cents, 1.0x) before clamping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectOptions {
    pub volume: Option<f32>,
    pub detune_min: Option<f32>,
    pub detune_max: Option<f32>,
    pub playback_min: Option<f32>,
    pub playback_max: Option<f32>,
}

impl EffectOptions {
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(1.0)
    }

    /// A random detune in cents, or `None` when both bounds are unset or zero.
    pub fn sample_detune<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f32> {
        let min = self.detune_min.unwrap_or(0.0);
        let max = self.detune_max.unwrap_or(0.0);
        if min == 0.0 && max == 0.0 {
            return None;
        }
        let cents = uniform(rng, min.max(DETUNE_MIN_CENTS), max.min(DETUNE_MAX_CENTS));
        Some(cents.clamp(DETUNE_MIN_CENTS, DETUNE_MAX_CENTS))
    }

    /// A random playback rate, or `None` when both bounds are unset or zero.
    pub fn sample_playback_rate<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f32> {
        if self.playback_min.unwrap_or(0.0) == 0.0 && self.playback_max.unwrap_or(0.0) == 0.0 {
            return None;
        }
        let min = self.playback_min.unwrap_or(1.0);
        let max = self.playback_max.unwrap_or(1.0);
        // A bound outside the legal range (e.g. a lone negative max) can
        // leave the interpolated range partly out of bounds.
        let rate = uniform(rng, min.max(PLAYBACK_RATE_MIN), max.min(PLAYBACK_RATE_MAX));
        Some(rate.clamp(PLAYBACK_RATE_MIN, PLAYBACK_RATE_MAX))
    }
}

// Interpolates rather than using gen_range so that reversed or empty
// ranges (a lone bound on the far side of the neutral value) stay valid.
fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    (lo + rng.gen::<f32>() * (hi - lo)).clamp(lo.min(hi), lo.max(hi))
}

/// Process-wide mute switch shared by everything that plays effects.
#[derive(Debug, Clone, Default)]
pub struct MuteState(Arc<AtomicBool>);

impl MuteState {
    pub fn new(muted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(muted)))
    }
    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
    pub fn set_muted(&self, muted: bool) {
        self.0.store(muted, Ordering::Relaxed);
    }
}

type CacheSlot = Arc<OnceCell<Arc<DecodedBuffer>>>;

pub struct EffectEngine {
    output: Arc<dyn AudioOutput>,
    assets: Arc<dyn AssetStore>,
    mute: MuteState,
    cache: Mutex<HashMap<String, CacheSlot>>,
    active: Arc<AtomicUsize>,
}

impl EffectEngine {
    pub fn new(output: Arc<dyn AudioOutput>, assets: Arc<dyn AssetStore>, mute: MuteState) -> Self {
        Self {
            output,
            assets,
            mute,
            cache: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Play `file_id` once, fire-and-forget. Muted, missing and undecodable
    /// files are silent; nothing is reported to the caller.
    pub async fn play_file(&self, file_id: &str, effects: Option<&EffectOptions>) {
        if self.mute.is_muted() {
            return;
        }
        if let Err(e) = self.try_play(file_id, effects).await {
            // Playback trouble must never reach the caller.
            debug!(file_id, "effect skipped: {e}");
        }
    }

    async fn try_play(&self, file_id: &str, effects: Option<&EffectOptions>) -> Result<()> {
        let buffer = self.buffer_for(file_id).await?;
        let default_opts = EffectOptions::default();
        let opts = effects.unwrap_or(&default_opts);

        let mut voice = Voice::new(buffer, self.output.sample_rate(), self.output.channels(), opts.volume());
        {
            let mut rng = rand::thread_rng();
            if let Some(cents) = opts.sample_detune(&mut rng) {
                voice.set_detune(cents);
            }
            if let Some(rate) = opts.sample_playback_rate(&mut rng) {
                voice.set_playback_rate(rate);
            }
        }

        let active = self.active.clone();
        active.fetch_add(1, Ordering::SeqCst);
        voice.on_ended(Box::new(move || {
            active.fetch_sub(1, Ordering::SeqCst);
        }));
        debug!(
            file_id,
            volume = voice.volume(),
            detune = voice.detune(),
            rate = voice.playback_rate(),
            "effect started"
        );
        // A rejected voice is dropped here, which releases its slot.
        self.output.start(voice).inspect_err(|e| warn!(file_id, "output rejected voice: {e}"))
    }

    /// Cached buffer for `file_id`, fetching and decoding on first use.
    /// Concurrent first plays share one decode; failures are not cached.
    async fn buffer_for(&self, file_id: &str) -> Result<Arc<DecodedBuffer>> {
        let slot = self.cache.lock().entry(file_id.to_string()).or_default().clone();
        let buffer = slot
            .get_or_try_init(|| async {
                let bytes = self
                    .assets
                    .file_buffer(file_id)
                    .ok_or_else(|| Error::AssetUnavailable(file_id.to_string()))?;
                let output = self.output.clone();
                let decoded = tokio::task::spawn_blocking(move || output.decode(&bytes))
                    .await
                    .map_err(|e| Error::Decode(format!("decode task failed: {e}")))??;
                debug!(file_id, frames = decoded.frames(), "effect cached");
                Ok::<_, Error>(Arc::new(decoded))
            })
            .await?;
        Ok(buffer.clone())
    }

    pub fn is_cached(&self, file_id: &str) -> bool {
        self.cache
            .lock()
            .get(file_id)
            .is_some_and(|slot| slot.initialized())
    }

    /// Voices started and not yet finished.
    pub fn active_voices(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn mute_state(&self) -> &MuteState {
        &self.mute
    }
}
