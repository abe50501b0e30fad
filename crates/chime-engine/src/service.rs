use crate::assets::{AssetStore, DirAssetStore};
use crate::backend::{DeviceBackend, PlayRequest, PlaybackBackend};
use crate::config::{RuntimeMode, SoundConfig};
use crate::effects::{EffectEngine, EffectOptions, MuteState};
use crate::error::Result;
use crate::output::{AudioOutput, CpalOutput};
use crate::sequencer::{VoiceClipOptions, VoiceClipSequencer};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Options for a direct, unqueued device playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassthroughOptions {
    pub volume: Option<f32>,
}

/// The sound subsystem as seen by the rest of the application: one-shot
/// effects, serialized voice clips, and direct device playback.
pub struct SoundService {
    effects: EffectEngine,
    clips: VoiceClipSequencer,
    backend: Arc<dyn PlaybackBackend>,
    mute: MuteState,
    mode: RuntimeMode,
}

impl SoundService {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        assets: Arc<dyn AssetStore>,
        backend: Arc<dyn PlaybackBackend>,
        mode: RuntimeMode,
        runtime: Handle,
    ) -> Self {
        let mute = MuteState::default();
        Self {
            effects: EffectEngine::new(output, assets, mute.clone()),
            clips: VoiceClipSequencer::new(backend.clone(), runtime),
            backend,
            mute,
            mode,
        }
    }

    /// Open the default cpal output and device backend described by `cfg`.
    /// Must be called from within a tokio runtime.
    pub fn from_config(cfg: &SoundConfig) -> Result<Self> {
        let output = Arc::new(CpalOutput::open(&cfg.output)?);
        let assets = Arc::new(DirAssetStore::new(&cfg.assets_dir));
        let backend = Arc::new(DeviceBackend::new(cfg.output.clone()));
        let svc = Self::new(output, assets, backend, cfg.mode, Handle::current());
        svc.set_muted(cfg.muted);
        Ok(svc)
    }

    pub async fn play_file(&self, file_id: &str, effects: Option<&EffectOptions>) {
        self.effects.play_file(file_id, effects).await
    }

    pub fn enqueue_voice_clip(&self, payload: Vec<u8>, options: VoiceClipOptions) {
        self.clips.enqueue(payload, options)
    }

    /// Play `payload` on `device_name` right away, outside the clip queue.
    /// Only the host plays; clients and empty device names are no-ops.
    /// Mute does not apply here.
    pub async fn play_sound_async(
        &self,
        payload: Vec<u8>,
        device_name: &str,
        options: Option<PassthroughOptions>,
    ) {
        if device_name.is_empty() || self.mode != RuntimeMode::Host {
            debug!(device_name, mode = ?self.mode, "direct playback skipped");
            return;
        }
        let request = PlayRequest {
            device_name: device_name.to_string(),
            data: payload,
            volume: options.and_then(|o| o.volume),
            rate: None,
            speed: 1.0,
        };
        if let Err(e) = self.backend.play(request).await {
            warn!(device_name, "direct playback failed: {e}");
        }
    }

    pub fn is_muted(&self) -> bool {
        self.mute.is_muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.mute.set_muted(muted);
    }

    pub fn mute_state(&self) -> MuteState {
        self.mute.clone()
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn effects(&self) -> &EffectEngine {
        &self.effects
    }

    pub fn clips(&self) -> &VoiceClipSequencer {
        &self.clips
    }
}
