pub mod assets;
pub mod backend;
pub mod config;
pub mod decode;
pub mod dsp;
pub mod effects;
pub mod error;
pub mod graph;
pub mod mixer;
pub mod output;
pub mod sequencer;
pub mod service;
pub mod voice;

pub use assets::{AssetStore, DirAssetStore, MemoryAssetStore};
pub use backend::{DeviceBackend, PlayRequest, PlaybackBackend};
pub use config::{OutputConfig, RuntimeMode, SoundConfig};
pub use effects::{EffectEngine, EffectOptions, MuteState};
pub use error::{Error, Result};
pub use output::{AudioOutput, CpalOutput};
pub use sequencer::{VoiceClipOptions, VoiceClipSequencer};
pub use service::{PassthroughOptions, SoundService};
pub use voice::{DecodedBuffer, Voice};
