use crate::dsp::gain::Gain;
use crate::graph::Chain;
use std::sync::Arc;
use std::time::Duration;

/// Fully decoded audio, interleaved f32 in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self { samples, sample_rate, channels: channels.max(1) }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

pub type EndCallback = Box<dyn FnOnce() + Send>;

/// One playing instance of a buffer: source -> gain chain -> output.
///
/// Many voices may share a buffer. The end callback fires exactly once, when
/// the voice is dropped (normally by the mixer after the last frame).
pub struct Voice {
    buffer: Arc<DecodedBuffer>,
    chain: Chain,
    volume: f32,
    detune: f32,
    playback_rate: f32,
    out_rate: u32,
    out_channels: u16,
    cursor: f64,
    on_ended: Option<EndCallback>,
}

impl Voice {
    /// Bind `buffer` to a fresh gain stage for an output running at
    /// `out_rate` Hz with `out_channels` interleaved channels.
    pub fn new(buffer: Arc<DecodedBuffer>, out_rate: u32, out_channels: u16, volume: f32) -> Self {
        let out_channels = out_channels.max(1);
        let mut chain = Chain::new();
        chain.push(Box::new(Gain::new(volume)));
        Self {
            buffer,
            chain,
            volume,
            detune: 0.0,
            playback_rate: 1.0,
            out_rate,
            out_channels,
            cursor: 0.0,
            on_ended: None,
        }
    }

    /// Pitch shift in cents.
    pub fn set_detune(&mut self, cents: f32) {
        self.detune = cents;
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate;
    }

    pub fn on_ended(&mut self, cb: EndCallback) {
        self.on_ended = Some(cb);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn detune(&self) -> f32 {
        self.detune
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn buffer(&self) -> &Arc<DecodedBuffer> {
        &self.buffer
    }

    /// Effective speed through the source: rate scaled by the detune ratio.
    pub fn computed_rate(&self) -> f64 {
        self.playback_rate as f64 * 2f64.powf(self.detune as f64 / 1200.0)
    }

    /// True once the cursor has left the buffer. A cursor that went negative
    /// or non-finite also counts, so a bad rate can never pin a voice.
    pub fn is_finished(&self) -> bool {
        !(self.cursor >= 0.0 && self.cursor < self.buffer.frames() as f64)
    }

    /// Render up to `out.len()` interleaved samples and add them into `out`.
    /// Returns false once the source is exhausted.
    pub fn render(&mut self, out: &mut [f32], scratch: &mut Vec<f32>) -> bool {
        let ch = self.out_channels as usize;
        let src_ch = self.buffer.channels as usize;
        let src_frames = self.buffer.frames();
        if self.out_rate == 0 || src_frames == 0 {
            self.cursor = src_frames as f64;
            return false;
        }

        let step = self.computed_rate() * self.buffer.sample_rate as f64 / self.out_rate as f64;
        if !(step.is_finite() && step > 0.0) {
            self.cursor = src_frames as f64;
            return false;
        }
        let frames = out.len() / ch;
        scratch.clear();
        scratch.resize(frames * ch, 0.0);

        let samples = &self.buffer.samples;
        let mut written = 0;
        while written < frames {
            let i = self.cursor as usize;
            if i >= src_frames {
                break;
            }
            let frac = (self.cursor - i as f64) as f32;
            let next = (i + 1).min(src_frames - 1);
            for c in 0..ch {
                let sc = c.min(src_ch - 1);
                let a = samples[i * src_ch + sc];
                let b = samples[next * src_ch + sc];
                scratch[written * ch + c] = a + (b - a) * frac;
            }
            self.cursor += step;
            written += 1;
        }

        let block = &mut scratch[..written * ch];
        self.chain.process(block);
        for (o, s) in out.iter_mut().zip(block.iter()) {
            *o += *s;
        }
        !self.is_finished()
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        if let Some(cb) = self.on_ended.take() {
            cb();
        }
    }
}
