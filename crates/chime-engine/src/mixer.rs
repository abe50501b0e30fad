use crate::voice::Voice;

/// Additive fan-in of every live voice into one interleaved output block.
pub struct Mixer {
    voices: Vec<Voice>,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new() -> Self {
        Self { voices: Vec::new(), scratch: Vec::new() }
    }

    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Overwrite `out` with the sum of all voices. Exhausted voices are
    /// dropped here, which fires their end callbacks.
    pub fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let scratch = &mut self.scratch;
        self.voices.retain_mut(|v| v.render(out, scratch));
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
