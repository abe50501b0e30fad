use crate::dsp::effect::Effect;

/// A serial chain of effects between a voice and the output. Owns the effects.
pub struct Chain {
    effects: Vec<Box<dyn Effect>>,
}

impl Chain {
    pub fn new() -> Self {
        Self { effects: Vec::new() }
    }
    pub fn push(&mut self, fx: Box<dyn Effect>) {
        self.effects.push(fx);
    }
    pub fn len(&self) -> usize {
        self.effects.len()
    }
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
    /// Process one interleaved block in-place.
    pub fn process(&mut self, block: &mut [f32]) {
        for fx in self.effects.iter_mut() {
            fx.process(block);
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
