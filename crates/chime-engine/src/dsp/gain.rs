use super::effect::Effect;

/// Static linear gain. No clipping here; the output conversion clamps the
/// summed mix.
pub struct Gain {
    lin: f32,
}

impl Gain {
    pub fn new(lin: f32) -> Self {
        Self { lin }
    }
}

impl Effect for Gain {
    fn process(&mut self, block: &mut [f32]) {
        let g = self.lin;
        if g == 1.0 {
            return;
        }
        for s in block.iter_mut() {
            *s *= g;
        }
    }
}
