/// Per-voice processing stage.
/// - process() runs on the audio callback: no allocation, no locking.
/// - `block` is interleaved f32 samples at the output format.
pub trait Effect: Send {
    fn process(&mut self, block: &mut [f32]);
}
