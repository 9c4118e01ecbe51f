pub trait Stage {
    type Output: ?Sized;
    fn output(&self) -> &Self::Output;
}

/// Consumes raw mono samples.
pub trait AudioConsumer<T = f32>: Stage {
    fn reset(&mut self);
    fn consume(&mut self, data: &[T]);
    fn flush(&mut self);
}

/// Consumes one magnitude spectrum per STFT frame.
pub trait SpectrumConsumer: Stage {
    fn consume(&mut self, magnitudes: &[f64]);
    fn reset(&mut self);
}

/// Consumes one quantized frequency bin per STFT frame.
pub trait PeakConsumer: Stage {
    fn consume(&mut self, peak: u16);
    fn reset(&mut self);
}
