use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::{Complex, Complex64};
use rustfft::num_traits::Zero;

use crate::stages::{AudioConsumer, SpectrumConsumer, Stage};

/// Short-time Fourier transform with a Hann window and a hop of half a window.
///
/// Only complete frames are transformed, so a stream shorter than one window
/// yields no spectra at all.
pub struct Stft<C: SpectrumConsumer> {
    consumer: C,
    frame_size: usize,
    hop_size: usize,

    fft_plan: Arc<dyn rustfft::Fft<f64>>,
    fft_buffer_complex: Box<[Complex64]>,
    fft_frame: Box<[f64]>,
    fft_scratch: Box<[Complex64]>,

    window: Box<[f64]>,
    ring_buf: VecDeque<f64>,
}

impl<C: SpectrumConsumer> Stft<C> {
    pub(crate) fn new(frame_size: usize, consumer: C) -> Self {
        let fft_plan = rustfft::FftPlanner::new().plan_fft_forward(frame_size);

        Self {
            consumer,
            frame_size,
            hop_size: hop_size(frame_size),
            fft_buffer_complex: vec![Complex64::zero(); frame_size].into_boxed_slice(),
            fft_scratch: vec![Complex::zero(); fft_plan.get_inplace_scratch_len()].into_boxed_slice(),
            fft_frame: vec![0.0; 1 + frame_size / 2].into_boxed_slice(),
            fft_plan,
            window: make_hann_window(frame_size),
            ring_buf: VecDeque::new(),
        }
    }

    pub(crate) fn consumer(&self) -> &C {
        &self.consumer
    }
}

/// Number of samples between the starts of two consecutive frames.
pub(crate) fn hop_size(frame_size: usize) -> usize {
    (frame_size / 2).max(1)
}

/// Number of complete frames in a stream of `samples` samples.
pub fn frame_count(samples: usize, frame_size: usize) -> usize {
    if samples < frame_size {
        return 0;
    }
    (samples - frame_size) / hop_size(frame_size) + 1
}

impl<C: SpectrumConsumer> Stage for Stft<C> {
    type Output = C::Output;

    fn output(&self) -> &Self::Output {
        self.consumer.output()
    }
}

impl<C: SpectrumConsumer> AudioConsumer<f32> for Stft<C> {
    fn reset(&mut self) {
        self.ring_buf.clear();
        self.consumer.reset();
    }

    fn consume(&mut self, data: &[f32]) {
        self.ring_buf.extend(data.iter().map(|&s| f64::from(s)));

        while self.ring_buf.len() >= self.frame_size {
            let frame = self.ring_buf.iter().copied().take(self.frame_size);

            for (i, (output, input)) in self.fft_buffer_complex.iter_mut().zip(frame).enumerate() {
                output.re = input * self.window[i];
                output.im = 0.0;
            }

            self.fft_plan.process_with_scratch(&mut self.fft_buffer_complex, &mut self.fft_scratch);

            for (magnitude, bin) in self.fft_frame.iter_mut().zip(self.fft_buffer_complex.iter()) {
                *magnitude = bin.norm();
            }

            self.consumer.consume(&self.fft_frame);
            self.ring_buf.drain(..self.hop_size);
        }
    }

    fn flush(&mut self) {
        // A trailing partial frame is dropped rather than zero padded.
        self.ring_buf.clear();
    }
}

/// Periodic Hann window.
fn make_hann_window(size: usize) -> Box<[f64]> {
    (0..size)
        .map(|i| 0.5 - 0.5 * f64::cos(2.0 * std::f64::consts::PI * (i as f64) / (size as f64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{assert_eq_float, assert_eq_float_slice};
    use crate::stages::{AudioConsumer, SpectrumConsumer, Stage};
    use crate::stft::{frame_count, make_hann_window, Stft};

    struct Collector {
        frames: Vec<Vec<f64>>,
    }

    impl Collector {
        fn new() -> Self {
            Self { frames: vec![] }
        }
    }

    impl Stage for Collector {
        type Output = [Vec<f64>];

        fn output(&self) -> &Self::Output {
            &self.frames
        }
    }

    impl SpectrumConsumer for Collector {
        fn consume(&mut self, magnitudes: &[f64]) {
            self.frames.push(magnitudes.to_vec());
        }

        fn reset(&mut self) {
            self.frames.clear();
        }
    }

    fn argmax(values: &[f64]) -> usize {
        let mut best = 0;
        for (i, &v) in values.iter().enumerate() {
            if v > values[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn frame_counts() {
        assert_eq!(0, frame_count(0, 32));
        assert_eq!(0, frame_count(31, 32));
        assert_eq!(1, frame_count(32, 32));
        assert_eq!(1, frame_count(47, 32));
        assert_eq!(2, frame_count(48, 32));
        assert_eq!(52, frame_count(5 * 22050, 4096));
    }

    #[test]
    fn sine() {
        let frame_size = 64;
        let sample_rate = 6400.0;
        let bin = 7;
        let freq = bin as f64 * sample_rate / frame_size as f64;

        let input = (0..frame_size * 4)
            .map(|i| f64::sin(2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate) as f32)
            .collect::<Vec<_>>();

        let mut stft = Stft::new(frame_size, Collector::new());
        for chunk in input.chunks(50) {
            stft.consume(chunk);
        }
        stft.flush();

        assert_eq!(frame_count(input.len(), frame_size), stft.output().len());
        for frame in stft.output() {
            assert_eq!(1 + frame_size / 2, frame.len());
            assert_eq!(bin, argmax(frame));
        }
    }

    #[test]
    fn dc() {
        let frame_size = 32;
        let input = vec![0.5; frame_size * 2];

        let mut stft = Stft::new(frame_size, Collector::new());
        stft.consume(&input);

        assert_eq!(3, stft.output().len());
        for frame in stft.output() {
            assert_eq!(0, argmax(frame));
            // Sum of a periodic Hann window of size N is N / 2.
            assert_eq_float!(frame[0], 0.5 * frame_size as f64 / 2.0, 1e-9);
        }
    }

    #[test]
    fn short_input_has_no_frames() {
        let mut stft = Stft::new(32, Collector::new());
        stft.consume(&[0.25; 31]);
        stft.flush();
        assert!(stft.output().is_empty());
    }

    #[test]
    fn reset_discards_buffered_samples() {
        let mut stft = Stft::new(32, Collector::new());
        stft.consume(&[0.25; 20]);
        stft.reset();
        stft.consume(&[0.25; 20]);
        assert!(stft.output().is_empty());
    }

    #[test]
    fn hann_window_is_periodic() {
        let window = make_hann_window(8);
        assert_eq_float_slice!(
            window.iter(),
            [0.0, 0.1464466, 0.5, 0.8535534, 1.0, 0.8535534, 0.5, 0.1464466].iter()
        );
    }
}
