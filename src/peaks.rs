use crate::stages::{PeakConsumer, SpectrumConsumer, Stage};

/// Width of one quantized frequency bin.
pub const BIN_WIDTH_HZ: f64 = 10.0;

/// Highest quantized bin. Frequencies at or above 10230 Hz all land here.
pub const MAX_BIN: u16 = 1023;

/// Maps a frequency onto a 10 Hz bin, clamped to [`MAX_BIN`].
pub fn quantize_frequency(freq: f64) -> u16 {
    let bin = (freq / BIN_WIDTH_HZ).floor();
    if bin >= f64::from(MAX_BIN) {
        MAX_BIN
    } else if bin > 0.0 {
        bin as u16
    } else {
        0
    }
}

/// Picks the dominant frequency of every spectrum and forwards its quantized bin.
pub struct PeakPicker<C: PeakConsumer> {
    consumer: C,
    hz_per_bin: f64,
}

impl<C: PeakConsumer> PeakPicker<C> {
    pub(crate) fn new(sample_rate: u32, frame_size: usize, consumer: C) -> Self {
        Self {
            consumer,
            hz_per_bin: f64::from(sample_rate) / frame_size as f64,
        }
    }

    pub(crate) fn consumer(&self) -> &C {
        &self.consumer
    }
}

/// Index of the largest magnitude; the first one wins on ties.
fn dominant_bin(magnitudes: &[f64]) -> usize {
    let mut best = 0;
    for (i, &magnitude) in magnitudes.iter().enumerate().skip(1) {
        if magnitude > magnitudes[best] {
            best = i;
        }
    }
    best
}

impl<C: PeakConsumer> Stage for PeakPicker<C> {
    type Output = C::Output;

    fn output(&self) -> &Self::Output {
        self.consumer.output()
    }
}

impl<C: PeakConsumer> SpectrumConsumer for PeakPicker<C> {
    fn consume(&mut self, magnitudes: &[f64]) {
        if magnitudes.is_empty() {
            return;
        }
        let freq = dominant_bin(magnitudes) as f64 * self.hz_per_bin;
        self.consumer.consume(quantize_frequency(freq));
    }

    fn reset(&mut self) {
        self.consumer.reset();
    }
}

#[cfg(test)]
mod tests {
    use crate::peaks::{dominant_bin, quantize_frequency, PeakPicker, MAX_BIN};
    use crate::stages::{PeakConsumer, SpectrumConsumer, Stage};

    struct Peaks(Vec<u16>);

    impl Stage for Peaks {
        type Output = [u16];

        fn output(&self) -> &Self::Output {
            &self.0
        }
    }

    impl PeakConsumer for Peaks {
        fn consume(&mut self, peak: u16) {
            self.0.push(peak);
        }

        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn quantization() {
        assert_eq!(0, quantize_frequency(0.0));
        assert_eq!(0, quantize_frequency(9.99));
        assert_eq!(1, quantize_frequency(10.0));
        assert_eq!(44, quantize_frequency(441.0));
        assert_eq!(1022, quantize_frequency(10229.9));
        assert_eq!(MAX_BIN, quantize_frequency(10230.0));
        assert_eq!(MAX_BIN, quantize_frequency(11025.0));
        assert_eq!(MAX_BIN, quantize_frequency(1.0e9));
    }

    #[test]
    fn quantization_is_bounded() {
        let mut freq = 0.0;
        while freq < 30_000.0 {
            assert!(quantize_frequency(freq) <= MAX_BIN);
            freq += 2.6917;
        }
    }

    #[test]
    fn first_maximum_wins() {
        assert_eq!(0, dominant_bin(&[0.0, 0.0, 0.0]));
        assert_eq!(1, dominant_bin(&[0.1, 0.5, 0.5, 0.2]));
        assert_eq!(3, dominant_bin(&[0.1, 0.5, 0.5, 0.7]));
    }

    #[test]
    fn picks_dominant_frequency() {
        // 22050 Hz with 4096 samples per frame gives ~5.38 Hz per FFT bin.
        let mut picker = PeakPicker::new(22050, 4096, Peaks(vec![]));
        let mut spectrum = vec![0.0; 2049];
        spectrum[82] = 1.0;
        picker.consume(&spectrum);
        spectrum[82] = 0.0;
        spectrum[2048] = 1.0;
        picker.consume(&spectrum);

        // 82 * 22050 / 4096 = 441.43 Hz, 2048 * 22050 / 4096 = 11025 Hz
        assert_eq!(&[44, MAX_BIN], picker.output());
    }
}
