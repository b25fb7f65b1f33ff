// Channel conversion and linear resampling of decoded audio blocks

use cadence_core::AudioBlock;

/// Converts blocks from one sample rate / channel layout to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    input_channels: u16,
    output_channels: u16,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> Self {
        Self {
            input_rate,
            output_rate,
            input_channels,
            output_channels,
        }
    }

    /// Resampler matching `block`'s own format
    pub fn for_block(block: &AudioBlock, output_rate: u32, output_channels: u16) -> Self {
        Self::new(block.sample_rate, output_rate, block.channels, output_channels)
    }

    pub fn matches(&self, block: &AudioBlock) -> bool {
        self.input_rate == block.sample_rate && self.input_channels == block.channels
    }

    pub fn is_passthrough(&self) -> bool {
        !needs_resampling(self.input_rate, self.output_rate, self.input_channels, self.output_channels)
    }

    /// Interleaved output samples at the target rate and layout
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if self.input_channels == 0 || self.output_channels == 0 {
            return Vec::new();
        }
        let remapped = if self.input_channels != self.output_channels {
            self.convert_channels(input)
        } else {
            input.to_vec()
        };
        if self.input_rate != self.output_rate && self.input_rate > 0 && self.output_rate > 0 {
            self.resample(&remapped)
        } else {
            remapped
        }
    }

    fn convert_channels(&self, input: &[f32]) -> Vec<f32> {
        let in_ch = self.input_channels as usize;
        let out_ch = self.output_channels as usize;
        let frames = input.len() / in_ch;
        let mut output = Vec::with_capacity(frames * out_ch);

        for frame in input.chunks_exact(in_ch) {
            match (in_ch, out_ch) {
                // Mono fans out to every output channel
                (1, _) => output.extend(std::iter::repeat(frame[0]).take(out_ch)),
                // Down to mono: average everything
                (_, 1) => output.push(frame.iter().sum::<f32>() / in_ch as f32),
                // Otherwise keep the leading channels, repeating the last one if short
                _ => output.extend((0..out_ch).map(|ch| frame[ch.min(in_ch - 1)])),
            }
        }
        output
    }

    /// Linear interpolation between neighbouring frames
    fn resample(&self, input: &[f32]) -> Vec<f32> {
        let channels = self.output_channels as usize;
        let input_frames = input.len() / channels;
        if input_frames == 0 {
            return Vec::new();
        }
        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let output_frames = (input_frames as f64 * ratio).round() as usize;
        let mut output = Vec::with_capacity(output_frames * channels);

        for frame_idx in 0..output_frames {
            let src = frame_idx as f64 / ratio;
            let left = (src.floor() as usize).min(input_frames - 1);
            let right = (left + 1).min(input_frames - 1);
            let frac = (src - left as f64) as f32;

            for ch in 0..channels {
                let a = input[left * channels + ch];
                let b = input[right * channels + ch];
                output.push(a + (b - a) * frac);
            }
        }
        output
    }
}

pub fn needs_resampling(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> bool {
    input_rate != output_rate || input_channels != output_channels
}
