//! Sample-level helpers used by the capture bridge: peak normalization,
//! channel down-mix and the two synthetic test sources.
//!
//! All of these write into caller-owned slices so they can run inside the
//! audio callback.

use rand::Rng;

/// Divides every sample by the largest absolute sample.
///
/// A silent slice (max magnitude 0) is left as it is.
///
/// # Returns
/// * `f32` - The peak magnitude found before normalizing
pub fn normalize_peak(samples: &mut [f32]) -> f32 {
    let max = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if max > 0.0 {
        for sample in samples.iter_mut() {
            *sample /= max;
        }
    }
    max
}

/// Averages interleaved frames of `channels` samples down to one channel.
///
/// Writes one value per complete frame into `out` and returns how many were
/// written. A trailing partial frame is ignored.
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut [f32]) -> usize {
    if channels <= 1 {
        let n = interleaved.len().min(out.len());
        out[..n].copy_from_slice(&interleaved[..n]);
        return n;
    }
    let mut written = 0;
    for (frame, slot) in interleaved.chunks_exact(channels).zip(out.iter_mut()) {
        *slot = frame.iter().sum::<f32>() / channels as f32;
        written += 1;
    }
    written
}

/// Fills `out` with uniform noise in [-1, 1].
pub fn fill_noise<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R) {
    for sample in out.iter_mut() {
        *sample = rng.gen_range(-1.0..=1.0);
    }
}

/// Fills `out` with `sin(PI * i * control)`.
///
/// `control` is the tone frequency as a fraction of Nyquist, so 0 is silence
/// and 1 is the Nyquist frequency. Phase restarts at zero for every frame.
pub fn fill_tone(out: &mut [f32], control: f32) {
    let control = control.clamp(0.0, 1.0);
    for (i, sample) in out.iter_mut().enumerate() {
        *sample = (std::f32::consts::PI * i as f32 * control).sin();
    }
}
