//! Inverse frequency transform.
//!
//! Each sub-frame's 128 spectral coefficients are mapped back to time with
//! a lapped inverse DCT over 256 output points, windowed with a sine
//! window, and overlap-added with the second half of the previous
//! sub-frame. The whole path runs in double precision; only the stored
//! overlap tail and the emitted samples are narrowed to `f32`.

use std::sync::LazyLock;

use crate::SAMPLES_PER_SUBFRAME;

const POINTS: usize = SAMPLES_PER_SUBFRAME;

/// First half of the 256-point sine window. The second half is the
/// mirror image, so `window[127 - n]` weights output point `128 + n`.
static WINDOW: LazyLock<[f64; POINTS]> = LazyLock::new(|| {
    let mut window = [0.0f64; POINTS];

    for (i, entry) in window.iter_mut().enumerate() {
        *entry = (std::f64::consts::PI * (i as f64 + 0.5) / (2.0 * POINTS as f64)).sin();
    }

    window
});

/// Lapped cosine basis: 256 output points per 128 coefficients, with the
/// half-point phase shift that makes adjacent sub-frames alias-cancel
/// under the sine window.
static BASIS: LazyLock<Vec<[f64; POINTS]>> = LazyLock::new(|| {
    let scale = 2.0 / POINTS as f64;
    let step = std::f64::consts::PI / POINTS as f64;
    let shift = POINTS as f64 / 2.0;

    (0..2 * POINTS)
        .map(|n| {
            let mut row = [0.0f64; POINTS];
            for (k, entry) in row.iter_mut().enumerate() {
                *entry = scale * (step * (n as f64 + 0.5 + shift) * (k as f64 + 0.5)).cos();
            }
            row
        })
        .collect()
});

/// Transforms one sub-frame of spectra into 128 time-domain samples.
///
/// `previous` is the overlap tail carried from the last sub-frame of the
/// same channel; it is consumed and replaced with this sub-frame's tail.
/// Sub-frame and block boundaries are both lapped, so the caller must
/// never reset `previous` mid-stream.
pub fn imdct(
    spectra: &[f32; POINTS],
    previous: &mut [f32; POINTS],
    output: &mut [f32; POINTS],
) {
    let mut time = [0.0f64; 2 * POINTS];

    for (n, sample) in time.iter_mut().enumerate() {
        let row = &BASIS[n];
        let mut acc = 0.0f64;
        for (k, &coefficient) in spectra.iter().enumerate() {
            acc += coefficient as f64 * row[k];
        }
        *sample = acc;
    }

    for n in 0..POINTS {
        output[n] = (WINDOW[n] * time[n] + previous[n] as f64) as f32;
        previous[n] = (WINDOW[POINTS - 1 - n] * time[POINTS + n]) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_halves_are_power_complementary() {
        for n in 0..POINTS {
            let sum = WINDOW[n] * WINDOW[n] + WINDOW[POINTS - 1 - n] * WINDOW[POINTS - 1 - n];
            assert!((sum - 1.0).abs() < 1e-12, "n = {n}");
        }
    }

    #[test]
    fn basis_columns_are_orthogonal() {
        for (k, other) in [(0usize, 1usize), (3, 64), (63, 127), (127, 0)] {
            let dot: f64 = (0..2 * POINTS).map(|n| BASIS[n][k] * BASIS[n][other]).sum();
            assert!(dot.abs() < 1e-9, "columns {k} and {other}");
        }

        let scale = 2.0 / POINTS as f64;
        for k in [0usize, 17, 127] {
            let norm: f64 = (0..2 * POINTS).map(|n| BASIS[n][k] * BASIS[n][k]).sum();
            assert!((norm - scale * scale * POINTS as f64).abs() < 1e-9, "column {k}");
        }
    }

    #[test]
    fn zero_spectra_flush_the_overlap_tail() {
        let mut previous = [0.0f32; POINTS];
        let mut output = [0.0f32; POINTS];

        let mut spectra = [0.0f32; POINTS];
        spectra[5] = 1.0;
        imdct(&spectra, &mut previous, &mut output);
        let tail = previous;
        assert!(tail.iter().any(|&s| s != 0.0));

        imdct(&[0.0; POINTS], &mut previous, &mut output);
        assert_eq!(output, tail);
        assert!(previous.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn transform_is_linear() {
        let mut a = [0.0f32; POINTS];
        let mut b = [0.0f32; POINTS];
        for k in 0..POINTS {
            a[k] = ((k * 37 % 19) as f32 - 9.0) / 10.0;
            b[k] = ((k * 11 % 23) as f32 - 11.0) / 12.0;
        }
        let sum: [f32; POINTS] = std::array::from_fn(|k| a[k] + b[k]);

        let mut out_a = [0.0f32; POINTS];
        let mut out_b = [0.0f32; POINTS];
        let mut out_sum = [0.0f32; POINTS];
        imdct(&a, &mut [0.0; POINTS], &mut out_a);
        imdct(&b, &mut [0.0; POINTS], &mut out_b);
        imdct(&sum, &mut [0.0; POINTS], &mut out_sum);

        for n in 0..POINTS {
            assert!((out_sum[n] - (out_a[n] + out_b[n])).abs() < 1e-4, "n = {n}");
        }
    }
}
