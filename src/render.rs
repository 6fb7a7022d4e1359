// src/render.rs
//
// Spectrogram and peak-overlay rendering. Time runs left to right, low
// frequencies sit at the bottom, and power maps through a
// blue→cyan→green→yellow→red palette after global normalization.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::audio::Spectrogram;
use crate::error::{Error, Result};
use crate::fingerprint::Landmark;

/// Render a spectrogram to an RGB image, one pixel per (frame, bin).
pub fn render_spectrogram(spec: &Spectrogram) -> Result<RgbImage> {
    if spec.is_empty() || spec.freq_bins() == 0 {
        return Err(Error::InvalidInput(
            "cannot render an empty spectrogram".to_string(),
        ));
    }

    let width = spec.time_bins() as u32;
    let height = spec.freq_bins() as u32;
    let max = spec.max_value().max(f32::MIN_POSITIVE);

    let mut img = RgbImage::new(width, height);
    for x in 0..width {
        for y in 0..height {
            // Invert the vertical axis so low frequencies are at the bottom.
            let bin = (height - 1 - y) as usize;
            let value = (spec.value(x as usize, bin) / max).clamp(0.0, 1.0);
            img.put_pixel(x, y, heat_color(value));
        }
    }
    Ok(img)
}

/// Render a spectrogram with white markers over the given landmarks.
pub fn render_peaks(spec: &Spectrogram, peaks: &[Landmark]) -> Result<RgbImage> {
    let mut img = render_spectrogram(spec)?;
    let (width, height) = (img.width() as i32, img.height() as i32);
    let white = Rgb([255u8, 255, 255]);

    for peak in peaks {
        let cx = peak.time_index as i32;
        let cy = height - 1 - peak.freq_index as i32;
        // Radius-2 disc, corners trimmed.
        for dx in -2i32..=2 {
            for dy in -2i32..=2 {
                if dx * dx + dy * dy > 5 {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && x < width && y >= 0 && y < height {
                    img.put_pixel(x as u32, y as u32, white);
                }
            }
        }
    }
    Ok(img)
}

/// Write an image as PNG.
pub fn save_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path)
        .map_err(|e| Error::InvalidInput(format!("failed to write {}: {e}", path.display())))
}

/// Map a normalized value to the blue→cyan→green→yellow→red ramp.
fn heat_color(value: f32) -> Rgb<u8> {
    let v = value.clamp(0.0, 1.0);
    let (r, g, b) = if v < 0.25 {
        let t = v * 4.0;
        (0.0, t, 1.0)
    } else if v < 0.5 {
        let t = (v - 0.25) * 4.0;
        (0.0, 1.0, 1.0 - t)
    } else if v < 0.75 {
        let t = (v - 0.5) * 4.0;
        (t, 1.0, 0.0)
    } else {
        let t = (v - 0.75) * 4.0;
        (1.0, 1.0 - t, 0.0)
    };
    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_spec() -> Spectrogram {
        let mut data = vec![vec![0.0f32; 8]; 16];
        data[4][2] = 1.0;
        data[10][6] = 0.5;
        let time_points = (0..16).map(|t| t as f64 * 0.01).collect();
        let freq_points = (0..8).map(|f| f as f64 * 100.0).collect();
        Spectrogram::from_parts(data, time_points, freq_points).unwrap()
    }

    #[test]
    fn test_render_dimensions() {
        let img = render_spectrogram(&small_spec()).unwrap();
        assert_eq!(img.width(), 16);
        assert_eq!(img.height(), 8);
    }

    #[test]
    fn test_hot_cell_is_red_cold_cell_is_blue() {
        let img = render_spectrogram(&small_spec()).unwrap();
        // Peak cell (t=4, f=2) sits at y = 8 - 1 - 2 = 5.
        let hot = img.get_pixel(4, 5);
        assert_eq!(hot[0], 255);
        assert_eq!(hot[2], 0);
        // A silent cell renders blue.
        let cold = img.get_pixel(0, 0);
        assert_eq!(cold[2], 255);
        assert_eq!(cold[0], 0);
    }

    #[test]
    fn test_peak_overlay_paints_white() {
        let spec = small_spec();
        let peaks = vec![Landmark {
            time_index: 4,
            freq_index: 2,
            time_s: 0.04,
            freq_hz: 200.0,
            amplitude: 1.0,
        }];
        let img = render_peaks(&spec, &peaks).unwrap();
        assert_eq!(*img.get_pixel(4, 5), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_spectrogram_rejected() {
        let spec = Spectrogram::from_parts(vec![], vec![], vec![]).unwrap();
        assert!(render_spectrogram(&spec).is_err());
    }
}
