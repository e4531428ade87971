// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion for capture backends

/// Convert YUYV (YUV 4:2:2) to packed RGB24
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

            rgb.push(r);
            rgb.push(g);
            rgb.push(b);

            if rgb.len() >= pixel_count * 3 {
                break;
            }
        }
        if rgb.len() >= pixel_count * 3 {
            break;
        }
    }

    // Short source buffers pad with black rather than panic
    rgb.resize(pixel_count * 3, 0);
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_grey_maps_to_grey_rgb() {
        // Y=128, U=V=128 is mid grey with zero chroma
        let data = [128u8, 128, 128, 128];
        let rgb = yuyv_to_rgb(&data, 2, 1);
        assert_eq!(rgb.len(), 6);
        for &c in &rgb {
            assert_eq!(c, 128);
        }
    }

    #[test]
    fn output_length_matches_resolution() {
        let data = vec![0u8; 8];
        assert_eq!(yuyv_to_rgb(&data, 4, 1).len(), 12);
        // Truncated input still yields a full buffer
        assert_eq!(yuyv_to_rgb(&data[..4], 4, 1).len(), 12);
    }
}
