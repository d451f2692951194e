//! RGB888 → RGB565 conversion for the panel's 16 bit/pixel mode.
//!
//! The ST7789 expects each pixel as a big-endian 16-bit word laid out as
//! `RRRRRGGG GGGBBBBB`. Conversion truncates, it never rounds.

/// Pack one pixel into its RGB565 value.
pub fn pack(r: u8, g: u8, b: u8) -> u16 {
    let mut rgb565: u16 = (r as u16 & 0b11111000) << 8;
    rgb565 |= (g as u16 & 0b11111100) << 3;
    rgb565 |= (b as u16) >> 3;
    rgb565
}

/// Encode a row-major RGB888 buffer (3 bytes per pixel) into the wire format,
/// high byte first. Trailing bytes that don't form a full pixel are ignored.
pub fn encode(rgb888: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(rgb888.len() / 3 * 2);
    for chunk in rgb888.chunks_exact(3) {
        raw.extend(pack(chunk[0], chunk[1], chunk[2]).to_be_bytes());
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_black_red() {
        assert_eq!(encode(&[0xFF, 0xFF, 0xFF]), vec![0xFF, 0xFF]);
        assert_eq!(encode(&[0, 0, 0]), vec![0x00, 0x00]);
        assert_eq!(encode(&[0xF8, 0, 0]), vec![0xF8, 0x00]);
    }

    #[test]
    fn test_primaries() {
        assert_eq!(pack(0, 0xFF, 0), 0x07E0);
        assert_eq!(pack(0, 0, 0xFF), 0x001F);
    }

    #[test]
    fn test_truncates_low_bits() {
        // 0x07 is below the 5-bit red threshold, 0x03 below the 6-bit green one
        assert_eq!(pack(0x07, 0x03, 0x07), 0x0000);
        assert_eq!(pack(0x0F, 0x07, 0x0F), pack(0x08, 0x04, 0x08));
    }

    #[test]
    fn test_big_endian_row_major() {
        // green (0,200,0) -> 0x0640, then blue
        let raw = encode(&[0, 200, 0, 0, 0, 0xFF]);
        assert_eq!(raw, vec![0x06, 0x40, 0x00, 0x1F]);
    }

    #[test]
    fn test_ignores_partial_pixel() {
        assert_eq!(encode(&[0xFF, 0xFF, 0xFF, 0x12]).len(), 2);
    }
}
