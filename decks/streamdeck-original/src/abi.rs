//! Wire format of the original Stream Deck.
//!
//! Key icons travel as two 8191 byte output reports ("pages"). Page one starts
//! with a 16 byte command header followed by a 54 byte BMP header, page two
//! only carries the 16 byte command header. Pixels are BGR, scanned right to
//! left, top to bottom. Device wide commands (reset, brightness) are 17 byte
//! feature reports.

use std::ops::Range;

use deck_core::{DeckError, Result};
use image::RgbImage;

use crate::consts::ICON_SIZE;

/// Size of a single image page, header included
pub const PAGE_PACKET_SIZE: usize = 8191;
/// Pixels carried by the first page
pub const NUM_FIRST_PAGE_PIXELS: usize = 2583;
/// Pixels carried by the second page
pub const NUM_SECOND_PAGE_PIXELS: usize = 2601;
/// Length of every feature report
pub const FEATURE_REPORT_LEN: usize = 17;

pub const PAGE_ONE_HEADER_LEN: usize = 70;
pub const PAGE_TWO_HEADER_LEN: usize = 16;

/// 72x72, 24 bit BMP header that follows the page one command bytes
const BITMAP_HEADER: [u8; 54] = [
    0x42, 0x4d, 0xf6, 0x3c, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x36, 0x00, 0x00, 0x00, 0x28, 0x00, //
    0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x48, 0x00, //
    0x00, 0x00, 0x01, 0x00, 0x18, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0xc0, 0x3c, 0x00, 0x00, 0xc4, 0x0e, //
    0x00, 0x00, 0xc4, 0x0e, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Both pages of a single key icon, ready to be written in order
pub type Pages = [Vec<u8>; 2];

/// Copy `bytes` into a zeroed buffer of length `N`, truncating if needed
fn padded<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    let len = bytes.len().min(N);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn key_byte(physical_key: usize) -> u8 {
    debug_assert!(physical_key < crate::consts::NUM_KEYS);
    physical_key as u8 + 1
}

/// Command and bitmap header for the first page of a key
pub fn page_one_header(physical_key: usize) -> [u8; PAGE_ONE_HEADER_LEN] {
    let mut buf = [0u8; PAGE_ONE_HEADER_LEN];
    buf[..6].copy_from_slice(&[0x02, 0x01, 0x01, 0x00, 0x00, key_byte(physical_key)]);
    buf[16..].copy_from_slice(&BITMAP_HEADER);
    buf
}

/// Command header for the second page of a key
pub fn page_two_header(physical_key: usize) -> [u8; PAGE_TWO_HEADER_LEN] {
    padded(&[0x02, 0x01, 0x02, 0x00, 0x01, key_byte(physical_key)])
}

/// Concatenate header and payload, zero padded to a full page
fn build_packet(header: &[u8], payload: &[u8]) -> Vec<u8> {
    debug_assert!(header.len() + payload.len() <= PAGE_PACKET_SIZE);
    let mut buf = vec![0u8; PAGE_PACKET_SIZE];
    buf[..header.len()].copy_from_slice(header);
    buf[header.len()..header.len() + payload.len()].copy_from_slice(payload);
    buf
}

fn pages(physical_key: usize, page1: &[u8], page2: &[u8]) -> Pages {
    [
        build_packet(&page_one_header(physical_key), page1),
        build_packet(&page_two_header(physical_key), page2),
    ]
}

/// Encode a solid color for the given physical key
pub fn solid_color(physical_key: usize, r: u8, g: u8, b: u8) -> Pages {
    let pixel = [b, g, r];
    pages(
        physical_key,
        &pixel.repeat(NUM_FIRST_PAGE_PIXELS),
        &pixel.repeat(NUM_SECOND_PAGE_PIXELS),
    )
}

/// Emit BGR triples for a range of pixel offsets, mirrored horizontally
fn mirrored_bgr(image: &RgbImage, offsets: Range<usize>) -> Vec<u8> {
    let width = image.width() as usize;
    offsets
        .flat_map(|offset| {
            let x = width - 1 - (offset % width);
            let y = offset / width;
            let [r, g, b] = image.get_pixel(x as u32, y as u32).0;
            [b, g, r]
        })
        .collect()
}

/// Encode an icon for the given physical key. Must be exactly 72x72.
pub fn icon(physical_key: usize, image: &RgbImage) -> Result<Pages> {
    if image.dimensions() != (ICON_SIZE, ICON_SIZE) {
        let (w, h) = image.dimensions();
        return Err(DeckError::InvalidArgument(format!(
            "image must be {ICON_SIZE}x{ICON_SIZE}, got {w}x{h}"
        )));
    }

    let split = NUM_FIRST_PAGE_PIXELS;
    let end = NUM_FIRST_PAGE_PIXELS + NUM_SECOND_PAGE_PIXELS;
    Ok(pages(
        physical_key,
        &mirrored_bgr(image, 0..split),
        &mirrored_bgr(image, split..end),
    ))
}

/// Construct a payload for resetting the deck back to its logo
pub fn reset() -> [u8; FEATURE_REPORT_LEN] {
    padded(&[0x0b, 0x63])
}

/// Construct a payload for setting the backlight brightness
pub fn brightness(percent: u8) -> Result<[u8; FEATURE_REPORT_LEN]> {
    if percent > 100 {
        return Err(DeckError::InvalidArgument(format!(
            "brightness must be between 0 and 100, got {percent}"
        )));
    }
    Ok(padded(&[0x05, 0x55, 0xaa, 0xd1, 0x01, percent]))
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    const PIXELS: usize = NUM_FIRST_PAGE_PIXELS + NUM_SECOND_PAGE_PIXELS;

    /// Split a page back into BGR triples
    fn decode(packet: &[u8], header_len: usize, count: usize) -> Vec<[u8; 3]> {
        packet[header_len..header_len + count * 3]
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    #[test]
    fn page_split_covers_icon() {
        assert_eq!(PIXELS, (ICON_SIZE * ICON_SIZE) as usize);
        assert!(PAGE_ONE_HEADER_LEN + NUM_FIRST_PAGE_PIXELS * 3 <= PAGE_PACKET_SIZE);
        assert!(PAGE_TWO_HEADER_LEN + NUM_SECOND_PAGE_PIXELS * 3 <= PAGE_PACKET_SIZE);
    }

    #[test]
    fn headers_encode_key_plus_one() {
        let one = page_one_header(4);
        assert_eq!(&one[..6], &[0x02, 0x01, 0x01, 0x00, 0x00, 5]);
        assert!(one[6..16].iter().all(|&b| b == 0));
        assert_eq!(&one[16..20], &[0x42, 0x4d, 0xf6, 0x3c]);
        // width, height and bit depth of the bitmap block
        assert_eq!(one[16 + 18], 72);
        assert_eq!(one[16 + 22], 72);
        assert_eq!(one[16 + 28], 24);

        let two = page_two_header(0);
        assert_eq!(&two[..6], &[0x02, 0x01, 0x02, 0x00, 0x01, 1]);
        assert!(two[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_payload() {
        let mut expected = [0u8; 17];
        expected[0] = 0x0b;
        expected[1] = 0x63;
        assert_eq!(reset(), expected);
    }

    #[test]
    fn brightness_payload() {
        for percent in [0u8, 55, 100] {
            let buf = brightness(percent).unwrap();
            assert_eq!(buf.len(), 17);
            assert_eq!(&buf[..6], &[0x05, 0x55, 0xaa, 0xd1, 0x01, percent]);
            assert!(buf[6..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn brightness_out_of_range() {
        assert!(matches!(brightness(101), Err(DeckError::InvalidArgument(_))));
        assert!(matches!(brightness(255), Err(DeckError::InvalidArgument(_))));
    }

    #[test]
    fn solid_color_pages() {
        let [page1, page2] = solid_color(3, 10, 20, 30);
        assert_eq!(page1.len(), PAGE_PACKET_SIZE);
        assert_eq!(page2.len(), PAGE_PACKET_SIZE);
        assert_eq!(page1[5], 4);
        assert_eq!(page2[5], 4);

        let mut pixels = decode(&page1, PAGE_ONE_HEADER_LEN, NUM_FIRST_PAGE_PIXELS);
        pixels.extend(decode(&page2, PAGE_TWO_HEADER_LEN, NUM_SECOND_PAGE_PIXELS));
        assert_eq!(pixels.len(), PIXELS);
        assert!(pixels.iter().all(|p| *p == [30, 20, 10]));

        // zero padding after the payload
        let end = PAGE_ONE_HEADER_LEN + NUM_FIRST_PAGE_PIXELS * 3;
        assert!(page1[end..].iter().all(|&b| b == 0));
    }

    #[test]
    fn icon_is_mirrored_bgr() {
        let image = RgbImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| Rgb([x as u8, y as u8, 0]));
        let [page1, page2] = icon(0, &image).unwrap();

        let page1 = decode(&page1, PAGE_ONE_HEADER_LEN, NUM_FIRST_PAGE_PIXELS);
        for (p, bgr) in page1.iter().enumerate() {
            let x = 71 - (p % 72);
            let y = p / 72;
            assert_eq!(*bgr, [0, y as u8, x as u8], "page 1 offset {p}");
        }

        let page2 = decode(&page2, PAGE_TWO_HEADER_LEN, NUM_SECOND_PAGE_PIXELS);
        for (q, bgr) in page2.iter().enumerate() {
            let p = NUM_FIRST_PAGE_PIXELS + q;
            let x = 71 - (p % 72);
            let y = p / 72;
            assert_eq!(*bgr, [0, y as u8, x as u8], "page 2 offset {q}");
        }
    }

    #[test]
    fn icon_rejects_wrong_size() {
        let image = RgbImage::new(64, 72);
        assert!(matches!(icon(0, &image), Err(DeckError::InvalidArgument(_))));
    }
}
