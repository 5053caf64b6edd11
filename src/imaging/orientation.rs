//! EXIF orientation normalization.
//!
//! Cameras store pixels in sensor order and record the intended rotation in
//! the EXIF `Orientation` tag. Once EXIF is stripped that hint is gone, so the
//! rotation is baked into the pixels right after decode.

use image::DynamicImage;
use std::io::Cursor;

/// Read the EXIF orientation (1-8) from any container kamadak-exif
/// understands. Missing, unreadable or out-of-range tags read as `None`.
pub fn read_orientation(data: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = u16::try_from(field.value.get_uint(0)?).ok()?;
    (1..=8).contains(&value).then_some(value)
}

/// Rotate/flip `img` so that it displays upright without the tag.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        // mirror across the main diagonal
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        // mirror across the anti-diagonal
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Decode-side helper: apply whatever orientation `source` declares.
pub fn normalize(img: DynamicImage, source: &[u8]) -> DynamicImage {
    match read_orientation(source) {
        Some(orientation) => apply_orientation(img, orientation),
        None => img,
    }
}
