//! Synthetic images for unit tests.
//!
//! Every fixture is built in memory from a gradient so tests need no files
//! on disk. The `*_with_metadata` builders splice real container-level
//! metadata (EXIF with an orientation tag, XMP carrying a GPS field, ICC,
//! comments) into otherwise clean encoder output.

use crate::imaging::{EncodeParams, ImageFormat, Quality};
use bytes::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use img_parts::jpeg::{Jpeg, JpegSegment, markers};
use img_parts::png::{Png, PngChunk};

// =========================================================================
// Clean images
// =========================================================================

/// A smooth RGB gradient; compresses realistically in every codec.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

fn encoded(format: ImageFormat, width: u32, height: u32, avif_speed: u8) -> Vec<u8> {
    let params = EncodeParams {
        format,
        quality: Quality::new(90).unwrap(),
        avif_speed,
    };
    format.encode(&gradient(width, height), &params).unwrap()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(ImageFormat::Jpeg, width, height, 4)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(ImageFormat::Png, width, height, 4)
}

pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(ImageFormat::WebP, width, height, 4)
}

/// AVIF at the fastest encoder speed.
pub fn avif_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded(ImageFormat::Avif, width, height, 10)
}

/// A JPEG cut off halfway through its entropy-coded data: SOS present,
/// EOI missing.
pub fn truncated_jpeg() -> Vec<u8> {
    let mut data = jpeg_bytes(64, 64);
    let sos = data
        .windows(2)
        .rposition(|w| w == [0xFF, 0xDA])
        .unwrap();
    data.truncate(sos + (data.len() - sos) / 2);
    data
}

// =========================================================================
// Metadata payloads
// =========================================================================

/// Big-endian TIFF with IFD0 holding `Make = "Canon"` and `Orientation = 6`.
pub fn tiff_payload() -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    tiff.extend_from_slice(&2u16.to_be_bytes());
    // Make, ASCII, 6 bytes at offset 38 (8 header + 2 count + 24 entries + 4 next)
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&6u32.to_be_bytes());
    tiff.extend_from_slice(&38u32.to_be_bytes());
    // Orientation, SHORT, inline value 6
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&[0x00, 0x06, 0x00, 0x00]);
    // no next IFD
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(b"Canon\x00");
    tiff
}

pub fn xmp_packet() -> Vec<u8> {
    b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:RDF \
      xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\
      <rdf:Description xmlns:exif=\"http://ns.adobe.com/exif/1.0/\" \
      exif:GPSLatitude=\"48,51.4N\" exif:GPSLongitude=\"2,17.4E\"/>\
      </rdf:RDF></x:xmpmeta>"
        .to_vec()
}

// =========================================================================
// Images carrying metadata
// =========================================================================

/// JPEG with, after APP0: APP1 EXIF, APP1 XMP, APP2 ICC, COM.
pub fn jpeg_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_bytes(width, height))).unwrap();

    let mut exif = b"Exif\x00\x00".to_vec();
    exif.extend_from_slice(&tiff_payload());

    let mut xmp = b"http://ns.adobe.com/xap/1.0/\x00".to_vec();
    xmp.extend_from_slice(&xmp_packet());

    let mut icc = b"ICC_PROFILE\x00\x01\x01".to_vec();
    icc.extend_from_slice(&[0u8; 128]);

    let segments = [
        (markers::APP1, exif),
        (markers::APP1, xmp),
        (markers::APP2, icc),
        (markers::COM, b"shot on a tripod".to_vec()),
    ];
    let after_app0 = jpeg
        .segments()
        .iter()
        .position(|s| s.marker() == markers::APP0)
        .map_or(0, |i| i + 1);
    for (offset, (marker, contents)) in segments.into_iter().enumerate() {
        jpeg.segments_mut().insert(
            after_app0 + offset,
            JpegSegment::new_with_contents(marker, Bytes::from(contents)),
        );
    }
    jpeg.encoder().bytes().to_vec()
}

/// PNG with eXIf, tEXt and an XMP iTXt chunk right after IHDR.
pub fn png_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let mut png = Png::from_bytes(Bytes::from(png_bytes(width, height))).unwrap();

    let mut itxt = b"XML:com.adobe.xmp\x00\x00\x00\x00\x00".to_vec();
    itxt.extend_from_slice(&xmp_packet());

    let chunks = [
        PngChunk::new(*b"eXIf", Bytes::from(tiff_payload())),
        PngChunk::new(*b"tEXt", Bytes::from_static(b"Comment\x00shot on a tripod")),
        PngChunk::new(*b"iTXt", Bytes::from(itxt)),
    ];
    for (offset, chunk) in chunks.into_iter().enumerate() {
        png.chunks_mut().insert(1 + offset, chunk);
    }
    png.encoder().bytes().to_vec()
}

fn riff_chunk(out: &mut Vec<u8>, id: &[u8; 4], contents: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes());
    out.extend_from_slice(contents);
    if contents.len() % 2 == 1 {
        out.push(0);
    }
}

fn u24_le(value: u32) -> [u8; 3] {
    let b = value.to_le_bytes();
    [b[0], b[1], b[2]]
}

/// Extended-format WebP (VP8X) carrying EXIF and XMP chunks, no ICC.
pub fn webp_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let simple = webp_bytes(width, height);
    // "RIFF" size "WEBP", then the single VP8/VP8L chunk
    let image_chunk = &simple[12..];

    let mut vp8x = vec![0x08 | 0x04, 0, 0, 0];
    vp8x.extend_from_slice(&u24_le(width - 1));
    vp8x.extend_from_slice(&u24_le(height - 1));

    let mut body = b"WEBP".to_vec();
    riff_chunk(&mut body, b"VP8X", &vp8x);
    body.extend_from_slice(image_chunk);
    riff_chunk(&mut body, b"EXIF", &tiff_payload());
    riff_chunk(&mut body, b"XMP ", &xmp_packet());

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}
