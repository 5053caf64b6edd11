//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use imgforge::imaging::{EncodeParams, ImageFormat, Quality};
use img_parts::jpeg::{Jpeg, JpegSegment, markers};
use img_parts::png::{Png, PngChunk};

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    }))
}

pub fn encode(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let params = EncodeParams {
        format,
        quality: Quality::new(90).unwrap(),
        avif_speed: 10,
    };
    format.encode(&gradient(width, height), &params).unwrap()
}

/// Exif segment body: big-endian TIFF with `Make = "Canon"` and no
/// orientation change, so dimensions survive decode unchanged.
fn exif_tiff() -> Vec<u8> {
    let mut tiff = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&6u32.to_be_bytes());
    tiff.extend_from_slice(&26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(b"Canon\x00");
    tiff
}

const XMP: &[u8] =
    b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">exif:GPSLatitude=\"48,51.4N\"</x:xmpmeta>";

pub fn jpeg_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(encode(ImageFormat::Jpeg, width, height))).unwrap();
    let mut exif = b"Exif\x00\x00".to_vec();
    exif.extend_from_slice(&exif_tiff());
    let mut xmp = b"http://ns.adobe.com/xap/1.0/\x00".to_vec();
    xmp.extend_from_slice(XMP);
    jpeg.segments_mut()
        .insert(1, JpegSegment::new_with_contents(markers::APP1, Bytes::from(exif)));
    jpeg.segments_mut()
        .insert(2, JpegSegment::new_with_contents(markers::APP1, Bytes::from(xmp)));
    jpeg.encoder().bytes().to_vec()
}

pub fn png_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let mut png = Png::from_bytes(Bytes::from(encode(ImageFormat::Png, width, height))).unwrap();
    let mut itxt = b"XML:com.adobe.xmp\x00\x00\x00\x00\x00".to_vec();
    itxt.extend_from_slice(XMP);
    png.chunks_mut()
        .insert(1, PngChunk::new(*b"eXIf", Bytes::from(exif_tiff())));
    png.chunks_mut()
        .insert(2, PngChunk::new(*b"iTXt", Bytes::from(itxt)));
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

/// Extended WebP: VP8X with the EXIF and XMP flags, the lossy bitstream,
/// then `EXIF` and `XMP ` chunks.
pub fn webp_with_metadata(width: u32, height: u32) -> Vec<u8> {
    let simple = encode(ImageFormat::WebP, width, height);
    let mut vp8x = vec![0x08 | 0x04, 0, 0, 0];
    vp8x.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    vp8x.extend_from_slice(&(height - 1).to_le_bytes()[..3]);

    let mut body = b"WEBP".to_vec();
    riff_chunk(&mut body, b"VP8X", &vp8x);
    body.extend_from_slice(&simple[12..]);
    riff_chunk(&mut body, b"EXIF", &exif_tiff());
    riff_chunk(&mut body, b"XMP ", XMP);

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// No EXIF, no XMP, no GPS text anywhere in the bytes.
pub fn assert_no_metadata(data: &[u8]) {
    assert!(!contains(data, b"Exif\x00\x00"), "EXIF header survived");
    assert!(!contains(data, b"eXIf"), "eXIf chunk survived");
    assert!(!contains(data, b"EXIF"), "EXIF chunk survived");
    assert!(!contains(data, b"Canon"), "camera make survived");
    assert!(!contains(data, b"ns.adobe.com/xap"), "XMP survived");
    assert!(!contains(data, b"adobe:ns:meta"), "XMP packet survived");
    assert!(!contains(data, b"GPSLatitude"), "GPS survived");
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    ImageFormat::sniff(data).unwrap().dimensions(data).unwrap()
}
