//! Metadata stripping and detection.
//!
//! Stripping works at the container level with `img-parts`: the encoded
//! image is split into segments/chunks, everything ancillary is dropped and
//! the container is reassembled. Pixel data is never touched, so stripping
//! an image twice is a no-op and stripping never changes how it decodes.
//!
//! ## What is removed
//!
//! | Container | Removed | Kept |
//! |---|---|---|
//! | JPEG | APP1-APP13, APP15, COM | APP0 (JFIF), APP14 (Adobe colour transform) |
//! | PNG | eXIf, iTXt, tEXt, zTXt, iCCP, tIME | critical chunks, gAMA/cHRM/sRGB/pHYs |
//! | WebP | EXIF, XMP, ICCP | bitstream, ALPH, ANIM/ANMF |
//! | AVIF | none (verified absent) | everything |
//!
//! ICC profiles go with the rest. Pixels are not converted to sRGB first, so
//! a wide-gamut original (Display P3, Adobe RGB) loses saturation once its
//! profile is gone.
//!
//! AVIF output comes from rav1e, which writes no Exif or XMP items, so for
//! AVIF the stripper only verifies that and fails loudly otherwise. The check
//! reads the item declarations in `meta/iinf`, never the coded payload.

use super::backend::BackendError;
use super::format::ImageFormat;
use img_parts::jpeg::{Jpeg, markers};
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageICC};

/// Kinds of ancillary metadata that can ride along in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKind {
    Exif,
    Xmp,
    Icc,
    Iptc,
    Text,
    Comment,
    Timestamp,
}

impl std::fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Exif => "EXIF",
            Self::Xmp => "XMP",
            Self::Icc => "ICC profile",
            Self::Iptc => "IPTC",
            Self::Text => "text",
            Self::Comment => "comment",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_PREFIX: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const ICC_PREFIX: &[u8] = b"ICC_PROFILE\0";
const PNG_XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp\0";
const AVIF_XMP_MIME: &[u8] = b"application/rdf+xml";

const PNG_STRIPPED_CHUNKS: [[u8; 4]; 6] =
    [*b"eXIf", *b"iTXt", *b"tEXt", *b"zTXt", *b"iCCP", *b"tIME"];
const WEBP_EXIF: [u8; 4] = *b"EXIF";
const WEBP_XMP: [u8; 4] = *b"XMP ";

fn strip_failed(format: ImageFormat, e: impl std::fmt::Display) -> BackendError {
    BackendError::Metadata(format!("{format}: {e}"))
}

fn is_stripped_jpeg_marker(marker: u8) -> bool {
    (markers::APP1..=markers::APP13).contains(&marker)
        || marker == markers::APP15
        || marker == markers::COM
}

/// Remove all ancillary metadata from an encoded image.
pub fn strip(format: ImageFormat, data: Vec<u8>) -> Result<Vec<u8>, BackendError> {
    let bytes = Bytes::from(data);
    match format {
        ImageFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(bytes).map_err(|e| strip_failed(format, e))?;
            jpeg.segments_mut()
                .retain(|segment| !is_stripped_jpeg_marker(segment.marker()));
            Ok(jpeg.encoder().bytes().to_vec())
        }
        ImageFormat::Png => {
            let mut png = Png::from_bytes(bytes).map_err(|e| strip_failed(format, e))?;
            png.chunks_mut()
                .retain(|chunk| !PNG_STRIPPED_CHUNKS.contains(&chunk.kind()));
            Ok(png.encoder().bytes().to_vec())
        }
        ImageFormat::WebP => {
            let mut webp = WebP::from_bytes(bytes).map_err(|e| strip_failed(format, e))?;
            webp.set_icc_profile(None);
            webp.remove_chunks_by_id(WEBP_EXIF);
            webp.remove_chunks_by_id(WEBP_XMP);
            Ok(webp.encoder().bytes().to_vec())
        }
        ImageFormat::Avif => {
            let found = find_metadata(format, &bytes);
            if found.is_empty() {
                Ok(bytes.to_vec())
            } else {
                Err(strip_failed(
                    format,
                    format!("encoder emitted metadata items: {found:?}"),
                ))
            }
        }
    }
}

/// List the ancillary metadata present in an encoded image, in container
/// order with duplicates removed. Unparseable input reports nothing.
pub fn find_metadata(format: ImageFormat, data: &[u8]) -> Vec<MetadataKind> {
    let mut found = match format {
        ImageFormat::Jpeg => jpeg_metadata(data),
        ImageFormat::Png => png_metadata(data),
        ImageFormat::WebP => webp_metadata(data),
        ImageFormat::Avif => avif_metadata(data),
    };
    let mut seen = Vec::with_capacity(found.len());
    found.retain(|kind| {
        if seen.contains(kind) {
            false
        } else {
            seen.push(*kind);
            true
        }
    });
    found
}

fn jpeg_metadata(data: &[u8]) -> Vec<MetadataKind> {
    let Ok(jpeg) = Jpeg::from_bytes(Bytes::copy_from_slice(data)) else {
        return Vec::new();
    };
    jpeg.segments()
        .iter()
        .filter_map(|segment| {
            let contents = segment.contents();
            match segment.marker() {
                markers::APP1 if contents.starts_with(EXIF_PREFIX) => Some(MetadataKind::Exif),
                markers::APP1
                    if contents.starts_with(XMP_PREFIX)
                        || contents.starts_with(XMP_EXTENSION_PREFIX) =>
                {
                    Some(MetadataKind::Xmp)
                }
                markers::APP2 if contents.starts_with(ICC_PREFIX) => Some(MetadataKind::Icc),
                markers::APP13 => Some(MetadataKind::Iptc),
                markers::COM => Some(MetadataKind::Comment),
                m if is_stripped_jpeg_marker(m) => Some(MetadataKind::Text),
                _ => None,
            }
        })
        .collect()
}

fn png_metadata(data: &[u8]) -> Vec<MetadataKind> {
    let Ok(png) = Png::from_bytes(Bytes::copy_from_slice(data)) else {
        return Vec::new();
    };
    png.chunks()
        .iter()
        .filter_map(|chunk| match &chunk.kind() {
            b"eXIf" => Some(MetadataKind::Exif),
            b"iTXt" if chunk.contents().starts_with(PNG_XMP_KEYWORD) => Some(MetadataKind::Xmp),
            b"iTXt" | b"tEXt" | b"zTXt" => Some(MetadataKind::Text),
            b"iCCP" => Some(MetadataKind::Icc),
            b"tIME" => Some(MetadataKind::Timestamp),
            _ => None,
        })
        .collect()
}

fn webp_metadata(data: &[u8]) -> Vec<MetadataKind> {
    let Ok(webp) = WebP::from_bytes(Bytes::copy_from_slice(data)) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if webp.chunk_by_id(WEBP_EXIF).is_some() {
        found.push(MetadataKind::Exif);
    }
    if webp.chunk_by_id(WEBP_XMP).is_some() {
        found.push(MetadataKind::Xmp);
    }
    if webp.icc_profile().is_some() {
        found.push(MetadataKind::Icc);
    }
    found
}

/// ISOBMFF item scan: metadata items are declared in `meta/iinf` as `infe`
/// entries of type `Exif`, or `mime` with an RDF/XML content type.
fn avif_metadata(data: &[u8]) -> Vec<MetadataKind> {
    item_types(data).unwrap_or_default()
}

fn item_types(data: &[u8]) -> Option<Vec<MetadataKind>> {
    let meta = full_box_body(find_box(data, b"meta")?)?;
    let iinf = find_box(meta, b"iinf")?;
    let entry_count_len = if *iinf.first()? == 0 { 2 } else { 4 };
    let entries = full_box_body(iinf)?.get(entry_count_len..)?;

    let mut found = Vec::new();
    for (kind, infe) in iso_boxes(entries) {
        if &kind != b"infe" {
            continue;
        }
        let version = *infe.first()?;
        if version < 2 {
            continue;
        }
        // item_ID, item_protection_index, then the item type
        let id_len = if version == 2 { 2 } else { 4 };
        let type_at = 4 + id_len + 2;
        let item_type = infe.get(type_at..type_at + 4)?;
        match item_type {
            b"Exif" => found.push(MetadataKind::Exif),
            b"mime" => {
                // item_name and content_type, both NUL-terminated
                let mut strings = infe.get(type_at + 4..)?.split(|&b| b == 0);
                strings.next();
                if strings.next().is_some_and(|ct| ct.starts_with(AVIF_XMP_MIME)) {
                    found.push(MetadataKind::Xmp);
                }
            }
            _ => {}
        }
    }
    Some(found)
}

/// Body of the first box of `kind` at this level.
fn find_box<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    iso_boxes(data).find(|(k, _)| k == kind).map(|(_, body)| body)
}

/// Skip the version and flags word of a full box.
fn full_box_body(body: &[u8]) -> Option<&[u8]> {
    body.get(4..)
}

/// Boxes at one level. Iteration stops at the first malformed header.
fn iso_boxes<'a>(mut data: &'a [u8]) -> impl Iterator<Item = ([u8; 4], &'a [u8])> {
    std::iter::from_fn(move || {
        let current: &'a [u8] = data;
        let size = u32::from_be_bytes(current.get(0..4)?.try_into().ok()?);
        let kind: [u8; 4] = current.get(4..8)?.try_into().ok()?;
        let (header, total) = match size {
            0 => (8, current.len()),
            1 => {
                let large = u64::from_be_bytes(current.get(8..16)?.try_into().ok()?);
                (16, usize::try_from(large).ok()?)
            }
            n => (8, n as usize),
        };
        if total < header {
            return None;
        }
        let body = current.get(header..total)?;
        data = &current[total..];
        Some((kind, body))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Limits;
    use crate::test_helpers::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn assert_clean(format: ImageFormat, data: &[u8]) {
        assert_eq!(find_metadata(format, data), Vec::<MetadataKind>::new());
        assert!(!contains(data, EXIF_PREFIX), "EXIF bytes survived");
        assert!(!contains(data, &WEBP_EXIF), "EXIF chunk survived");
        assert!(!contains(data, b"Canon"), "camera make survived");
        assert!(!contains(data, b"ns.adobe.com/xap"), "XMP bytes survived");
        assert!(!contains(data, b"GPS"), "GPS marker survived");
    }

    fn iso_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    /// `infe` version 2: flags, item_ID, protection index, type, name.
    fn infe(id: u16, item_type: &[u8; 4], tail: &[u8]) -> Vec<u8> {
        let mut body = vec![2, 0, 0, 0];
        body.extend_from_slice(&id.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(item_type);
        body.extend_from_slice(b"\0");
        body.extend_from_slice(tail);
        iso_box(b"infe", &body)
    }

    /// A container with an image item plus Exif and XMP items declared.
    fn avif_with_metadata_items() -> Vec<u8> {
        let mut iinf = vec![0, 0, 0, 0];
        iinf.extend_from_slice(&3u16.to_be_bytes());
        iinf.extend(infe(1, b"av01", b""));
        iinf.extend(infe(2, b"Exif", b""));
        iinf.extend(infe(3, b"mime", b"application/rdf+xml\0"));

        let mut meta = vec![0, 0, 0, 0];
        meta.extend(iso_box(b"iinf", &iinf));

        let mut data = iso_box(b"ftyp", b"avif\0\0\0\0avifmif1");
        data.extend(iso_box(b"meta", &meta));
        data.extend(iso_box(b"mdat", &[0u8; 16]));
        data
    }

    // =========================================================================
    // JPEG
    // =========================================================================

    #[test]
    fn detects_jpeg_metadata() {
        let data = jpeg_with_metadata(32, 24);
        assert_eq!(
            find_metadata(ImageFormat::Jpeg, &data),
            vec![
                MetadataKind::Exif,
                MetadataKind::Xmp,
                MetadataKind::Icc,
                MetadataKind::Comment,
            ]
        );
    }

    #[test]
    fn strips_jpeg_and_keeps_it_decodable() {
        let stripped = strip(ImageFormat::Jpeg, jpeg_with_metadata(32, 24)).unwrap();
        assert_clean(ImageFormat::Jpeg, &stripped);

        let img = ImageFormat::Jpeg
            .decode(&stripped, &Limits::default())
            .unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
    }

    #[test]
    fn jpeg_keeps_jfif_segment() {
        let stripped = strip(ImageFormat::Jpeg, jpeg_with_metadata(8, 8)).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::from(stripped)).unwrap();
        assert!(jpeg.segments().iter().any(|s| s.marker() == markers::APP0));
    }

    // =========================================================================
    // PNG
    // =========================================================================

    #[test]
    fn detects_png_metadata() {
        let found = find_metadata(ImageFormat::Png, &png_with_metadata(16, 16));
        assert!(found.contains(&MetadataKind::Exif));
        assert!(found.contains(&MetadataKind::Xmp));
        assert!(found.contains(&MetadataKind::Text));
    }

    #[test]
    fn strips_png() {
        let stripped = strip(ImageFormat::Png, png_with_metadata(16, 16)).unwrap();
        assert_clean(ImageFormat::Png, &stripped);
        assert!(
            ImageFormat::Png
                .decode(&stripped, &Limits::default())
                .is_ok()
        );
    }

    // =========================================================================
    // WebP
    // =========================================================================

    #[test]
    fn detects_webp_metadata() {
        let found = find_metadata(ImageFormat::WebP, &webp_with_metadata(12, 12));
        assert_eq!(found, vec![MetadataKind::Exif, MetadataKind::Xmp]);
    }

    #[test]
    fn strips_webp() {
        let stripped = strip(ImageFormat::WebP, webp_with_metadata(12, 12)).unwrap();
        assert_clean(ImageFormat::WebP, &stripped);
        let img = ImageFormat::WebP
            .decode(&stripped, &Limits::default())
            .unwrap();
        assert_eq!((img.width(), img.height()), (12, 12));
    }

    // =========================================================================
    // AVIF and general behaviour
    // =========================================================================

    #[test]
    fn encoded_avif_is_already_clean() {
        let data = avif_bytes(16, 16);
        assert_eq!(strip(ImageFormat::Avif, data.clone()).unwrap(), data);
    }

    #[test]
    fn avif_metadata_items_are_found_in_iinf() {
        assert_eq!(
            find_metadata(ImageFormat::Avif, &avif_with_metadata_items()),
            vec![MetadataKind::Exif, MetadataKind::Xmp]
        );
    }

    #[test]
    fn avif_with_exif_item_is_refused() {
        assert!(matches!(
            strip(ImageFormat::Avif, avif_with_metadata_items()),
            Err(BackendError::Metadata(_))
        ));
    }

    #[test]
    fn exif_bytes_in_coded_payload_are_not_metadata() {
        let mut data = avif_bytes(32, 32);
        // mdat is the last box, so this lands in the AV1 payload
        let at = data.len() - 8;
        data[at..at + 4].copy_from_slice(b"Exif");
        assert!(find_metadata(ImageFormat::Avif, &data).is_empty());
        assert_eq!(strip(ImageFormat::Avif, data.clone()).unwrap(), data);
    }

    #[test]
    fn strip_is_idempotent() {
        let once = strip(ImageFormat::Png, png_with_metadata(8, 8)).unwrap();
        let twice = strip(ImageFormat::Png, once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn clean_encoder_output_reports_nothing() {
        assert!(find_metadata(ImageFormat::Jpeg, &jpeg_bytes(8, 8)).is_empty());
        assert!(find_metadata(ImageFormat::Png, &png_bytes(8, 8)).is_empty());
        assert!(find_metadata(ImageFormat::WebP, &webp_bytes(8, 8)).is_empty());
        assert!(find_metadata(ImageFormat::Avif, &avif_bytes(8, 8)).is_empty());
    }

    #[test]
    fn garbage_fails_to_strip() {
        let result = strip(ImageFormat::Png, b"not a png at all".to_vec());
        assert!(matches!(result, Err(BackendError::Metadata(_))));
    }
}
