//! AVIF decode via `avif-parse` (container) + `rav1d` (AV1 bitstream).
//!
//! The `image` crate's `"avif"` feature only provides the encoder (rav1e).
//! Its decoder needs `"avif-native"`, which links the C dav1d library, so the
//! AV1 payload is handed to `rav1d` (the pure Rust port of dav1d) directly and
//! the resulting YUV planes are converted to RGB here.
//!
//! Only the primary item's colour planes are decoded. An alpha auxiliary
//! item, if present, is ignored.

use super::backend::BackendError;
use super::decode::check_ceiling;
use super::params::Limits;
use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;
use std::io::Cursor;
use std::ptr::NonNull;

fn parse(data: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| BackendError::Decode(format!("invalid avif container: {e:?}")))
}

fn declared_size(avif: &avif_parse::AvifData) -> Result<(u32, u32), BackendError> {
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("invalid avif sequence header: {e:?}")))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Dimensions from the AV1 sequence header, without decoding any frame.
pub fn avif_dimensions(data: &[u8]) -> Result<(u32, u32), BackendError> {
    declared_size(&parse(data)?)
}

pub fn decode_avif(data: &[u8], limits: &Limits) -> Result<DynamicImage, BackendError> {
    let avif = parse(data)?;
    let (width, height) = declared_size(&avif)?;
    check_ceiling(width, height, limits)?;

    let rgb = decode_av1(&avif.primary_item)?;
    check_ceiling(rgb.width(), rgb.height(), limits)?;
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Run one AV1 frame through rav1d. The decoder context is closed on every
/// path, including failures after `dav1d_open`.
fn decode_av1(av1_bytes: &[u8]) -> Result<RgbImage, BackendError> {
    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| BackendError::Decode("rav1d settings allocation failed".into()))?;
    unsafe { dav1d::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    // Requests already run in parallel; one frame needs no extra threads.
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let decoded = (|| {
        let mut input = Dav1dData::default();
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut input), av1_bytes.len()) };
        if buf.is_null() {
            return Err(BackendError::Decode("rav1d data_create failed".into()));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf, av1_bytes.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut input)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut input)) };
            return Err(BackendError::Decode(format!(
                "rav1d rejected the AV1 payload ({})",
                rc.0
            )));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(BackendError::Decode(format!(
                "rav1d produced no picture ({})",
                rc.0
            )));
        }

        let rgb = picture_to_rgb(&pic);
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut pic)) };
        rgb
    })();

    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

fn picture_to_rgb(pic: &Dav1dPicture) -> Result<RgbImage, BackendError> {
    let width = u32::try_from(pic.p.w)
        .map_err(|_| BackendError::Decode(format!("bad picture width {}", pic.p.w)))?;
    let height = u32::try_from(pic.p.h)
        .map_err(|_| BackendError::Decode(format!("bad picture height {}", pic.p.h)))?;
    let bpc = pic.p.bpc as u32;
    let missing =
        |plane: &str| BackendError::Decode(format!("decoded picture has no {plane} plane"));

    let luma = Plane {
        base: pic.data[0].ok_or_else(|| missing("luma"))?.as_ptr() as *const u8,
        stride: pic.stride[0],
        bpc,
    };

    let chroma = match pic.p.layout {
        DAV1D_PIXEL_LAYOUT_I400 => None,
        layout => {
            let subsampling = match layout {
                DAV1D_PIXEL_LAYOUT_I420 => (1, 1),
                DAV1D_PIXEL_LAYOUT_I422 => (1, 0),
                DAV1D_PIXEL_LAYOUT_I444 => (0, 0),
                other => {
                    return Err(BackendError::Decode(format!(
                        "unsupported avif pixel layout {other}"
                    )));
                }
            };
            let plane = |idx: usize, name: &str| -> Result<Plane, BackendError> {
                Ok(Plane {
                    base: pic.data[idx].ok_or_else(|| missing(name))?.as_ptr() as *const u8,
                    stride: pic.stride[1],
                    bpc,
                })
            };
            Some(Chroma {
                cb: plane(1, "cb")?,
                cr: plane(2, "cr")?,
                shift_x: subsampling.0,
                shift_y: subsampling.1,
            })
        }
    };

    let converter = YuvToRgb::new(bpc);
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let luma_value = luma.sample(x, y);
        match &chroma {
            None => converter.gray(luma_value),
            Some(c) => {
                let (cx, cy) = (x >> c.shift_x, y >> c.shift_y);
                converter.color(luma_value, c.cb.sample(cx, cy), c.cr.sample(cx, cy))
            }
        }
    }))
}

/// One decoded plane borrowed from a live `Dav1dPicture`.
struct Plane {
    base: *const u8,
    stride: isize,
    bpc: u32,
}

impl Plane {
    #[inline]
    fn sample(&self, x: u32, y: u32) -> f32 {
        let row = y as isize * self.stride;
        if self.bpc <= 8 {
            (unsafe { *self.base.offset(row + x as isize) }) as f32
        } else {
            // high bit depth samples are stored as native-endian u16
            let ptr = unsafe { self.base.offset(row + x as isize * 2) } as *const u16;
            (unsafe { ptr.read_unaligned() }) as f32
        }
    }
}

struct Chroma {
    cb: Plane,
    cr: Plane,
    shift_x: u32,
    shift_y: u32,
}

/// BT.601 full-range YCbCr to 8-bit RGB.
struct YuvToRgb {
    center: f32,
    scale: f32,
}

impl YuvToRgb {
    fn new(bpc: u32) -> Self {
        let max = ((1u32 << bpc) - 1) as f32;
        Self {
            center: (1u32 << (bpc - 1)) as f32,
            scale: 255.0 / max,
        }
    }

    fn to_u8(&self, v: f32) -> u8 {
        (v * self.scale).round().clamp(0.0, 255.0) as u8
    }

    fn gray(&self, y: f32) -> image::Rgb<u8> {
        let v = self.to_u8(y);
        image::Rgb([v, v, v])
    }

    fn color(&self, y: f32, cb: f32, cr: f32) -> image::Rgb<u8> {
        let cb = cb - self.center;
        let cr = cr - self.center;
        image::Rgb([
            self.to_u8(y + 1.402 * cr),
            self.to_u8(y - 0.344_136 * cb - 0.714_136 * cr),
            self.to_u8(y + 1.772 * cb),
        ])
    }
}
