use std::fs::File;
use std::io::{BufWriter, Cursor, ErrorKind, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};

use crate::error::{DecodeError, EncodeError};

/// JPEG quality used for every persisted output.
pub const DEFAULT_QUALITY: u8 = 95;

/// Read and decode an image file into an upright RGBA buffer.
///
/// The EXIF orientation tag, when present, is applied so that callers never
/// see a sideways or mirrored photo.
pub fn decode(path: &Path) -> Result<RgbaImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DecodeError::NotFound(path.to_path_buf()),
        _ => DecodeError::InvalidFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let image = image::load_from_memory(&bytes).map_err(|e| DecodeError::InvalidFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "image dimensions are zero".to_string(),
        });
    }

    let orientation = read_orientation(&bytes);
    log::debug!(
        "decoded {}: {}x{} orientation={}",
        path.display(),
        image.width(),
        image.height(),
        orientation
    );
    Ok(upright(image, orientation).into_rgba8())
}

/// EXIF orientation tag of an encoded image, `1` (normal) when absent.
pub fn read_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(reader) => reader,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation value.
///
/// 1 = normal, 2 = mirrored, 3 = 180°, 4 = flipped vertically,
/// 5 = mirrored + 90° CW, 6 = 90° CW, 7 = mirrored + 270° CW, 8 = 270° CW.
/// Anything else is left untouched.
pub fn upright(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Write `image` as a JPEG at `quality` (1-100), creating parent directories.
///
/// Transparent pixels are composited onto white. The write only counts as
/// successful if the file is non-empty afterwards.
pub fn encode(image: &RgbaImage, path: &Path, quality: u8) -> Result<(), EncodeError> {
    let failed = |reason: String| EncodeError::WriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
    }

    let rgb = flatten_alpha(image);
    let file = File::create(path).map_err(|e| failed(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100))
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| failed(e.to_string()))?;
    writer.flush().map_err(|e| failed(e.to_string()))?;
    drop(writer);

    let written = std::fs::metadata(path).map_err(|e| failed(e.to_string()))?.len();
    if written == 0 {
        return Err(failed("file is empty after write".to_string()));
    }
    log::debug!(
        "encoded {}x{} jpeg ({} bytes) to {}",
        rgb.width(),
        rgb.height(),
        written,
        path.display()
    );
    Ok(())
}

fn flatten_alpha(image: &RgbaImage) -> RgbImage {
    let mut rgb = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let over_white = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    rgb
}
