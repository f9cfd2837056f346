use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use batch_caption::{DecodeError, DecodeLimits, FormatKind, FormatLoader};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn loader() -> FormatLoader {
    FormatLoader::with_default_formats(DecodeLimits::unbounded())
}

/// Single-image RGB document with raw planes and no layers.
fn write_psd(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> std::io::Result<()> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"8BPS");
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&[0; 6]);
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&8u16.to_be_bytes());
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.extend_from_slice(&[0; 12]);
    bytes.extend_from_slice(&0u16.to_be_bytes());
    for value in rgb {
        bytes.extend(std::iter::repeat(value).take((width * height) as usize));
    }
    fs::write(path, bytes)
}

/// Uncompressed little-endian DNG with a 2x2 RGGB mosaic of 16-bit samples.
fn write_dng(path: &Path, width: u32, height: u32) -> std::io::Result<()> {
    const BYTE: u16 = 1;
    const ASCII: u16 = 2;
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    const RATIONAL: u16 = 5;
    const SRATIONAL: u16 = 10;

    let short = |v: u16| v.to_le_bytes().to_vec();
    let long = |v: u32| v.to_le_bytes().to_vec();
    fn ratios(values: &[(i32, i32)]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
            .collect()
    }
    let identity = ratios(&[(1, 1), (0, 1), (0, 1), (0, 1), (1, 1), (0, 1), (0, 1), (0, 1), (1, 1)]);

    let strip_len = width * height * 2;
    // (tag, type, count, value bytes); strip offset is patched below
    let mut entries: Vec<(u16, u16, u32, Vec<u8>)> = vec![
        (254, LONG, 1, long(0)),
        (256, LONG, 1, long(width)),
        (257, LONG, 1, long(height)),
        (258, SHORT, 1, short(16)),
        (259, SHORT, 1, short(1)),
        (262, SHORT, 1, short(32803)),
        (271, ASCII, 8, b"Fixture\0".to_vec()),
        (272, ASCII, 8, b"Bayer16\0".to_vec()),
        (273, LONG, 1, long(0)),
        (274, SHORT, 1, short(1)),
        (277, SHORT, 1, short(1)),
        (278, LONG, 1, long(height)),
        (279, LONG, 1, long(strip_len)),
        (284, SHORT, 1, short(1)),
        (33421, SHORT, 2, [short(2), short(2)].concat()),
        (33422, BYTE, 4, vec![0, 1, 1, 2]),
        (50706, BYTE, 4, vec![1, 4, 0, 0]),
        (50708, ASCII, 16, b"Fixture Bayer16\0".to_vec()),
        (50714, LONG, 1, long(0)),
        (50717, LONG, 1, long(4095)),
        (50721, SRATIONAL, 9, identity.clone()),
        (50722, SRATIONAL, 9, identity),
        (50728, RATIONAL, 3, ratios(&[(1, 1), (1, 1), (1, 1)])),
        (50778, SHORT, 1, short(17)),
        (50779, SHORT, 1, short(21)),
    ];

    let ifd_len = 2 + entries.len() * 12 + 4;
    let data_start = 8 + ifd_len;
    let overflow_len: usize = entries
        .iter()
        .filter(|entry| entry.3.len() > 4)
        .map(|entry| entry.3.len().next_multiple_of(2))
        .sum();
    let strip_offset = (data_start + overflow_len) as u32;
    if let Some(entry) = entries.iter_mut().find(|entry| entry.0 == 273) {
        entry.3 = long(strip_offset);
    }

    let mut ifd = Vec::new();
    let mut overflow = Vec::new();
    ifd.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, count, value) in &entries {
        ifd.extend_from_slice(&tag.to_le_bytes());
        ifd.extend_from_slice(&kind.to_le_bytes());
        ifd.extend_from_slice(&count.to_le_bytes());
        if value.len() > 4 {
            let offset = (data_start + overflow.len()) as u32;
            ifd.extend_from_slice(&offset.to_le_bytes());
            overflow.extend_from_slice(value);
            if overflow.len() % 2 == 1 {
                overflow.push(0);
            }
        } else {
            let mut inline = value.clone();
            inline.resize(4, 0);
            ifd.extend_from_slice(&inline);
        }
    }
    ifd.extend_from_slice(&0u32.to_le_bytes());

    let mut bytes = b"II".to_vec();
    bytes.extend_from_slice(&42u16.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());
    bytes.extend_from_slice(&ifd);
    bytes.extend_from_slice(&overflow);
    for y in 0..height {
        for x in 0..width {
            let sample: u16 = 1024 + ((x * 37 + y * 53) % 2048) as u16;
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }
    fs::write(path, bytes)
}

#[test]
fn raster_formats_load_as_rgb() -> TestResult {
    let temp_dir = TempDir::new()?;
    let cases = [
        ("a.png", ImageFormat::Png),
        ("b.jpg", ImageFormat::Jpeg),
        ("c.JPEG", ImageFormat::Jpeg),
        ("d.tif", ImageFormat::Tiff),
        ("e.tiff", ImageFormat::Tiff),
    ];

    for (name, format) in cases {
        let path = temp_dir.path().join(name);
        DynamicImage::new_rgb8(7, 5).save_with_format(&path, format)?;

        let asset = loader().load(&path)?;
        assert_eq!(asset.kind, FormatKind::RasterStandard, "{name}");
        assert_eq!(asset.dimensions(), (7, 5), "{name}");
    }
    Ok(())
}

#[test]
fn transparent_png_drops_alpha() -> TestResult {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("sprite.png");
    RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 0])).save(&path)?;

    let asset = loader().load(&path)?;
    assert_eq!(asset.pixels.get_pixel(0, 0).0, [10, 20, 30]);
    Ok(())
}

#[test]
fn layered_document_loads_as_rgb() -> TestResult {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("poster.PSD");
    write_psd(&path, 4, 3, [200, 150, 100])?;

    let asset = loader().load(&path)?;
    assert_eq!(asset.kind, FormatKind::CompositeLayered);
    assert_eq!(asset.dimensions(), (4, 3));
    assert_eq!(asset.pixels.get_pixel(3, 2).0, [200, 150, 100]);
    Ok(())
}

#[test]
fn raw_extensions_dispatch_to_the_sensor_pipeline() -> TestResult {
    let temp_dir = TempDir::new()?;

    for name in ["DSC_0001.NEF", "IMG_0002.cr2", "A7_0003.ARW", "pixel.dng"] {
        let path = temp_dir.path().join(name);
        fs::write(&path, b"not sensor data")?;

        assert_eq!(loader().classify(&path), Some(FormatKind::RawSensor));
        let err = loader().load(&path).unwrap_err();
        assert!(
            matches!(
                err,
                DecodeError::Corrupt {
                    kind: FormatKind::RawSensor,
                    ..
                }
            ),
            "{name}: {err}"
        );
    }
    Ok(())
}

#[test]
fn dng_sensor_data_decodes_to_rgb() -> TestResult {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("bayer.DNG");
    write_dng(&path, 32, 24)?;

    let asset = loader().load(&path)?;
    assert_eq!(asset.kind, FormatKind::RawSensor);
    let (width, height) = asset.dimensions();
    assert!(width > 0 && height > 0, "{width}x{height}");
    assert_eq!(
        asset.pixels.as_raw().len(),
        width as usize * height as usize * 3
    );
    Ok(())
}

#[test]
fn unsupported_extension_fails_before_reading() {
    let err = loader().load(Path::new("photo.bmp")).unwrap_err();
    assert!(matches!(err, DecodeError::UnsupportedFormat { .. }));

    let err = loader().load(Path::new("no_extension")).unwrap_err();
    assert!(matches!(err, DecodeError::UnsupportedFormat { .. }));
}

#[test]
fn large_images_load_without_a_ceiling() -> TestResult {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("panorama.png");
    DynamicImage::new_rgb8(6000, 2).save(&path)?;

    assert_eq!(loader().load(&path)?.dimensions(), (6000, 2));

    let bounded = FormatLoader::with_default_formats(DecodeLimits::with_max_pixels(1000));
    assert!(matches!(
        bounded.load(&path),
        Err(DecodeError::ResourceLimit { .. })
    ));
    Ok(())
}
