//! Integration tests: synthesize FITS files, decode them, and run the display
//! stretch, photometry and WCS stages on the result.


use fits_builder::{add_noise, add_tan_wcs, gaussian_star, FitsBuilder};
use fitsview::fits::{self, Bitpix, PixelData};
use fitsview::photometry::{compute_adaptive_fwhm, compute_fwhm, AdaptiveFwhmConfig, FwhmConfig};
use fitsview::wcs::Wcs;
use fitsview::zscale::{display_levels, ZscaleConfig};
use fitsview::{Error, FormatError};

const GAUSSIAN_FWHM_PER_SIGMA: f64 = 2.354_820_045;

/// 128×128 unsigned 16-bit frame (BZERO = 32768) with one star at (64, 60).
fn star_frame() -> (Vec<u8>, Vec<f64>) {
    let (w, h) = (128, 128);
    let mut pixels = gaussian_star(w, h, (64.0, 60.0), 5000.0, 4.0, 1000.0);
    add_noise(&mut pixels, 5.0, 3);
    let pixels: Vec<f64> = pixels.iter().map(|v| v.round()).collect();

    let stored: Vec<i16> = pixels.iter().map(|&v| (v - 32768.0) as i16).collect();
    let mut b = FitsBuilder::new(16, w, h);
    b.float("BZERO", 32768.0)
        .float("BSCALE", 1.0)
        .string("OBJECT", "synthetic")
        .comment("single gaussian star");
    add_tan_wcs(&mut b, (83.8221, -5.3911), w, h, 1.0e-4);
    b.data_i16(&stored);
    (b.build(), pixels)
}

#[test]
fn test_decode_unsigned_16_bit_frame() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();

    let (bytes, expected) = star_frame();
    let image = fits::decode(&bytes).expect("decode");

    assert_eq!(image.bitpix, Bitpix::I16);
    assert_eq!((image.width, image.height), (128, 128));
    assert_eq!(image.pixels.len(), 128 * 128);
    assert!(matches!(image.pixels, PixelData::Int32(_)));
    assert_eq!(image.pixels.to_f64_vec(), expected);
    assert_eq!(image.pixel(64, 60), Some(expected[60 * 128 + 64]));
    assert_eq!(image.header.get_str("OBJECT"), Some("synthetic"));
}

#[test]
fn test_zscale_follows_sky_not_star() {
    let (bytes, _) = star_frame();
    let image = fits::decode(&bytes).unwrap();

    let interval = image.pixels.zscale(&ZscaleConfig::default());
    println!("zscale interval: {:.1} .. {:.1}", interval.vmin, interval.vmax);
    assert!(interval.vmin > 960.0 && interval.vmin < 1000.0, "vmin {}", interval.vmin);
    assert!(interval.vmax > 1000.0 && interval.vmax < 1080.0, "vmax {}", interval.vmax);

    let levels = display_levels(&image.pixels, interval);
    assert_eq!(levels.len(), image.pixels.len());
    // The star core saturates the display
    assert_eq!(levels[60 * 128 + 64], 255);
}

#[test]
fn test_adaptive_fwhm_on_decoded_frame() {
    let (bytes, _) = star_frame();
    let image = fits::decode(&bytes).unwrap();

    let star = compute_adaptive_fwhm(
        &image.pixels,
        image.width,
        image.height,
        66.0,
        62.0,
        None,
        &AdaptiveFwhmConfig::default(),
    )
    .expect("photometry");

    let expected = GAUSSIAN_FWHM_PER_SIGMA * 4.0;
    println!("FWHM {:.3} px (expected {:.3}) at {:?}", star.fwhm, expected, star.center);
    assert_eq!(star.center, (64.0, 60.0));
    assert!((star.fwhm - expected).abs() / expected < 0.08);
    assert!((star.background - 1000.0).abs() < 5.0);
    assert!((star.aperture_radii[0] - 1.7 * star.fwhm).abs() < 1e-9);
}

#[test]
fn test_star_sky_position() {
    let (bytes, _) = star_frame();
    let image = fits::decode(&bytes).unwrap();
    let wcs = Wcs::from_header(&image.header).expect("wcs");
    assert!(wcs.has_supported_projection());
    assert!(wcs.sip.is_none());
    assert!((wcs.pixel_scale() - 0.36).abs() < 1e-9);

    // 0-based star pixel (64, 60) is FITS pixel (65, 61)
    let (ra, dec) = wcs.pixel_to_sky(65.0, 61.0).unwrap().unwrap();
    let (x, y) = wcs.sky_to_pixel(ra, dec).unwrap().unwrap();
    assert!((x - 65.0).abs() < 1e-6 && (y - 61.0).abs() < 1e-6);
    assert!(wcs.is_inside_image(ra, dec).unwrap());

    let (ra_c, dec_c) = wcs.center().unwrap().unwrap();
    assert!((ra_c - 83.8221).abs() < 1e-9 && (dec_c + 5.3911).abs() < 1e-9);
}

#[test]
fn test_float_frame_fwhm() {
    let (w, h) = (64, 48);
    let pixels = gaussian_star(w, h, (30.0, 22.0), 200.0, 2.5, 50.0);
    let data: Vec<f32> = pixels.iter().map(|&v| v as f32).collect();
    let bytes = FitsBuilder::new(-32, w, h).data_f32(&data).build();

    let image = fits::decode(&bytes).unwrap();
    assert!(matches!(image.pixels, PixelData::Float32(_)));

    let star = compute_fwhm(
        &image.pixels.to_f64_vec(),
        w,
        h,
        None,
        &FwhmConfig::default(),
    )
    .unwrap();
    let expected = GAUSSIAN_FWHM_PER_SIGMA * 2.5;
    assert_eq!(star.center, (30.0, 22.0));
    assert!((star.fwhm - expected).abs() / expected < 0.1, "fwhm {}", star.fwhm);
}

#[test]
fn test_constant_frame_is_mid_gray() {
    let bytes = FitsBuilder::new(8, 16, 8).data_u8(&[42u8; 128]).build();
    let image = fits::decode(&bytes).unwrap();

    let interval = image.pixels.zscale(&ZscaleConfig::default());
    assert_eq!(interval.width(), 0.0);
    let levels = display_levels(&image.pixels, interval);
    assert!(levels.iter().all(|&l| l == 128));
}

#[test]
fn test_rejects_unsupported_bitpix() {
    let bytes = FitsBuilder::new(12, 4, 4).data_u8(&[0u8; 32]).build();
    assert_eq!(
        fits::decode(&bytes).unwrap_err(),
        Error::from(FormatError::UnsupportedBitpix(12))
    );
}

#[test]
fn test_header_only_then_wcs() {
    let (bytes, _) = star_frame();
    let (header, offset) = fits::decode_header(&bytes).unwrap();
    assert_eq!(offset % fits::BLOCK_SIZE, 0);
    assert!(offset > 0);
    let wcs = Wcs::from_header(&header).unwrap();
    assert_eq!((wcs.image_width, wcs.image_height), (128, 128));
}

#[test]
fn test_read_fits_from_disk() {
    let (bytes, _) = star_frame();
    let path = std::env::temp_dir().join(format!("fitsview_pipeline_{}.fits", std::process::id()));
    std::fs::write(&path, &bytes).unwrap();

    let image = fits::read_fits(&path).unwrap();
    assert_eq!(image.width, 128);
    std::fs::remove_file(&path).unwrap();

    let err = fits::read_fits(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to read FITS file"));
}
