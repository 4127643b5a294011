use std::io::Cursor;

use super::*;

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let decoded = decode_image(&png_bytes(1, 1, [100, 50, 200, 128]), 4096).unwrap();
    assert_eq!(decoded.width, 1);
    assert_eq!(decoded.height, 1);
    assert_eq!(
        decoded.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
    assert_eq!(decoded.byte_len(), 4);
}

#[test]
fn oversized_images_are_downscaled_keeping_aspect() {
    let decoded = decode_image(&png_bytes(64, 32, [10, 20, 30, 255]), 16).unwrap();
    assert_eq!((decoded.width, decoded.height), (16, 8));
}

#[test]
fn garbage_bytes_fail_to_decode() {
    assert!(decode_image(b"not an image", 4096).is_err());
}

#[test]
fn svg_sources_are_rasterized_at_scale() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="5">
        <rect width="10" height="5" fill="#ff0000"/>
    </svg>"##;
    let opts = AssetCacheOpts::default().with_svg_raster_scale(3.0);
    let decoded = decode_for_src("icons/Lane.SVG", svg, &opts).unwrap();
    assert_eq!((decoded.width, decoded.height), (30, 15));
    let mid = ((7 * 30 + 15) * 4) as usize;
    assert_eq!(&decoded.rgba8_premul[mid..mid + 4], &[255, 0, 0, 255]);
}

#[test]
fn svg_parse_errors_surface() {
    let opts = AssetCacheOpts::default();
    assert!(decode_for_src("x.svg", b"<svg", &opts).is_err());
    let bad_scale = opts.with_svg_raster_scale(0.0);
    let ok = br#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"></svg>"#;
    assert!(decode_for_src("x.svg", ok, &bad_scale).is_err());
}
