use std::io::Cursor;
use std::sync::Arc;

use super::*;
use crate::assets::decode::AssetCacheOpts;
use crate::assets::source::MemorySource;
use crate::foundation::core::Point;
use crate::layout::engine::{LayoutConfig, compute_layout};

const RED_SRC: &str = "char/red.png";
const GREEN_SRC: &str = "pet/green.png";

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn cache() -> AssetCache {
    let source = MemorySource::new()
        .with(RED_SRC, png(30, 40, [255, 0, 0, 255]))
        .with(GREEN_SRC, png(16, 16, [0, 255, 0, 255]));
    AssetCache::new(Arc::new(source), AssetCacheOpts::default())
}

fn opts() -> CompositorOpts {
    CompositorOpts::default().with_system_font(false)
}

fn font_bytes() -> Vec<u8> {
    std::fs::read("tests/data/fonts/DejaVuSans.ttf").unwrap()
}

fn changed_pixels(a: &RasterSurface, b: &RasterSurface, region: Rect) -> usize {
    let mut n = 0;
    for y in region.y0.ceil() as u32..region.y1.floor() as u32 {
        for x in region.x0.ceil() as u32..region.x1.floor() as u32 {
            if a.pixel(x, y) != b.pixel(x, y) {
                n += 1;
            }
        }
    }
    n
}

fn layout() -> LayoutTree {
    compute_layout(1200.0, &LayoutConfig::default()).unwrap()
}

fn pixel_at(surface: &RasterSurface, p: Point) -> [u8; 4] {
    let r = surface.ratio.get();
    surface
        .pixel((p.x * r).floor() as u32, (p.y * r).floor() as u32)
        .unwrap()
}

fn assert_close(actual: [u8; 4], expected: Rgba8, tol: u8) {
    let e = expected.premultiplied();
    for c in 0..4 {
        assert!(
            actual[c].abs_diff(e[c]) <= tol,
            "pixel {actual:?} differs from {e:?} by more than {tol}"
        );
    }
}

#[test]
fn surface_is_layout_size_times_ratio() {
    let opts = opts().with_device_pixel_ratio(2.0);
    let mut comp = Compositor::new(opts).unwrap();
    let surface = comp
        .render(&layout(), &SlotAssignmentModel::new(), &cache(), "")
        .unwrap();
    assert_eq!((surface.width, surface.height), (2400, 1776));
    assert_eq!(surface.data.len(), 2400 * 1776 * 4);
}

#[test]
fn invalid_options_are_rejected() {
    for ratio in [0.0, -1.0, 9.0, f64::NAN] {
        let opts = opts().with_device_pixel_ratio(ratio);
        assert!(Compositor::new(opts).is_err());
    }
    let mut zero_body = opts();
    zero_body.font_sizes.body = 0.0;
    assert!(Compositor::new(zero_body).is_err());
    assert!(Compositor::new(opts().with_font_bytes(b"nope".to_vec())).is_err());

    let mut comp = Compositor::new(opts()).unwrap();
    assert!(comp.set_device_pixel_ratio(0.0).is_err());
    assert_eq!(comp.ratio().get(), 1.0);
}

#[test]
fn assigned_asset_without_image_draws_placeholder() {
    let mut model = SlotAssignmentModel::new();
    model
        .set_character(0, Some(Asset::new("c1", "Aria", "char/unloaded.png")))
        .unwrap();
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let surface = comp.render(&layout, &model, &cache(), "").unwrap();

    let palette = Palette::default();
    let center = layout.cells[0].char_image.center();
    assert_close(pixel_at(&surface, center), palette.placeholder, 2);
    let empty_center = layout.cells[1].char_image.center();
    assert_close(pixel_at(&surface, empty_center), palette.cell_background, 2);
}

#[tokio::test]
async fn failed_load_keeps_placeholder() {
    let mut cache = cache();
    assert!(cache.request("char/broken.png").await.is_err());

    let mut model = SlotAssignmentModel::new();
    model
        .set_card(2, Some(Asset::new("k1", "Broken", "char/broken.png")))
        .unwrap();
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let surface = comp.render(&layout, &model, &cache, "").unwrap();
    let center = layout.cells[2].card_image.center();
    assert_close(pixel_at(&surface, center), Palette::default().placeholder, 2);
}

#[tokio::test]
async fn resident_images_are_drawn_at_any_ratio() {
    let mut cache = cache();
    cache.request(RED_SRC).await.unwrap();
    cache.request(GREEN_SRC).await.unwrap();

    let mut model = SlotAssignmentModel::new();
    model
        .set_character(3, Some(Asset::new("c1", "Red", RED_SRC)))
        .unwrap();
    model
        .assign_pet_formation(1, Some(Asset::new("p1", "Green", GREEN_SRC)))
        .unwrap();
    let layout = layout();

    for ratio in [1.0, 1.5, 2.0] {
        let mut comp =
            Compositor::new(opts().with_device_pixel_ratio(ratio)).unwrap();
        let surface = comp.render(&layout, &model, &cache, "").unwrap();
        let red = pixel_at(&surface, layout.cells[3].char_image.center());
        assert_close(red, Rgba8::opaque(255, 0, 0), 2);
        let green = pixel_at(&surface, layout.lanes[1].image.center());
        assert_close(green, Rgba8::opaque(0, 255, 0), 2);
    }
}

#[test]
fn empty_regions_get_a_dashed_border() {
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let surface = comp
        .render(&layout, &SlotAssignmentModel::new(), &cache(), "")
        .unwrap();
    let palette = Palette::default();

    let img = layout.cells[0].char_image;
    let y = img.y1 - 0.5;
    assert_close(
        pixel_at(&surface, Point::new(img.x0 + 2.0, y)),
        palette.empty_border,
        2,
    );
    assert_close(
        pixel_at(&surface, Point::new(img.x0 + 8.0, y)),
        palette.cell_background,
        2,
    );
}

#[test]
fn empty_equipment_items_use_their_own_fill() {
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let surface = comp
        .render(&layout, &SlotAssignmentModel::new(), &cache(), "")
        .unwrap();
    let palette = Palette::default();
    for e in &layout.cells[4].equips {
        assert_close(pixel_at(&surface, e.rect.center()), palette.equip_empty, 2);
    }
    let first = layout.cells[4].equips[0].rect;
    let between = Point::new(first.x1 + 3.0, first.center().y);
    assert_close(pixel_at(&surface, between), palette.equip_row, 2);
}

#[test]
fn lanes_are_filled_with_distinct_hues() {
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let surface = comp
        .render(&layout, &SlotAssignmentModel::new(), &cache(), "")
        .unwrap();
    let palette = Palette::default();

    let corner = |lane: &LaneBox| Point::new(lane.frame.x1 - 3.0, lane.frame.y0 + 2.0);
    let back = pixel_at(&surface, corner(&layout.lanes[0]));
    let front = pixel_at(&surface, corner(&layout.lanes[2]));
    assert_ne!(back, front);
    assert_close(back, palette.lane(Lane::Back)[0], 8);
    assert_close(front, palette.lane(Lane::Front)[0], 8);
}

#[test]
fn note_lines_fit_the_body_and_truncate() {
    let layout = layout();
    let mut comp = Compositor::new(opts()).unwrap();
    let note = "lorem ipsum dolor sit amet ".repeat(60);
    let lines = comp.note_lines(&layout.note, &note);
    assert_eq!(lines.len(), layout.note.max_lines);

    let size = comp.opts().font_sizes.body;
    let mut measure = FixedAdvance::default();
    for line in &lines {
        assert!(!line.is_empty());
        assert!(f64::from(measure.measure(line, size)) <= layout.note.body.width());
    }

    let short = comp.note_lines(&layout.note, "one\ntwo");
    assert_eq!(short, vec!["one", "two"]);
}

#[tokio::test]
async fn rendering_leaves_model_and_cache_untouched() {
    let mut cache = cache();
    cache.request(RED_SRC).await.unwrap();
    let mut model = SlotAssignmentModel::new();
    model
        .set_character(0, Some(Asset::new("c1", "Red", RED_SRC)))
        .unwrap();
    let before = model.clone();

    let mut comp = Compositor::new(opts()).unwrap();
    let a = comp.render(&layout(), &model, &cache, "note").unwrap();
    let b = comp.render(&layout(), &model, &cache, "note").unwrap();
    assert_eq!(model, before);
    assert_eq!(cache.len(), 1);
    assert_eq!(a, b);

    let png = a.to_png().unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1200, 888));
}

#[test]
fn real_font_draws_names_hints_and_glyphs() {
    let mut model = SlotAssignmentModel::new();
    model
        .set_character(0, Some(Asset::new("c1", "Aria", "char/unloaded.png")))
        .unwrap();
    model
        .assign_pet_formation(0, Some(Asset::new("p1", "Owl", "pet/unloaded.png")))
        .unwrap();
    let layout = layout();
    let cache = cache();

    let mut plain = Compositor::new(opts()).unwrap();
    let mut lettered = Compositor::new(opts().with_font_bytes(font_bytes())).unwrap();
    assert!(!plain.has_font());
    assert!(lettered.has_font());
    let a = plain.render(&layout, &model, &cache, "").unwrap();
    let b = lettered.render(&layout, &model, &cache, "").unwrap();

    assert!(changed_pixels(&a, &b, layout.cells[0].char_image) > 0);
    assert!(changed_pixels(&a, &b, layout.cells[1].char_image) > 0);
    assert!(changed_pixels(&a, &b, layout.cells[1].equips[0].rect) > 0);
    assert!(changed_pixels(&a, &b, layout.lanes[0].image) > 0);
    assert_eq!(changed_pixels(&a, &b, layout.lanes[0].caption), 0);
    assert!(changed_pixels(&a, &b, layout.lanes[1].image) > 0);
}

#[test]
fn note_lines_fit_the_body_under_real_measurement() {
    let layout = layout();
    let font = font_bytes();
    let mut comp = Compositor::new(opts().with_font_bytes(font.clone())).unwrap();
    let words: Vec<String> = (0..400).map(|i| format!("word{i}")).collect();
    let note = words.join(" ");

    let lines = comp.note_lines(&layout.note, &note);
    assert_eq!(lines.len(), layout.note.max_lines);

    let size = comp.opts().font_sizes.body;
    let mut engine = TextEngine::from_font_bytes(&font).unwrap();
    for line in &lines {
        let w = f64::from(engine.measure(line, size));
        assert!(w <= layout.note.body.width(), "{line:?} is {w}px wide");
    }

    let drawn: Vec<&str> = lines.iter().flat_map(|l| l.split(' ')).collect();
    let expected: Vec<&str> = words.iter().take(drawn.len()).map(String::as_str).collect();
    assert_eq!(drawn, expected);
}

#[test]
fn default_options_only_skip_text_without_any_font() {
    let comp = Compositor::new(CompositorOpts::default()).unwrap();
    assert_eq!(comp.has_font(), TextEngine::from_system_fonts().is_some());
    assert!(!Compositor::new(opts()).unwrap().has_font());
}
