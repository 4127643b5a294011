use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::{BoxFuture, FutureExt};

use super::*;
use crate::catalog::asset::{Asset, EquipmentKind};
use crate::roster::formation::Transition;

fn png(px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(6, 8, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

struct CountingSource {
    inner: crate::assets::source::MemorySource,
    calls: Arc<AtomicUsize>,
}

impl ImageSource for CountingSource {
    fn fetch(&self, src: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(src).boxed()
    }
}

fn studio() -> (Studio, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: crate::assets::source::MemorySource::new()
            .with("char/red.png", png([255, 0, 0, 255]))
            .with("card/blue.png", png([0, 0, 255, 255]))
            .with("equip/weapon/sword.png", png([200, 200, 0, 255])),
        calls: Arc::clone(&calls),
    };
    let opts = StudioOpts::default()
        .with_compositor(CompositorOpts::default().with_system_font(false));
    let studio = Studio::new(Arc::new(source), opts).unwrap();
    (studio, calls)
}

fn red() -> Asset {
    Asset::new("c-red", "Red", "char/red.png")
}

fn center_pixel(surface: &RasterSurface, p: Point) -> [u8; 4] {
    surface.pixel(p.x as u32, p.y as u32).unwrap()
}

fn near(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

#[tokio::test]
async fn render_waits_for_the_working_set() {
    let (mut studio, calls) = studio();
    studio.edit(|m| m.set_character(0, Some(red()))).unwrap();
    studio
        .edit(|m| m.set_card(0, Some(Asset::new("k", "Blue", "card/blue.png"))))
        .unwrap();

    let surface = studio.render().await.unwrap();
    let layout = studio.layout().unwrap();
    let char_px = center_pixel(&surface, layout.cells[0].char_image.center());
    let card_px = center_pixel(&surface, layout.cells[0].card_image.center());
    assert!(near(char_px, [255, 0, 0, 255]), "{char_px:?}");
    assert!(near(card_px, [0, 0, 255, 255]), "{card_px:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn batches_begun_before_an_edit_are_stale() {
    let (mut studio, _) = studio();
    studio.edit(|m| m.set_character(0, Some(red()))).unwrap();

    let batch = studio.begin_batch();
    assert_eq!(batch.sources().collect::<Vec<_>>(), vec!["char/red.png"]);
    studio.set_note("changed while loading");
    let settled = batch.settle().await;
    assert_eq!((settled.loaded, settled.failed), (1, 0));
    assert!(matches!(studio.finish(settled).unwrap(), FrameOutcome::Stale));

    let settled = studio.begin_batch().settle().await;
    assert!(matches!(studio.finish(settled).unwrap(), FrameOutcome::Drawn(_)));
}

#[tokio::test]
async fn overlapping_batches_share_loads() {
    let (mut studio, calls) = studio();
    studio.edit(|m| m.set_character(0, Some(red()))).unwrap();

    let first = studio.begin_batch();
    let second = studio.begin_batch();
    let (a, b) = tokio::join!(first.settle(), second.settle());
    assert_eq!(a.loaded + b.loaded, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(studio.assets().is_ready("char/red.png"));
}

#[tokio::test]
async fn failed_sources_settle_and_draw_placeholders() {
    let (mut studio, calls) = studio();
    studio
        .edit(|m| m.set_character(1, Some(Asset::new("g", "Ghost", "char/ghost.png"))))
        .unwrap();

    let settled = studio.begin_batch().settle().await;
    assert_eq!((settled.loaded, settled.failed), (0, 1));
    let FrameOutcome::Drawn(surface) = studio.finish(settled).unwrap() else {
        panic!("expected a drawn frame");
    };
    let layout = studio.layout().unwrap();
    let placeholder = crate::render::style::Palette::default().placeholder;
    let px = center_pixel(&surface, layout.cells[1].char_image.center());
    assert!(near(px, placeholder.premultiplied()), "{px:?}");

    studio.render().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unchanged_scenes_reuse_the_last_surface() {
    let (mut studio, _) = studio();
    studio.set_note("hello");
    let a = studio.render().await.unwrap();
    let b = studio.render().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    studio.set_note("hello again");
    let c = studio.render().await.unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[tokio::test]
async fn drawing_early_shows_placeholders_then_images() {
    let (mut studio, _) = studio();
    studio.edit(|m| m.set_character(0, Some(red()))).unwrap();
    let layout = studio.layout().unwrap();
    let p = layout.cells[0].char_image.center();

    let early = studio.draw().unwrap();
    assert!(!near(center_pixel(&early, p), [255, 0, 0, 255]));

    let late = studio.render().await.unwrap();
    assert!(near(center_pixel(&late, p), [255, 0, 0, 255]));
}

#[test]
fn only_real_changes_advance_the_generation() {
    let (mut studio, _) = studio();
    assert_eq!(studio.generation(), 0);

    assert!(studio.edit(|m| m.set_character(9, Some(red()))).is_err());
    studio.set_note("");
    studio.set_canvas_width(1200.0).unwrap();
    studio.set_device_pixel_ratio(1.0).unwrap();
    assert_eq!(studio.generation(), 0);

    let t = studio.edit(|m| m.assign_formation(0, Some(red()))).unwrap();
    assert_eq!(t, Transition::Placed);
    assert_eq!(studio.generation(), 1);

    assert!(studio.set_canvas_width(100.0).is_err());
    assert!(studio.set_device_pixel_ratio(0.0).is_err());
    assert_eq!(studio.canvas_width(), 1200.0);
    assert_eq!(studio.generation(), 1);

    studio.set_canvas_width(900.0).unwrap();
    studio.set_device_pixel_ratio(2.0).unwrap();
    assert_eq!(studio.generation(), 3);
}

#[test]
fn working_set_covers_drawn_sources_only() {
    let (mut studio, _) = studio();
    studio
        .edit(|m| {
            m.set_equipment(
                2,
                EquipmentKind::Weapon,
                Some(Asset::new("w", "Sword", "equip/weapon/sword.png")),
            )?;
            m.set_pet(0, Some(Asset::new("p", "Cat", "pet/cat.png")))?;
            m.assign_formation(3, Some(red())).map(|_| ())
        })
        .unwrap();
    let batch = studio.begin_batch();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.sources().next(), Some("equip/weapon/sword.png"));
}

#[test]
fn hit_testing_uses_the_current_width() {
    let (mut studio, _) = studio();
    let layout = studio.layout().unwrap();
    let target = studio.hit_test(layout.cells[2].card_image.center()).unwrap();
    assert_eq!(target, Some(crate::layout::engine::HitTarget::Card { slot: 2 }));
    assert_eq!(studio.hit_test(Point::new(1.0, 1.0)).unwrap(), None);
}

#[tokio::test]
async fn export_png_has_physical_dimensions() {
    let (mut studio, _) = studio();
    studio.set_device_pixel_ratio(1.5).unwrap();
    let png = studio.export_png().await.unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1800, 1332));
}

#[test]
fn options_load_from_json_and_environment() {
    let opts = StudioOpts::from_json_str(
        r#"{ "canvas_width": 900, "compositor": { "device_pixel_ratio": 1.5 } }"#,
    )
    .unwrap();
    assert_eq!(opts.canvas_width, 900.0);
    assert_eq!(opts.compositor.device_pixel_ratio, 1.5);
    assert_eq!(opts.layout, LayoutConfig::default());

    let env = |value: &'static str| {
        move |key: &str| (key == DEVICE_PIXEL_RATIO_ENV).then(|| value.to_owned())
    };
    assert_eq!(
        opts.clone()
            .with_overrides_from(env(" 2 "))
            .compositor
            .device_pixel_ratio,
        2.0
    );
    assert_eq!(
        opts.clone()
            .with_overrides_from(env("fast"))
            .compositor
            .device_pixel_ratio,
        1.5
    );
    assert_eq!(
        opts.with_overrides_from(env("-1")).compositor.device_pixel_ratio,
        1.5
    );

    assert!(StudioOpts::from_json_str("{ not json").is_err());
}

#[test]
fn invalid_options_fail_construction() {
    let source = Arc::new(crate::assets::source::MemorySource::new());
    let narrow = StudioOpts::default().with_canvas_width(200.0);
    assert!(Studio::new(source.clone(), narrow).is_err());
    let bad_ratio = StudioOpts::default()
        .with_compositor(CompositorOpts::default().with_device_pixel_ratio(12.0));
    assert!(Studio::new(source.clone(), bad_ratio).is_err());
    let mut cramped = LayoutConfig::default();
    cramped.pet_image_size = 400.0;
    assert!(Studio::new(source, StudioOpts::default().with_layout(cramped)).is_err());
}
