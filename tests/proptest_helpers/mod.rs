#![allow(dead_code)]

use boxreview::ir::PixelRect;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Pixel tolerance of a normalize → denormalize cycle.
pub const EPS_ROUNDTRIP: f64 = 1e-4;

/// Pixel tolerance after a trip through 6-decimal normalized-line text.
pub fn eps_lines(image_w: u32, image_h: u32) -> f64 {
    image_w.max(image_h) as f64 * 1e-6
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_dims() -> BoxedStrategy<(u32, u32)> {
    (2u32..=4096, 2u32..=4096).boxed()
}

/// An integer-aligned box fully inside a `width` × `height` image.
pub fn arb_rect_within(width: u32, height: u32) -> BoxedStrategy<PixelRect> {
    prop::num::u32::ANY
        .prop_map(move |seed| {
            rect_from_seed(
                width,
                height,
                seed,
                seed.rotate_left(3),
                seed.rotate_left(7),
                seed.rotate_left(11),
            )
        })
        .boxed()
}

/// A box with fractional edges fully inside a `width` × `height` image.
pub fn arb_fractional_rect_within(width: u32, height: u32) -> BoxedStrategy<PixelRect> {
    (0.0f64..1.0, 0.0f64..1.0, 0.01f64..=1.0, 0.01f64..=1.0)
        .prop_map(move |(fx, fy, fw, fh)| {
            let (w, h) = (width as f64, height as f64);
            let left = fx * (w - 1.0);
            let top = fy * (h - 1.0);
            let width = ((w - left) * fw).max(0.5);
            let height = ((h - top) * fh).max(0.5);
            PixelRect::new(left, top, width.min(w - left), height.min(h - top))
        })
        .boxed()
}

/// Sequence of store edits: `true` adds a box, `false` removes the box at
/// `index % len` (ignored on an empty store).
pub fn arb_edit_script(max_len: usize) -> BoxedStrategy<Vec<(bool, usize)>> {
    proptest::collection::vec((any::<bool>(), any::<usize>()), 0..=max_len).boxed()
}

pub fn assert_rect_close(a: &PixelRect, b: &PixelRect, eps: f64) -> Result<(), String> {
    let pairs = [
        ("left", a.left, b.left),
        ("top", a.top, b.top),
        ("width", a.width, b.width),
        ("height", a.height, b.height),
    ];
    for (field, x, y) in pairs {
        if (x - y).abs() >= eps {
            return Err(format!("{field} differs: {x} vs {y} (eps={eps}); {a:?} vs {b:?}"));
        }
    }
    Ok(())
}

fn rect_from_seed(width: u32, height: u32, sx: u32, sy: u32, sw: u32, sh: u32) -> PixelRect {
    let xmin = sx % (width - 1);
    let ymin = sy % (height - 1);
    let xmax = xmin + 1 + (sw % (width - xmin));
    let ymax = ymin + 1 + (sh % (height - ymin));

    PixelRect::new(
        xmin as f64,
        ymin as f64,
        (xmax - xmin) as f64,
        (ymax - ymin) as f64,
    )
}
