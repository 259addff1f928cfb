//! Placement of the source graphic and its label on the page.
//!
//! # Coordinate System
//!
//! Everything here is in PDF user space: origin at the bottom-left corner of
//! the page, X to the right, Y upward, units in points.

use serde::Serialize;

use crate::config::{LayoutConfig, PageSize};

/// Anything that can report the native size of the page to be placed.
pub trait PageSource {
    fn page_size(&self) -> PageSize;
}

/// Where the scaled graphic and the label go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    pub scale: f64,
    pub placed_width: f64,
    pub placed_height: f64,
    /// Lower-left corner of the placed graphic
    pub origin_x: f64,
    pub origin_y: f64,
    /// Center of the label baseline
    pub label_anchor_x: f64,
    pub label_anchor_y: f64,
}

impl Geometry {
    /// Matrix that maps source page space onto the placed rectangle
    pub fn transform(&self) -> Transform {
        Transform::scale(self.scale).then(Transform::translate(self.origin_x, self.origin_y))
    }
}

/// Scale the source to `target_width`, center it, and hang the label `gap`
/// below it.
///
/// Callers reject non-positive source sizes before getting here.
pub fn compute_geometry(
    page: PageSize,
    source_width: f64,
    source_height: f64,
    target_width: f64,
    gap: f64,
) -> Geometry {
    let scale = target_width / source_width;
    let placed_width = target_width;
    let placed_height = source_height * scale;

    let origin_x = (page.width - placed_width) / 2.0;
    let origin_y = (page.height - placed_height) / 2.0;

    Geometry {
        scale,
        placed_width,
        placed_height,
        origin_x,
        origin_y,
        label_anchor_x: page.width / 2.0,
        label_anchor_y: origin_y - gap,
    }
}

/// [`compute_geometry`] with the constants from `config`
pub fn geometry_for(source: &impl PageSource, config: &LayoutConfig) -> Geometry {
    let native = source.page_size();
    compute_geometry(
        config.page,
        native.width,
        native.height,
        config.target_width,
        config.label_gap,
    )
}

/// 2D affine transform in PDF matrix form `[a b c d e f]`.
///
/// A point maps as `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Uniform scale about the origin
    pub fn scale(s: f64) -> Self {
        Self {
            a: s,
            d: s,
            ..Self::IDENTITY
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self` first, then `next`
    pub fn then(&self, next: Transform) -> Transform {
        Transform {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Operands for the `cm` operator
    pub fn coefficients(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::A4;

    const EPS: f64 = 1e-9;

    struct FixedPage(f64, f64);

    impl PageSource for FixedPage {
        fn page_size(&self) -> PageSize {
            PageSize::new(self.0, self.1)
        }
    }

    #[test]
    fn test_scale_example() {
        let g = compute_geometry(A4, 100.0, 50.0, 360.0, 14.0);
        assert!((g.scale - 3.6).abs() < EPS);
        assert!((g.placed_width - 360.0).abs() < EPS);
        assert!((g.placed_height - 180.0).abs() < EPS);
        assert!((g.origin_x - 117.635).abs() < EPS);
        assert!((g.origin_y - 330.945).abs() < EPS);
        assert!((g.label_anchor_x - 297.635).abs() < EPS);
        assert!((g.label_anchor_y - 316.945).abs() < EPS);
    }

    #[test]
    fn test_centering_invariant() {
        let sizes = [(1.0, 1.0), (200.0, 80.0), (612.0, 792.0), (0.5, 3000.0), (1e4, 3.0)];
        for (w, h) in sizes {
            let g = compute_geometry(A4, w, h, 360.0, 14.0);
            assert!((g.origin_x + g.placed_width / 2.0 - A4.width / 2.0).abs() < 1e-6);
            assert!((g.origin_y + g.placed_height / 2.0 - A4.height / 2.0).abs() < 1e-6);
            assert!((g.placed_width - 360.0).abs() < 1e-6);
            assert!((g.placed_height - h * g.scale).abs() < 1e-6);
        }
    }

    #[test]
    fn test_label_sits_below_graphic() {
        let g = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        assert!((g.origin_y - g.label_anchor_y - 14.0).abs() < EPS);
        assert!((g.label_anchor_x - A4.width / 2.0).abs() < EPS);
    }

    #[test]
    fn test_geometry_for_reads_page_source() {
        let g = geometry_for(&FixedPage(200.0, 80.0), &LayoutConfig::a4());
        assert!((g.scale - 1.8).abs() < EPS);
        assert!((g.placed_height - 144.0).abs() < EPS);
    }

    #[test]
    fn test_transform_scale_then_translate() {
        let t = Transform::scale(2.0).then(Transform::translate(10.0, 20.0));
        assert_eq!(t.coefficients(), [2.0, 0.0, 0.0, 2.0, 10.0, 20.0]);
        assert_eq!(t.apply(1.0, 1.0), (12.0, 22.0));
    }

    #[test]
    fn test_translate_then_scale_scales_offset() {
        let t = Transform::translate(10.0, 20.0).then(Transform::scale(2.0));
        assert_eq!(t.apply(0.0, 0.0), (20.0, 40.0));
    }

    #[test]
    fn test_identity_is_neutral() {
        let t = Transform::scale(3.0).then(Transform::translate(1.0, 2.0));
        assert_eq!(t.then(Transform::IDENTITY), t);
        assert_eq!(Transform::IDENTITY.then(t), t);
    }

    #[test]
    fn test_geometry_transform_maps_source_corners() {
        let g = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        let t = g.transform();
        let (x0, y0) = t.apply(0.0, 0.0);
        let (x1, y1) = t.apply(200.0, 80.0);
        assert!((x0 - g.origin_x).abs() < EPS);
        assert!((y0 - g.origin_y).abs() < EPS);
        assert!((x1 - (g.origin_x + g.placed_width)).abs() < EPS);
        assert!((y1 - (g.origin_y + g.placed_height)).abs() < EPS);
    }
}
