//! Canonical color resolution through an offscreen raster surface
//!
//! Renderers disagree on which textual color forms they accept (named colors,
//! `hsl()`, 3/4/8 digit hex, ...). Every color that reaches a snapshot is
//! therefore painted onto a reused 1x1 pixmap and read back, producing a
//! single `rgba(r, g, b, a)` form.

use tiny_skia::{Paint, Pixmap, Rect, Transform};

pub struct ColorResolver {
    surface: Option<Pixmap>,
}

impl Default for ColorResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorResolver {
    pub fn new() -> Self {
        let surface = Pixmap::new(1, 1);
        if surface.is_none() {
            log::warn!("color resolver: offscreen surface unavailable, colors pass through");
        }
        Self { surface }
    }

    /// Canonicalize `value`. Empty, transparent and unparseable values are
    /// returned unchanged.
    pub fn resolve(&mut self, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("transparent") {
            return value.to_string();
        }
        let Ok(parsed) = csscolorparser::parse(trimmed) else {
            log::trace!("color resolver: cannot parse {:?}", trimmed);
            return value.to_string();
        };
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (
            channel(parsed.r as f64),
            channel(parsed.g as f64),
            channel(parsed.b as f64),
            channel(parsed.a as f64),
        );
        if a == 0 {
            return value.to_string();
        }
        let Some(surface) = self.surface.as_mut() else {
            return format!("rgba({}, {}, {}, {})", r, g, b, a as f64 / 255.0);
        };

        surface.fill(tiny_skia::Color::TRANSPARENT);
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = false;
        if let Some(rect) = Rect::from_xywh(0.0, 0.0, 1.0, 1.0) {
            surface.fill_rect(rect, &paint, Transform::identity(), None);
        }
        match surface.pixel(0, 0) {
            Some(px) => {
                let c = px.demultiply();
                format!(
                    "rgba({}, {}, {}, {})",
                    c.red(),
                    c.green(),
                    c.blue(),
                    c.alpha() as f64 / 255.0
                )
            }
            None => value.to_string(),
        }
    }
}
