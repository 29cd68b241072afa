//! Crop marks and bleed.
//!
//! [`CropMarks`] is the raw, all-optional configuration. [`CropMarks::resolve`]
//! applies defaults and clamps nonsense values; nothing here ever errors.

use serde::{Deserialize, Deserializer, Serialize};

const DEFAULT_BORDER_WIDTH: f64 = 36.0;
const DEFAULT_MARK_LENGTH: f64 = 18.0;
const DEFAULT_MARK_WIDTH: f64 = 0.5;

/// Stroke colour for crop marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", rename_all = "lowercase")]
pub enum Color {
    Gray { level: f32 },
    Rgb { r: f32, g: f32, b: f32 },
    Cmyk { c: f32, m: f32, y: f32, k: f32 },
}

impl Color {
    pub const BLACK: Color = Color::Gray { level: 0.0 };
}

/// Crop-mark / bleed settings for a document. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropMarks {
    /// Margin added around the page on every side (pt). Default 36.
    pub border_width: Option<f64>,
    /// Tick length (pt), clamped to `[0, border_width]`. Default 18.
    pub mark_length: Option<f64>,
    /// Tick stroke width (pt). Default 0.5, also used for negative or non-finite values.
    pub mark_width: Option<f64>,
    /// `None` means black; `Some(None)` (JSON `null`) disables the ticks.
    #[serde(deserialize_with = "explicit_null")]
    pub mark_color: Option<Option<Color>>,
    /// Draw ticks after the page content. Default true.
    pub mark_last: Option<bool>,
    /// Content is scaled up to run this far past the trim edge (pt). Default 0.
    pub bleed_width: Option<f64>,
}

// distinguishes a missing key (None) from `null` (Some(None))
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Crop-mark settings with defaults applied and values clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedCropMarks {
    pub border_width: f64,
    pub mark_length: f64,
    pub mark_width: f64,
    pub mark_color: Option<Color>,
    pub mark_last: bool,
    pub bleed_width: f64,
}

impl CropMarks {
    /// Resolves the settings. Returns `None` when the border width comes out
    /// as zero (or NaN), in which case no crop-mark processing happens at all.
    pub fn resolve(&self) -> Option<ResolvedCropMarks> {
        let border_width = non_negative(self.border_width.unwrap_or(DEFAULT_BORDER_WIDTH));
        if border_width == 0.0 {
            return None;
        }
        let mark_length = non_negative(self.mark_length.unwrap_or(DEFAULT_MARK_LENGTH)).min(border_width);
        Some(ResolvedCropMarks {
            border_width,
            mark_length,
            mark_width: self
                .mark_width
                .filter(|w| w.is_finite() && *w >= 0.0)
                .unwrap_or(DEFAULT_MARK_WIDTH),
            mark_color: self.mark_color.unwrap_or(Some(Color::BLACK)),
            mark_last: self.mark_last.unwrap_or(true),
            bleed_width: non_negative(self.bleed_width.unwrap_or(0.0)),
        })
    }
}

// NaN collapses to zero as well
fn non_negative(v: f64) -> f64 {
    if v > 0.0 { v } else { 0.0 }
}

/// A straight tick from `(x1, y1)` to `(x2, y2)`.
pub type LineSegment = (f64, f64, f64, f64);

impl ResolvedCropMarks {
    /// Whether tick marks are drawn at all.
    pub fn draws_marks(&self) -> bool {
        self.mark_length > 0.0 && self.mark_color.is_some()
    }

    /// The eight corner ticks for a trimmed page of `page_w` x `page_h`, in
    /// the coordinates of the enlarged page (trim box inset by the border).
    /// The first four are vertical, the last four horizontal.
    pub fn mark_segments(&self, page_w: f64, page_h: f64) -> [LineSegment; 8] {
        let bw = self.border_width;
        let ml = self.mark_length;
        let mg = 2.0 * bw - ml;
        [
            (bw, 0.0, bw, ml),
            (page_w + bw, 0.0, page_w + bw, ml),
            (bw, page_h + mg, bw, page_h + 2.0 * bw),
            (page_w + bw, page_h + mg, page_w + bw, page_h + 2.0 * bw),
            (0.0, bw, ml, bw),
            (page_w + mg, bw, page_w + 2.0 * bw, bw),
            (0.0, page_h + bw, ml, page_h + bw),
            (page_w + mg, page_h + bw, page_w + 2.0 * bw, page_h + bw),
        ]
    }

    pub fn bleed_transform(&self, page_w: f64, page_h: f64) -> BleedTransform {
        let offset = self.border_width - self.bleed_width;
        let scale = if self.bleed_width > 0.0 {
            Some((bleed_scale(self.bleed_width, page_w), bleed_scale(self.bleed_width, page_h)))
        } else {
            None
        };
        BleedTransform { translate: (offset, offset), scale }
    }

    /// Page size after the border is added on every side.
    pub fn enlarged(&self, page_w: f64, page_h: f64) -> (f64, f64) {
        (page_w + 2.0 * self.border_width, page_h + 2.0 * self.border_width)
    }
}

// a degenerate (zero or negative) page side is left unscaled
fn bleed_scale(bleed: f64, side: f64) -> f64 {
    if side > 0.0 { 1.0 + 2.0 * bleed / side } else { 1.0 }
}

/// Translation followed by an optional uniform-per-axis scale, in the order
/// they are concatenated onto the CTM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BleedTransform {
    pub translate: (f64, f64),
    pub scale: Option<(f64, f64)>,
}

impl BleedTransform {
    /// Maps a point of the original content into enlarged-page space.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let (sx, sy) = self.scale.unwrap_or((1.0, 1.0));
        let (tx, ty) = self.translate;
        (x * sx + tx, y * sy + ty)
    }
}
