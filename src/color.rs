use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Categorical palette
// ---------------------------------------------------------------------------

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

/// `n` visually distinct colours with evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            to_color32(Hsl::new(hue, 0.75, 0.55).into_color())
        })
        .collect()
}

/// Colour per distinct value of the column bound to the color role.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    pub fn new(column: &str, values: &BTreeSet<CellValue>) -> Self {
        let mapping = values
            .iter()
            .cloned()
            .zip(generate_palette(values.len()))
            .collect();
        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Nulls and unseen values get the default grey.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Diverging scale for correlation heatmaps
// ---------------------------------------------------------------------------

const RED: (f32, f32, f32) = (0.70, 0.09, 0.17);
const WHITE: (f32, f32, f32) = (0.97, 0.97, 0.97);
const BLUE: (f32, f32, f32) = (0.13, 0.40, 0.67);

/// Red at -1, white at 0, blue at +1. Out-of-range inputs are clamped;
/// `None` (undefined coefficient) is grey.
pub fn diverging(value: Option<f64>) -> Color32 {
    let Some(v) = value.filter(|v| !v.is_nan()) else {
        return Color32::GRAY;
    };
    let v = v.clamp(-1.0, 1.0) as f32;
    let white: LinSrgb = Srgb::new(WHITE.0, WHITE.1, WHITE.2).into_linear();
    let end: LinSrgb = if v < 0.0 {
        Srgb::new(RED.0, RED.1, RED.2)
    } else {
        Srgb::new(BLUE.0, BLUE.1, BLUE.2)
    }
    .into_linear();
    to_color32(Srgb::from_linear(white.mix(end, v.abs())))
}

/// Black or white, whichever reads better on `background`.
pub fn contrasting_text(background: Color32) -> Color32 {
    let luma = 0.299 * background.r() as f32
        + 0.587 * background.g() as f32
        + 0.114 * background.b() as f32;
    if luma > 140.0 {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        assert_ne!(p[0], p[1]);
    }

    #[test]
    fn color_map_falls_back_to_grey() {
        let values: BTreeSet<CellValue> = [CellValue::Text("a".into()), CellValue::Text("b".into())]
            .into_iter()
            .collect();
        let map = ColorMap::new("team", &values);
        assert_eq!(map.legend_entries().len(), 2);
        assert_ne!(map.color_for(&CellValue::Text("a".into())), Color32::GRAY);
        assert_eq!(map.color_for(&CellValue::Null), Color32::GRAY);
    }

    #[test]
    fn diverging_endpoints() {
        let neg = diverging(Some(-1.0));
        let pos = diverging(Some(1.0));
        assert!(neg.r() > neg.b());
        assert!(pos.b() > pos.r());
        let mid = diverging(Some(0.0));
        assert!(mid.r() > 240 && mid.b() > 240);
        assert_eq!(diverging(None), Color32::GRAY);
    }

    #[test]
    fn text_contrast() {
        assert_eq!(contrasting_text(Color32::WHITE), Color32::BLACK);
        assert_eq!(contrasting_text(Color32::BLACK), Color32::WHITE);
    }
}
