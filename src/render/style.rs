use serde::{Deserialize, Serialize};

use crate::catalog::asset::EquipmentKind;
use crate::foundation::core::Rgba8;
use crate::roster::formation::Lane;

/// Colours used by the compositor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Canvas background.
    pub background: Rgba8,
    /// Character cell fill.
    pub cell_background: Rgba8,
    /// Character cell border.
    pub cell_border: Rgba8,
    /// Fill drawn for assigned assets whose image is not resident.
    pub placeholder: Rgba8,
    /// Dashed border around empty regions.
    pub empty_border: Rgba8,
    /// Semi-opaque name bar at the bottom of images.
    pub name_bar: Rgba8,
    /// Primary text.
    pub text: Rgba8,
    /// Hints and empty-state glyphs.
    pub muted_text: Rgba8,
    /// Equipment row background.
    pub equip_row: Rgba8,
    /// Empty equipment item fill.
    pub equip_empty: Rgba8,
    /// Top and bottom gradient stops for the back, mid and front lanes.
    pub lane_hues: [[Rgba8; 2]; 3],
    /// Note region fill.
    pub note_background: Rgba8,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgba8::opaque(18, 20, 28),
            cell_background: Rgba8::opaque(32, 36, 48),
            cell_border: Rgba8::opaque(70, 78, 100),
            placeholder: Rgba8::opaque(58, 64, 84),
            empty_border: Rgba8::opaque(110, 118, 140),
            name_bar: Rgba8::new(0, 0, 0, 150),
            text: Rgba8::opaque(240, 242, 248),
            muted_text: Rgba8::opaque(150, 156, 176),
            equip_row: Rgba8::opaque(24, 27, 37),
            equip_empty: Rgba8::opaque(44, 49, 64),
            lane_hues: [
                [Rgba8::opaque(64, 96, 176), Rgba8::opaque(28, 40, 82)],
                [Rgba8::opaque(148, 92, 186), Rgba8::opaque(60, 34, 84)],
                [Rgba8::opaque(196, 84, 72), Rgba8::opaque(88, 32, 30)],
            ],
            note_background: Rgba8::opaque(28, 31, 42),
        }
    }
}

impl Palette {
    /// Gradient stops identifying `lane`.
    pub fn lane(&self, lane: Lane) -> [Rgba8; 2] {
        self.lane_hues[lane.index()]
    }
}

/// User-facing strings drawn into the card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Hint drawn inside empty character and card regions.
    pub select_hint: String,
    /// Note region title.
    pub note_title: String,
    /// Lane names in back, mid, front order.
    pub lanes: [String; 3],
    /// Glyph drawn in an empty pet slot.
    pub empty_pet: String,
    /// One-letter glyphs for empty equipment items, in weapon, armor, helmet, roon order.
    pub equip_glyphs: [String; 4],
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            select_hint: "Select".to_owned(),
            note_title: "Notes".to_owned(),
            lanes: ["Back".to_owned(), "Mid".to_owned(), "Front".to_owned()],
            empty_pet: "+".to_owned(),
            equip_glyphs: ["W".to_owned(), "A".to_owned(), "H".to_owned(), "R".to_owned()],
        }
    }
}

impl Labels {
    /// Label for `lane`.
    pub fn lane(&self, lane: Lane) -> &str {
        &self.lanes[lane.index()]
    }

    /// Glyph for an empty `kind` item.
    pub fn equip_glyph(&self, kind: EquipmentKind) -> &str {
        &self.equip_glyphs[kind.index()]
    }
}

/// Font sizes in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSizes {
    /// Names on image bars and placeholders.
    pub name: f32,
    /// Select hints and equipment glyphs.
    pub hint: f32,
    /// Lane labels.
    pub lane: f32,
    /// Note title.
    pub title: f32,
    /// Note body.
    pub body: f32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            name: 14.0,
            hint: 13.0,
            lane: 14.0,
            title: 16.0,
            body: 14.0,
        }
    }
}
