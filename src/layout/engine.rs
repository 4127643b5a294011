//! Fixed-template geometry shared by the compositor and by hit-testing overlays.
//!
//! [`compute_layout`] is the only place the template arithmetic lives. Overlays position their
//! click targets from [`LayoutTree::hit_regions`] instead of re-deriving anything, so targets line
//! up with drawn regions exactly.

use serde::{Deserialize, Serialize};

use crate::catalog::asset::EquipmentKind;
use crate::foundation::core::{Point, Rect, Size};
use crate::foundation::error::{RosterError, RosterResult};
use crate::roster::formation::Lane;
use crate::roster::model::{CHARACTER_SLOTS, PET_SLOTS};

/// Template constants, in logical pixels unless noted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Outer canvas padding on every side.
    pub padding: f64,
    /// Horizontal gap between character cells.
    pub cell_gap: f64,
    /// Vertical gap between the sub-regions of a character cell.
    pub sub_gap: f64,
    /// Upper bound for character and card image heights.
    pub image_height_cap: f64,
    /// Character image height as a multiple of cell width.
    pub char_aspect: f64,
    /// Card image height as a multiple of cell width.
    pub card_aspect: f64,
    /// Height of a name bar anchored at the bottom of an image.
    pub name_bar_height: f64,
    /// Equipment item height.
    pub equip_item_height: f64,
    /// Padding inside the equipment row.
    pub equip_row_padding: f64,
    /// Gap between equipment items.
    pub equip_gap: f64,
    /// Gap between the character cells and the bottom section.
    pub section_gap: f64,
    /// Fixed bottom section height.
    pub bottom_height: f64,
    /// Fraction of the bottom content width given to the pet formation.
    pub pet_share: f64,
    /// Gap between the pet formation and the note region.
    pub bottom_gap: f64,
    /// Gap between pet lane boxes.
    pub lane_gap: f64,
    /// Height of a lane's label row.
    pub lane_label_height: f64,
    /// Offset from the label row to the pet image slot.
    pub lane_image_offset: f64,
    /// Side of the square pet image slot.
    pub pet_image_size: f64,
    /// Padding inside the note region.
    pub note_padding: f64,
    /// Height of the note title row.
    pub note_title_height: f64,
    /// Height of one note body line.
    pub note_line_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: 24.0,
            cell_gap: 12.0,
            sub_gap: 12.0,
            image_height_cap: 280.0,
            char_aspect: 4.0 / 3.0,
            card_aspect: 8.0 / 5.0,
            name_bar_height: 28.0,
            equip_item_height: 52.0,
            equip_row_padding: 6.0,
            equip_gap: 6.0,
            section_gap: 12.0,
            bottom_height: 180.0,
            pet_share: 0.6,
            bottom_gap: 12.0,
            lane_gap: 12.0,
            lane_label_height: 32.0,
            lane_image_offset: 12.0,
            pet_image_size: 80.0,
            note_padding: 14.0,
            note_title_height: 28.0,
            note_line_height: 20.0,
        }
    }
}

impl LayoutConfig {
    /// Reject non-finite or negative constants and out-of-range ratios.
    pub fn validate(&self) -> RosterResult<()> {
        let lengths = [
            ("padding", self.padding),
            ("cell_gap", self.cell_gap),
            ("sub_gap", self.sub_gap),
            ("name_bar_height", self.name_bar_height),
            ("equip_row_padding", self.equip_row_padding),
            ("equip_gap", self.equip_gap),
            ("section_gap", self.section_gap),
            ("bottom_gap", self.bottom_gap),
            ("lane_gap", self.lane_gap),
            ("lane_label_height", self.lane_label_height),
            ("lane_image_offset", self.lane_image_offset),
            ("note_padding", self.note_padding),
            ("note_title_height", self.note_title_height),
        ];
        for (name, v) in lengths {
            if !v.is_finite() || v < 0.0 {
                return Err(RosterError::validation(format!(
                    "layout {name} must be finite and >= 0, got {v}"
                )));
            }
        }
        let positive = [
            ("image_height_cap", self.image_height_cap),
            ("char_aspect", self.char_aspect),
            ("card_aspect", self.card_aspect),
            ("equip_item_height", self.equip_item_height),
            ("bottom_height", self.bottom_height),
            ("pet_image_size", self.pet_image_size),
            ("note_line_height", self.note_line_height),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(RosterError::validation(format!(
                    "layout {name} must be finite and > 0, got {v}"
                )));
            }
        }
        if !(self.pet_share > 0.0 && self.pet_share < 1.0) {
            return Err(RosterError::validation(format!(
                "layout pet_share must be in (0, 1), got {}",
                self.pet_share
            )));
        }
        Ok(())
    }

    /// Equipment row height: item height plus its padding above and below.
    pub fn equip_row_height(&self) -> f64 {
        self.equip_item_height + 2.0 * self.equip_row_padding
    }
}

/// One equipment item inside a character cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EquipCell {
    /// Equipment kind shown here.
    pub kind: EquipmentKind,
    /// Item bounds.
    pub rect: Rect,
}

/// Geometry of one character cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CharacterCell {
    /// Slot index.
    pub index: usize,
    /// Whole cell bounds.
    pub frame: Rect,
    /// Character image region.
    pub char_image: Rect,
    /// Name bar anchored at the bottom of the character image.
    pub char_label: Rect,
    /// Card image region.
    pub card_image: Rect,
    /// Name bar anchored at the bottom of the card image.
    pub card_label: Rect,
    /// Equipment row background.
    pub equip_row: Rect,
    /// Equipment items in [`EquipmentKind::ALL`] order.
    pub equips: [EquipCell; 4],
}

/// Geometry of one pet formation lane box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LaneBox {
    /// Lane shown by this box.
    pub lane: Lane,
    /// Whole box bounds.
    pub frame: Rect,
    /// Icon and label row at the top of the box.
    pub label_row: Rect,
    /// Square pet image slot.
    pub image: Rect,
    /// Pet name area below the image slot.
    pub caption: Rect,
}

/// Geometry of the note region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NoteRegion {
    /// Whole region bounds.
    pub frame: Rect,
    /// Title row.
    pub title: Rect,
    /// Text body.
    pub body: Rect,
    /// Height of one body line.
    pub line_height: f64,
    /// Body lines that fit the body height.
    pub max_lines: usize,
}

/// Complete template geometry for one canvas width.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayoutTree {
    /// Logical canvas size.
    pub canvas: Size,
    /// Character cells in slot order.
    pub cells: [CharacterCell; CHARACTER_SLOTS],
    /// Whole bottom section.
    pub bottom: Rect,
    /// Pet formation region.
    pub pet_region: Rect,
    /// Pet lane boxes in lane order.
    pub lanes: [LaneBox; PET_SLOTS],
    /// Note region.
    pub note: NoteRegion,
}

/// What a click on a region addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitTarget {
    /// Character image of a slot.
    Character {
        /// Slot index.
        slot: usize,
    },
    /// Card image of a slot.
    Card {
        /// Slot index.
        slot: usize,
    },
    /// One equipment item of a slot.
    Equipment {
        /// Slot index.
        slot: usize,
        /// Equipment kind.
        kind: EquipmentKind,
    },
    /// A pet formation lane.
    PetLane {
        /// Pet formation position.
        position: usize,
    },
    /// The note region.
    Note,
}

/// A clickable region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HitRegion {
    /// Addressed target.
    pub target: HitTarget,
    /// Region bounds in logical pixels.
    pub rect: Rect,
}

impl LayoutTree {
    /// Every clickable region, in draw order. Regions never overlap.
    pub fn hit_regions(&self) -> Vec<HitRegion> {
        let mut out = Vec::with_capacity(CHARACTER_SLOTS * 6 + PET_SLOTS + 1);
        for cell in &self.cells {
            out.push(HitRegion {
                target: HitTarget::Character { slot: cell.index },
                rect: cell.char_image,
            });
            out.push(HitRegion {
                target: HitTarget::Card { slot: cell.index },
                rect: cell.card_image,
            });
            for e in &cell.equips {
                out.push(HitRegion {
                    target: HitTarget::Equipment {
                        slot: cell.index,
                        kind: e.kind,
                    },
                    rect: e.rect,
                });
            }
        }
        for (position, lane) in self.lanes.iter().enumerate() {
            out.push(HitRegion {
                target: HitTarget::PetLane { position },
                rect: lane.frame,
            });
        }
        out.push(HitRegion {
            target: HitTarget::Note,
            rect: self.note.frame,
        });
        out
    }

    /// Target under `point`, if any.
    pub fn hit_test(&self, point: Point) -> Option<HitTarget> {
        self.hit_regions()
            .into_iter()
            .find(|r| r.rect.contains(point))
            .map(|r| r.target)
    }

    /// JSON form for overlay collaborators.
    pub fn to_json(&self) -> RosterResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Compute the template geometry for `canvas_width` logical pixels.
///
/// Pure: the same width and config always produce identical values. Fails when the width is not
/// a positive finite number or too narrow for the template to have positive-size regions.
#[tracing::instrument(skip(cfg))]
pub fn compute_layout(canvas_width: f64, cfg: &LayoutConfig) -> RosterResult<LayoutTree> {
    if !canvas_width.is_finite() || canvas_width <= 0.0 {
        return Err(RosterError::layout(format!(
            "canvas width must be finite and > 0, got {canvas_width}"
        )));
    }
    cfg.validate()?;

    let n = CHARACTER_SLOTS as f64;
    let cell_w = (canvas_width - 2.0 * cfg.padding - (n - 1.0) * cfg.cell_gap) / n;
    let equip_item_w = (cell_w - 2.0 * cfg.equip_row_padding - 3.0 * cfg.equip_gap)
        / EquipmentKind::ALL.len() as f64;
    if equip_item_w <= 0.0 {
        return Err(RosterError::layout(format!(
            "canvas width {canvas_width} too narrow: character cells would be {cell_w:.2}px wide"
        )));
    }

    let char_h = (cell_w * cfg.char_aspect).min(cfg.image_height_cap);
    let card_h = (cell_w * cfg.card_aspect).min(cfg.image_height_cap);
    let equip_row_h = cfg.equip_row_height();
    let cell_h = char_h + cfg.sub_gap + card_h + cfg.sub_gap + equip_row_h;

    let top = cfg.padding;
    let cells = std::array::from_fn(|index| {
        let x0 = cfg.padding + index as f64 * (cell_w + cfg.cell_gap);
        let x1 = x0 + cell_w;

        let char_image = Rect::new(x0, top, x1, top + char_h);
        let card_y = char_image.y1 + cfg.sub_gap;
        let card_image = Rect::new(x0, card_y, x1, card_y + card_h);
        let row_y = card_image.y1 + cfg.sub_gap;
        let equip_row = Rect::new(x0, row_y, x1, row_y + equip_row_h);

        let item_y = row_y + cfg.equip_row_padding;
        let equips = std::array::from_fn(|k| {
            let ix = x0 + cfg.equip_row_padding + k as f64 * (equip_item_w + cfg.equip_gap);
            EquipCell {
                kind: EquipmentKind::ALL[k],
                rect: Rect::new(ix, item_y, ix + equip_item_w, item_y + cfg.equip_item_height),
            }
        });

        CharacterCell {
            index,
            frame: Rect::new(x0, top, x1, top + cell_h),
            char_image,
            char_label: bottom_bar(char_image, cfg.name_bar_height),
            card_image,
            card_label: bottom_bar(card_image, cfg.name_bar_height),
            equip_row,
            equips,
        }
    });

    let bottom_y = top + cell_h + cfg.section_gap;
    let content_w = canvas_width - 2.0 * cfg.padding;
    let split_w = content_w - cfg.bottom_gap;
    let pet_w = split_w * cfg.pet_share;
    let note_w = split_w - pet_w;
    let bottom = Rect::new(
        cfg.padding,
        bottom_y,
        canvas_width - cfg.padding,
        bottom_y + cfg.bottom_height,
    );
    let pet_region = Rect::new(bottom.x0, bottom.y0, bottom.x0 + pet_w, bottom.y1);

    let lane_count = PET_SLOTS as f64;
    let lane_w = (pet_w - (lane_count - 1.0) * cfg.lane_gap) / lane_count;
    if lane_w < cfg.pet_image_size {
        return Err(RosterError::layout(format!(
            "canvas width {canvas_width} too narrow: pet lanes would be {lane_w:.2}px wide, \
             need {need}",
            need = cfg.pet_image_size
        )));
    }
    let lanes = std::array::from_fn(|i| {
        let x0 = pet_region.x0 + i as f64 * (lane_w + cfg.lane_gap);
        let frame = Rect::new(x0, bottom.y0, x0 + lane_w, bottom.y1);
        let label_row = Rect::new(x0, frame.y0, frame.x1, frame.y0 + cfg.lane_label_height);
        let img_x = x0 + (lane_w - cfg.pet_image_size) / 2.0;
        let img_y = label_row.y1 + cfg.lane_image_offset;
        let image = Rect::new(
            img_x,
            img_y,
            img_x + cfg.pet_image_size,
            img_y + cfg.pet_image_size,
        );
        let caption = Rect::new(x0, image.y1, frame.x1, frame.y1.max(image.y1));
        LaneBox {
            lane: Lane::ALL[i],
            frame,
            label_row,
            image,
            caption,
        }
    });

    let note_frame = Rect::new(
        pet_region.x1 + cfg.bottom_gap,
        bottom.y0,
        pet_region.x1 + cfg.bottom_gap + note_w,
        bottom.y1,
    );
    let inner = note_frame.inset(-cfg.note_padding);
    if inner.width() <= 0.0 || inner.height() <= cfg.note_title_height {
        return Err(RosterError::layout(format!(
            "canvas width {canvas_width} too narrow: note region would be {note_w:.2}px wide"
        )));
    }
    let title = Rect::new(inner.x0, inner.y0, inner.x1, inner.y0 + cfg.note_title_height);
    let body = Rect::new(inner.x0, title.y1, inner.x1, inner.y1);
    let max_lines = (body.height() / cfg.note_line_height).floor() as usize;

    let height = cfg.padding + cell_h + cfg.section_gap + cfg.bottom_height + cfg.padding;
    Ok(LayoutTree {
        canvas: Size::new(canvas_width, height),
        cells,
        bottom,
        pet_region,
        lanes,
        note: NoteRegion {
            frame: note_frame,
            title,
            body,
            line_height: cfg.note_line_height,
            max_lines,
        },
    })
}

fn bottom_bar(image: Rect, bar_height: f64) -> Rect {
    let h = bar_height.min(image.height());
    Rect::new(image.x0, image.y1 - h, image.x1, image.y1)
}

#[cfg(test)]
#[path = "../../tests/unit/layout/engine.rs"]
mod tests;
