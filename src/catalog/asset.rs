use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{RosterError, RosterResult};

/// Catalog entry: an image plus the metadata the roster needs to reference it.
///
/// `id` is unique within its category. Assets are immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier, unique within the asset's category.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image source identifier understood by the configured [`crate::ImageSource`].
    pub src: String,
}

impl Asset {
    /// Construct an asset from its three fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            src: src.into(),
        }
    }

    /// Equipment classification derived from `src`.
    pub fn equipment_class(&self) -> EquipmentClass {
        EquipmentClass::from_src(&self.src)
    }
}

/// Catalog categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    /// Cards attached to a character slot.
    Card,
    /// Characters.
    Char,
    /// Pets.
    Pet,
    /// Equipment of any kind.
    Equip,
}

/// The four equipment slots of a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentKind {
    /// Weapon slot.
    Weapon,
    /// Armor slot.
    Armor,
    /// Helmet slot.
    Helmet,
    /// Roon slot.
    Roon,
}

impl EquipmentKind {
    /// Kinds in equipment-row order.
    pub const ALL: [EquipmentKind; 4] = [
        EquipmentKind::Weapon,
        EquipmentKind::Armor,
        EquipmentKind::Helmet,
        EquipmentKind::Roon,
    ];

    /// Path segment that marks an equipment source of this kind.
    pub fn path_segment(self) -> &'static str {
        match self {
            EquipmentKind::Weapon => "weapon",
            EquipmentKind::Armor => "armor",
            EquipmentKind::Helmet => "helmet",
            EquipmentKind::Roon => "roon",
        }
    }

    /// Index into [`EquipmentKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            EquipmentKind::Weapon => 0,
            EquipmentKind::Armor => 1,
            EquipmentKind::Helmet => 2,
            EquipmentKind::Roon => 3,
        }
    }
}

/// Classification of an equipment asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentClass {
    /// Source path names exactly one known kind.
    Kind(EquipmentKind),
    /// No known path segment; admitted by every equipment slot.
    Other,
}

impl EquipmentClass {
    /// Classify a source identifier by its leading path segments.
    ///
    /// The first segment (after separator normalization) that names a kind wins, so
    /// `equip/weapon/sword.png` and `/img/equip/weapon/sword.png` are both weapons while
    /// `equip/misc/ring.png` is [`EquipmentClass::Other`]. Matching is ASCII case-insensitive and
    /// never looks at the file name itself.
    pub fn from_src(src: &str) -> Self {
        let norm = src.replace('\\', "/");
        let mut segments = norm.split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                break;
            }
            for kind in EquipmentKind::ALL {
                if seg.eq_ignore_ascii_case(kind.path_segment()) {
                    return EquipmentClass::Kind(kind);
                }
            }
        }
        EquipmentClass::Other
    }

    /// Whether an asset of this class may be placed into a `kind` slot.
    pub fn admits(self, kind: EquipmentKind) -> bool {
        match self {
            EquipmentClass::Kind(k) => k == kind,
            EquipmentClass::Other => true,
        }
    }
}

/// Read-only catalog of assets per category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Card assets.
    #[serde(default)]
    pub card: Vec<Asset>,
    /// Character assets.
    #[serde(default)]
    pub char: Vec<Asset>,
    /// Pet assets.
    #[serde(default)]
    pub pet: Vec<Asset>,
    /// Equipment assets of every kind.
    #[serde(default)]
    pub equip: Vec<Asset>,
}

impl Catalog {
    /// Parse a catalog from its JSON form.
    pub fn from_json_str(s: &str) -> RosterResult<Self> {
        let catalog: Catalog = serde_json::from_str(s)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read and parse a catalog JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> RosterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read catalog from '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Reject duplicate ids within a category.
    pub fn validate(&self) -> RosterResult<()> {
        for category in [
            AssetCategory::Card,
            AssetCategory::Char,
            AssetCategory::Pet,
            AssetCategory::Equip,
        ] {
            let mut seen = std::collections::HashSet::new();
            for asset in self.list(category) {
                if !seen.insert(asset.id.as_str()) {
                    return Err(RosterError::validation(format!(
                        "duplicate {category:?} id '{}'",
                        asset.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// All assets of one category, in catalog order.
    pub fn list(&self, category: AssetCategory) -> &[Asset] {
        match category {
            AssetCategory::Card => &self.card,
            AssetCategory::Char => &self.char,
            AssetCategory::Pet => &self.pet,
            AssetCategory::Equip => &self.equip,
        }
    }

    /// Lookup by id.
    pub fn by_id(&self, category: AssetCategory, id: &str) -> Option<&Asset> {
        self.list(category).iter().find(|a| a.id == id)
    }

    /// Lookup by display name (first match).
    pub fn by_name(&self, category: AssetCategory, name: &str) -> Option<&Asset> {
        self.list(category).iter().find(|a| a.name == name)
    }

    /// Lookup by image source (first match).
    pub fn by_src(&self, category: AssetCategory, src: &str) -> Option<&Asset> {
        self.list(category).iter().find(|a| a.src == src)
    }

    /// Equipment admitted by a `kind` slot: that kind plus everything classified `Other`.
    pub fn equipment_for(&self, kind: EquipmentKind) -> impl Iterator<Item = &Asset> {
        self.equip
            .iter()
            .filter(move |a| a.equipment_class().admits(kind))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/asset.rs"]
mod tests;
