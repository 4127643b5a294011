use std::collections::BTreeSet;

use crate::catalog::asset::{Asset, EquipmentKind};
use crate::foundation::error::{RosterError, RosterResult};
use crate::roster::formation::{CharacterFormation, PetFormation, Transition};

/// Number of character roster slots.
pub const CHARACTER_SLOTS: usize = 5;
/// Number of pet slots.
pub const PET_SLOTS: usize = 3;

/// Equipment attached to a character slot, one per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Equips {
    slots: [Option<Asset>; 4],
}

impl Equips {
    /// Equipment in `kind`'s slot.
    pub fn get(&self, kind: EquipmentKind) -> Option<&Asset> {
        self.slots[kind.index()].as_ref()
    }

    /// `(kind, equipment)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (EquipmentKind, Option<&Asset>)> {
        EquipmentKind::ALL
            .into_iter()
            .map(|k| (k, self.slots[k.index()].as_ref()))
    }

    fn set(&mut self, kind: EquipmentKind, asset: Option<Asset>) {
        self.slots[kind.index()] = asset;
    }

    fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// One roster entry: a character with its card and equipment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterSlot {
    /// Stable slot id (`slot-<index>`).
    pub id: String,
    /// Assigned character.
    pub char: Option<Asset>,
    /// Assigned card.
    pub card: Option<Asset>,
    /// Assigned equipment.
    pub equips: Equips,
}

impl CharacterSlot {
    fn pristine(index: usize) -> Self {
        Self {
            id: format!("slot-{index}"),
            char: None,
            card: None,
            equips: Equips::default(),
        }
    }

    /// Whether nothing at all is assigned.
    pub fn is_pristine(&self) -> bool {
        self.char.is_none() && self.card.is_none() && self.equips.is_empty()
    }
}

/// Owner of all roster state: character slots, pet slots, and both formations.
///
/// Mutations run synchronously and either apply completely or leave the model untouched.
/// Misuse (out-of-range index, an id already held by another slot, equipment whose source does
/// not admit the target kind) is reported as [`RosterError::Validation`]; formation policy
/// refusals are reported as [`Transition::Rejected`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotAssignmentModel {
    slots: [CharacterSlot; CHARACTER_SLOTS],
    pets: [Option<Asset>; PET_SLOTS],
    formation: CharacterFormation,
    pet_formation: PetFormation,
}

impl Default for SlotAssignmentModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotAssignmentModel {
    /// Fixed-size, all-empty skeleton.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(CharacterSlot::pristine),
            pets: std::array::from_fn(|_| None),
            formation: CharacterFormation::characters(),
            pet_formation: PetFormation::pets(),
        }
    }

    /// Character slots in order.
    pub fn slots(&self) -> &[CharacterSlot; CHARACTER_SLOTS] {
        &self.slots
    }

    /// One character slot.
    pub fn slot(&self, index: usize) -> RosterResult<&CharacterSlot> {
        Self::check_slot(index)?;
        Ok(&self.slots[index])
    }

    /// Pet slots in order.
    pub fn pets(&self) -> &[Option<Asset>; PET_SLOTS] {
        &self.pets
    }

    /// Character formation.
    pub fn formation(&self) -> &CharacterFormation {
        &self.formation
    }

    /// Pet formation.
    pub fn pet_formation(&self) -> &PetFormation {
        &self.pet_formation
    }

    /// Replace the character of one slot.
    pub fn set_character(&mut self, index: usize, asset: Option<Asset>) -> RosterResult<()> {
        Self::check_slot(index)?;
        if let Some(a) = &asset
            && self.taken_character_ids(Some(index)).contains(a.id.as_str())
        {
            return Err(RosterError::validation(format!(
                "character '{}' is already assigned to another slot",
                a.id
            )));
        }
        self.slots[index].char = asset;
        Ok(())
    }

    /// Replace the card of one slot.
    pub fn set_card(&mut self, index: usize, asset: Option<Asset>) -> RosterResult<()> {
        Self::check_slot(index)?;
        if let Some(a) = &asset
            && self.taken_card_ids(Some(index)).contains(a.id.as_str())
        {
            return Err(RosterError::validation(format!(
                "card '{}' is already assigned to another slot",
                a.id
            )));
        }
        self.slots[index].card = asset;
        Ok(())
    }

    /// Replace one equipment kind of one slot.
    pub fn set_equipment(
        &mut self,
        index: usize,
        kind: EquipmentKind,
        asset: Option<Asset>,
    ) -> RosterResult<()> {
        Self::check_slot(index)?;
        if let Some(a) = &asset
            && !a.equipment_class().admits(kind)
        {
            return Err(RosterError::validation(format!(
                "equipment '{}' ({}) does not fit the {kind:?} slot",
                a.id, a.src
            )));
        }
        self.slots[index].equips.set(kind, asset);
        Ok(())
    }

    /// Restore one character slot to its pristine empty shape.
    pub fn reset_slot(&mut self, index: usize) -> RosterResult<()> {
        Self::check_slot(index)?;
        self.slots[index] = CharacterSlot::pristine(index);
        Ok(())
    }

    /// Replace one pet slot.
    pub fn set_pet(&mut self, index: usize, asset: Option<Asset>) -> RosterResult<()> {
        if index >= PET_SLOTS {
            return Err(RosterError::validation(format!(
                "pet slot {index} out of range (0..{PET_SLOTS})"
            )));
        }
        self.pets[index] = asset;
        Ok(())
    }

    /// Move-or-clear assignment into the character formation.
    pub fn assign_formation(
        &mut self,
        position: usize,
        asset: Option<Asset>,
    ) -> RosterResult<Transition> {
        self.formation.assign(position, asset)
    }

    /// Move-or-clear assignment into the pet formation.
    pub fn assign_pet_formation(
        &mut self,
        position: usize,
        asset: Option<Asset>,
    ) -> RosterResult<Transition> {
        self.pet_formation.assign(position, asset)
    }

    /// Return the whole model to its start-of-session skeleton.
    pub fn reset_all(&mut self) {
        *self = Self::new();
    }

    /// Character ids held by slots other than `except`.
    ///
    /// Pickers use this to build candidate lists.
    pub fn taken_character_ids(&self, except: Option<usize>) -> BTreeSet<&str> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != except)
            .filter_map(|(_, s)| s.char.as_ref().map(|a| a.id.as_str()))
            .collect()
    }

    /// Card ids held by slots other than `except`.
    pub fn taken_card_ids(&self, except: Option<usize>) -> BTreeSet<&str> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != except)
            .filter_map(|(_, s)| s.card.as_ref().map(|a| a.id.as_str()))
            .collect()
    }

    /// Image sources the compositor draws for this snapshot, deduplicated and sorted.
    pub fn required_sources(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for slot in &self.slots {
            out.extend(slot.char.as_ref().map(|a| a.src.as_str()));
            out.extend(slot.card.as_ref().map(|a| a.src.as_str()));
            out.extend(slot.equips.iter().filter_map(|(_, a)| a.map(|a| a.src.as_str())));
        }
        out.extend(
            self.pet_formation
                .positions()
                .iter()
                .flatten()
                .map(|a| a.src.as_str()),
        );
        out
    }

    fn check_slot(index: usize) -> RosterResult<()> {
        if index >= CHARACTER_SLOTS {
            return Err(RosterError::validation(format!(
                "character slot {index} out of range (0..{CHARACTER_SLOTS})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/roster/model.rs"]
mod tests;
