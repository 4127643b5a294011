use xxhash_rust::xxh3::Xxh3;

use crate::assets::cache::{AssetCache, LoadStatus};
use crate::catalog::asset::Asset;
use crate::roster::model::SlotAssignmentModel;

const XXH3_SEED: u64 = 0x52c3_71e0_9ad4_b6f5;

/// Stable fingerprint of everything a drawn card depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneFingerprint {
    /// High 64 bits.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

/// Fingerprint the drawn inputs: canvas width, pixel ratio, the drawn parts of the model, the note,
/// and whether each required source is resident.
///
/// Pet slots and the character formation are not drawn and do not contribute.
pub fn fingerprint_scene(
    canvas_width: f64,
    ratio: f64,
    model: &SlotAssignmentModel,
    note: &str,
    cache: &AssetCache,
) -> SceneFingerprint {
    let mut h = StableHasher::new();
    h.write_f64(canvas_width);
    h.write_f64(ratio);

    for slot in model.slots() {
        write_opt_asset(&mut h, slot.char.as_ref(), cache);
        write_opt_asset(&mut h, slot.card.as_ref(), cache);
        for (_, equip) in slot.equips.iter() {
            write_opt_asset(&mut h, equip, cache);
        }
    }
    for pet in model.pet_formation().positions() {
        write_opt_asset(&mut h, pet.as_ref(), cache);
    }

    h.write_str(note);
    h.finish()
}

fn write_opt_asset(h: &mut StableHasher, asset: Option<&Asset>, cache: &AssetCache) {
    let Some(a) = asset else {
        h.write_u8(0);
        return;
    };
    h.write_u8(1);
    h.write_str(&a.id);
    h.write_str(&a.name);
    h.write_str(&a.src);
    h.write_bool(cache.status(&a.src) == LoadStatus::Ready);
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> SceneFingerprint {
        let v = self.inner.digest128();
        SceneFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}
