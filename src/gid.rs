//! Global tile id handling: flip flags, tileset range lookup and the map's
//! flattened tile index.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::properties::Properties;
use crate::tileset::Tileset;

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// Orientation bits carried by a cell code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
    pub diagonal: bool,
}

impl Flip {
    pub const NONE: Flip = Flip {
        horizontal: false,
        vertical: false,
        diagonal: false,
    };

    fn bits(self) -> u32 {
        (if self.horizontal { FLIP_H } else { 0 })
            | (if self.vertical { FLIP_V } else { 0 })
            | (if self.diagonal { FLIP_D } else { 0 })
    }
}

/// A raw cell code as stored in layer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid(pub u32);

impl Gid {
    pub fn encode(base: u32, flip: Flip) -> Self {
        Gid((base & GID_MASK) | flip.bits())
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Base id with the flip bits stripped.
    #[inline]
    pub fn base(self) -> u32 {
        self.0 & GID_MASK
    }

    #[inline]
    pub fn flip(self) -> Flip {
        Flip {
            horizontal: self.0 & FLIP_H != 0,
            vertical: self.0 & FLIP_V != 0,
            diagonal: self.0 & FLIP_D != 0,
        }
    }

    /// Base id 0 is empty whatever the flags say.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.base() == 0
    }
}

/// A resolved, non-empty cell or tile-object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRef {
    /// Base id (flags stripped).
    pub gid: u32,
    /// Index into `Map::tilesets`.
    pub tileset: usize,
    pub local_id: u32,
    pub flip: Flip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("tile id {0} is not covered by any tileset")]
    Unresolved(u32),
    #[error("tilesets #{first} and #{second} both claim tile id {gid}")]
    Overlap { first: usize, second: usize, gid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GidRange {
    first_gid: u32,
    /// One past the last base id of the range.
    end: u64,
    tileset: usize,
}

/// Sorted, non-overlapping `[first_gid, first_gid + span)` ranges.
#[derive(Debug, Clone, Default)]
pub struct GidResolver {
    ranges: Vec<GidRange>,
}

impl GidResolver {
    /// `ranges` yields `(tileset index, first_gid, span)`.
    pub fn new(ranges: impl IntoIterator<Item = (usize, u32, u32)>) -> Result<Self, ResolveError> {
        let mut ranges: Vec<GidRange> = ranges
            .into_iter()
            .map(|(tileset, first_gid, span)| GidRange {
                first_gid,
                end: first_gid as u64 + span as u64,
                tileset,
            })
            .collect();
        ranges.sort_unstable_by_key(|r| (r.first_gid, r.tileset));

        for pair in ranges.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.end > b.first_gid as u64 {
                return Err(ResolveError::Overlap {
                    first: a.tileset,
                    second: b.tileset,
                    gid: b.first_gid,
                });
            }
        }
        Ok(Self { ranges })
    }

    /// Owning tileset index and local id for a base id.
    pub fn locate(&self, base: u32) -> Option<(usize, u32)> {
        if base == 0 {
            return None;
        }
        let idx = self.ranges.partition_point(|r| r.first_gid <= base);
        let range = self.ranges.get(idx.checked_sub(1)?)?;
        ((base as u64) < range.end).then(|| (range.tileset, base - range.first_gid))
    }

    /// `Ok(None)` for empty cells.
    pub fn resolve(&self, raw: u32) -> Result<Option<TileRef>, ResolveError> {
        let gid = Gid(raw);
        if gid.is_empty() {
            return Ok(None);
        }
        let (tileset, local_id) = self
            .locate(gid.base())
            .ok_or(ResolveError::Unresolved(gid.base()))?;
        Ok(Some(TileRef {
            gid: gid.base(),
            tileset,
            local_id,
            flip: gid.flip(),
        }))
    }
}

/// Entry of the map's flattened tile index.
#[derive(Debug, Clone, PartialEq)]
pub struct TileEntry {
    pub tileset: usize,
    pub local_id: u32,
    /// Tileset properties overlaid with the tile's own.
    pub properties: Properties,
}

/// One entry per tile of every tileset, keyed by base id.
pub fn build_tile_index(tilesets: &[Tileset]) -> BTreeMap<u32, TileEntry> {
    let mut index = BTreeMap::new();
    for (ts_idx, ts) in tilesets.iter().enumerate() {
        for tile in &ts.tiles {
            let Some(gid) = ts.first_gid.checked_add(tile.id) else {
                continue;
            };
            index.insert(
                gid,
                TileEntry {
                    tileset: ts_idx,
                    local_id: tile.id,
                    properties: ts.properties.merged(&tile.properties),
                },
            );
        }
    }
    index
}
