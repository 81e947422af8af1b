use std::path::PathBuf;

use crate::object::{ObjectGroup, Point};
use crate::properties::{Color, Properties};
use crate::registry::Extension;

/// Image reference; `source` is already joined with the declaring
/// document's directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub source: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Color treated as transparent.
    pub trans: Option<Color>,
}

/// Animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub tile_id: u32,
    /// Milliseconds.
    pub duration: u32,
}

/// Source rectangle of a tile inside its tileset atlas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct Tile {
    /// Local id inside the owning tileset.
    pub id: u32,
    pub class: String,
    /// Own image for image-collection tilesets.
    pub image: Option<Image>,
    pub properties: Properties,
    pub probability: f32,
    pub animation: Vec<Frame>,
    pub collision: Option<ObjectGroup>,
    pub ext: Extension,
}

impl Tile {
    pub(crate) fn blank(id: u32) -> Self {
        Tile {
            id,
            class: String::new(),
            image: None,
            properties: Properties::new(),
            probability: 1.0,
            animation: Vec::new(),
            collision: None,
            ext: Extension::default(),
        }
    }

    pub fn is_animated(&self) -> bool {
        !self.animation.is_empty()
    }
}

#[derive(Debug)]
pub struct Tileset {
    pub name: String,
    pub class: String,
    pub first_gid: u32,
    /// External `.tsx`/`.json` file this tileset was read from.
    pub source: Option<PathBuf>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub margin: u32,
    /// Declared `tilecount`; may be smaller than [`Tileset::span`].
    pub tile_count: u32,
    pub columns: u32,
    /// Drawing offset applied to every tile.
    pub tile_offset: Point,
    /// Atlas image; `None` for image collections.
    pub image: Option<Image>,
    pub properties: Properties,
    /// One record per local id in `0..span`, declared or not.
    pub tiles: Vec<Tile>,
    pub ext: Extension,
}

impl Tileset {
    /// Number of global ids this tileset claims.
    pub fn span(&self) -> u32 {
        self.tiles.len() as u32
    }

    pub fn tile(&self, local_id: u32) -> Option<&Tile> {
        self.tiles.get(local_id as usize)
    }

    pub fn contains_gid(&self, gid: u32) -> bool {
        gid >= self.first_gid && ((gid - self.first_gid) as usize) < self.tiles.len()
    }

    /// Atlas rectangle of `local_id`; `None` for image collections or ids
    /// past the end.
    pub fn tile_rect(&self, local_id: u32) -> Option<TileRect> {
        if self.image.is_none() || self.columns == 0 || local_id >= self.span() {
            return None;
        }
        let col = local_id % self.columns;
        let row = local_id / self.columns;
        Some(TileRect {
            x: self.margin + col * (self.tile_width + self.spacing),
            y: self.margin + row * (self.tile_height + self.spacing),
            width: self.tile_width,
            height: self.tile_height,
        })
    }

    /// Columns derived from the atlas width when the document omits them.
    pub(crate) fn derive_columns(image_width: u32, tile_width: u32, spacing: u32, margin: u32) -> u32 {
        if tile_width == 0 {
            return 0;
        }
        let usable = image_width.saturating_sub(2 * margin) + spacing;
        usable / (tile_width + spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas(columns: u32, count: u32) -> Tileset {
        Tileset {
            name: "terrain".into(),
            class: String::new(),
            first_gid: 10,
            source: None,
            tile_width: 16,
            tile_height: 16,
            spacing: 2,
            margin: 1,
            tile_count: count,
            columns,
            tile_offset: Point::default(),
            image: Some(Image {
                source: PathBuf::from("terrain.png"),
                width: Some(1 + columns * 18 - 2 + 1),
                height: None,
                trans: None,
            }),
            properties: Properties::new(),
            tiles: (0..count).map(Tile::blank).collect(),
            ext: Extension::default(),
        }
    }

    #[test]
    fn rect_accounts_for_margin_and_spacing() {
        let ts = atlas(4, 8);
        assert_eq!(
            ts.tile_rect(5),
            Some(TileRect { x: 1 + 18, y: 1 + 18, width: 16, height: 16 })
        );
        assert_eq!(ts.tile_rect(8), None);
    }

    #[test]
    fn gid_containment_uses_span() {
        let ts = atlas(4, 8);
        assert!(!ts.contains_gid(9));
        assert!(ts.contains_gid(10));
        assert!(ts.contains_gid(17));
        assert!(!ts.contains_gid(18));
    }

    #[test]
    fn derived_columns() {
        // 1px margin, 2px spacing, four 16px tiles
        assert_eq!(Tileset::derive_columns(1 + 4 * 16 + 3 * 2 + 1, 16, 2, 1), 4);
        assert_eq!(Tileset::derive_columns(64, 16, 0, 0), 4);
        assert_eq!(Tileset::derive_columns(64, 0, 0, 0), 0);
    }
}
