use std::collections::BTreeMap;
use std::ops::Index;

use crate::gid::TileRef;
use crate::object::{ObjectGroup, Point};
use crate::properties::{Color, Properties};
use crate::registry::{EntityKind, Extension};
use crate::tileset::Image;

static EMPTY: Option<TileRef> = None;

/// Attributes shared by every layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub id: u32,
    pub name: String,
    pub class: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset: Point,
    pub parallax: Point,
    pub tint_color: Option<Color>,
    pub properties: Properties,
    /// Opacity multiplied through every enclosing group.
    pub effective_opacity: f32,
    /// Offset summed through every enclosing group.
    pub effective_offset: Point,
    /// False when this layer or any enclosing group is hidden.
    pub effective_visible: bool,
}

impl Default for LayerInfo {
    fn default() -> Self {
        LayerInfo {
            id: 0,
            name: String::new(),
            class: String::new(),
            visible: true,
            opacity: 1.0,
            offset: Point::default(),
            parallax: Point::new(1.0, 1.0),
            tint_color: None,
            properties: Properties::new(),
            effective_opacity: 1.0,
            effective_offset: Point::default(),
            effective_visible: true,
        }
    }
}

/// Rectangular block of cells of an infinite layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Row-major.
    pub cells: Vec<Option<TileRef>>,
}

impl Chunk {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (dx, dy) = (x as i64 - self.x as i64, y as i64 - self.y as i64);
        dx >= 0 && dy >= 0 && dx < self.width as i64 && dy < self.height as i64
    }

    fn cell(&self, x: i32, y: i32) -> &Option<TileRef> {
        let idx = (y - self.y) as usize * self.width as usize + (x - self.x) as usize;
        self.cells.get(idx).unwrap_or(&EMPTY)
    }
}

/// Chunks of an infinite layer keyed by origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunks {
    /// Keyed `(y, x)` so iteration runs row band by row band.
    by_origin: BTreeMap<(i32, i32), Chunk>,
    /// Common chunk size when every chunk sits on its own size grid.
    uniform: Option<(u32, u32)>,
}

impl Chunks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk; returns the one it displaced, if any.
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        let prev = self.by_origin.insert((chunk.y, chunk.x), chunk);
        self.uniform = self.grid_size();
        prev
    }

    /// First stored chunk sharing at least one cell with `chunk`.
    pub fn overlapping(&self, chunk: &Chunk) -> Option<&Chunk> {
        let span = |start: i32, len: u32| (start as i64, start as i64 + len as i64);
        let (ax0, ax1) = span(chunk.x, chunk.width);
        let (ay0, ay1) = span(chunk.y, chunk.height);
        self.by_origin.values().find(|c| {
            let (bx0, bx1) = span(c.x, c.width);
            let (by0, by1) = span(c.y, c.height);
            ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
        })
    }

    fn grid_size(&self) -> Option<(u32, u32)> {
        let first = self.by_origin.values().next()?;
        let (w, h) = (first.width, first.height);
        if w == 0 || h == 0 {
            return None;
        }
        self.by_origin
            .values()
            .all(|c| {
                c.width == w
                    && c.height == h
                    && c.x.rem_euclid(w as i32) == 0
                    && c.y.rem_euclid(h as i32) == 0
            })
            .then_some((w, h))
    }

    pub fn len(&self) -> usize {
        self.by_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.by_origin.values()
    }

    pub fn cell(&self, x: i32, y: i32) -> &Option<TileRef> {
        if let Some((w, h)) = self.uniform {
            let key = (
                y.div_euclid(h as i32) * h as i32,
                x.div_euclid(w as i32) * w as i32,
            );
            return match self.by_origin.get(&key) {
                Some(chunk) => chunk.cell(x, y),
                None => &EMPTY,
            };
        }
        self.by_origin
            .values()
            .find(|c| c.contains(x, y))
            .map_or(&EMPTY, |c| c.cell(x, y))
    }

    /// `(min_x, min_y, max_x, max_y)`, max exclusive.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        self.by_origin.values().fold(None, |acc, c| {
            let (x1, y1) = (c.x + c.width as i32, c.y + c.height as i32);
            Some(match acc {
                None => (c.x, c.y, x1, y1),
                Some((a, b, d, e)) => (a.min(c.x), b.min(c.y), d.max(x1), e.max(y1)),
            })
        })
    }

    /// Row-major walk over every chunk cell.
    fn row_major(&self) -> Vec<(i32, i32, Option<TileRef>)> {
        let Some((_, min_y, _, max_y)) = self.bounds() else {
            return Vec::new();
        };
        let mut by_x: Vec<&Chunk> = self.by_origin.values().collect();
        by_x.sort_by_key(|c| (c.x, c.y));

        let mut out = Vec::new();
        for y in min_y..max_y {
            for chunk in by_x.iter().filter(|c| y >= c.y && y < c.y + c.height as i32) {
                let row = (y - chunk.y) as usize * chunk.width as usize;
                for dx in 0..chunk.width as usize {
                    let cell = chunk.cells.get(row + dx).copied().flatten();
                    out.push((chunk.x + dx as i32, y, cell));
                }
            }
        }
        out
    }
}

/// Cell storage of a tile layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    /// `width * height` cells, row-major.
    Dense(Vec<Option<TileRef>>),
    Chunked(Chunks),
}

#[derive(Debug)]
pub struct TileLayer {
    pub info: LayerInfo,
    pub width: u32,
    pub height: u32,
    pub data: LayerData,
    pub ext: Extension,
}

impl TileLayer {
    pub fn is_infinite(&self) -> bool {
        matches!(self.data, LayerData::Chunked(_))
    }

    /// Cell at `(x, y)`; out-of-range coordinates read as empty.
    pub fn cell(&self, x: i32, y: i32) -> &Option<TileRef> {
        match &self.data {
            LayerData::Dense(cells) => {
                if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
                    return &EMPTY;
                }
                &cells[y as usize * self.width as usize + x as usize]
            }
            LayerData::Chunked(chunks) => chunks.cell(x, y),
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&TileRef> {
        self.cell(x, y).as_ref()
    }

    /// Every cell in row-major order, empty ones included.
    pub fn cells(&self) -> Box<dyn Iterator<Item = (i32, i32, Option<TileRef>)> + '_> {
        match &self.data {
            LayerData::Dense(cells) => {
                let w = self.width.max(1) as usize;
                Box::new(
                    cells
                        .iter()
                        .enumerate()
                        .map(move |(i, c)| ((i % w) as i32, (i / w) as i32, *c)),
                )
            }
            LayerData::Chunked(chunks) => Box::new(chunks.row_major().into_iter()),
        }
    }

    /// Non-empty cells in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32, TileRef)> + '_ {
        self.cells().filter_map(|(x, y, c)| c.map(|t| (x, y, t)))
    }
}

impl Index<(i32, i32)> for TileLayer {
    type Output = Option<TileRef>;

    fn index(&self, (x, y): (i32, i32)) -> &Option<TileRef> {
        self.cell(x, y)
    }
}

#[derive(Debug)]
pub struct ImageLayer {
    pub info: LayerInfo,
    pub image: Option<Image>,
    pub repeat_x: bool,
    pub repeat_y: bool,
    pub ext: Extension,
}

#[derive(Debug)]
pub struct GroupLayer {
    pub info: LayerInfo,
    /// Children in document order.
    pub layers: Vec<Layer>,
    pub ext: Extension,
}

#[derive(Debug)]
pub enum Layer {
    Tiles(TileLayer),
    Objects(ObjectGroup),
    Image(ImageLayer),
    Group(GroupLayer),
}

impl Layer {
    pub fn info(&self) -> &LayerInfo {
        match self {
            Layer::Tiles(l) => &l.info,
            Layer::Objects(l) => &l.info,
            Layer::Image(l) => &l.info,
            Layer::Group(l) => &l.info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Layer::Tiles(_) => EntityKind::TileLayer,
            Layer::Objects(_) => EntityKind::ObjectGroup,
            Layer::Image(_) => EntityKind::ImageLayer,
            Layer::Group(_) => EntityKind::GroupLayer,
        }
    }

    pub fn ext(&self) -> &Extension {
        match self {
            Layer::Tiles(l) => &l.ext,
            Layer::Objects(l) => &l.ext,
            Layer::Image(l) => &l.ext,
            Layer::Group(l) => &l.ext,
        }
    }

    pub(crate) fn ext_mut(&mut self) -> &mut Extension {
        match self {
            Layer::Tiles(l) => &mut l.ext,
            Layer::Objects(l) => &mut l.ext,
            Layer::Image(l) => &mut l.ext,
            Layer::Group(l) => &mut l.ext,
        }
    }

    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match self {
            Layer::Tiles(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object_group(&self) -> Option<&ObjectGroup> {
        match self {
            Layer::Objects(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_image_layer(&self) -> Option<&ImageLayer> {
        match self {
            Layer::Image(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupLayer> {
        match self {
            Layer::Group(l) => Some(l),
            _ => None,
        }
    }
}
