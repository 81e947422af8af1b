use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Anomaly;
use crate::gid::{TileEntry, TileRef, GID_MASK};
use crate::layer::Layer;
use crate::object::{Object, Point};
use crate::properties::{Color, ObjectRef, Properties};
use crate::registry::{EntityRef, Extension};
use crate::tileset::{Tile, Tileset};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            "staggered" => Ok(Orientation::Staggered),
            "hexagonal" => Ok(Orientation::Hexagonal),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderOrder {
    #[default]
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

impl FromStr for RenderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right-down" => Ok(RenderOrder::RightDown),
            "right-up" => Ok(RenderOrder::RightUp),
            "left-down" => Ok(RenderOrder::LeftDown),
            "left-up" => Ok(RenderOrder::LeftUp),
            other => Err(format!("unknown render order '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaggerAxis {
    X,
    Y,
}

impl FromStr for StaggerAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(StaggerAxis::X),
            "y" => Ok(StaggerAxis::Y),
            other => Err(format!("unknown stagger axis '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaggerIndex {
    Odd,
    Even,
}

impl FromStr for StaggerIndex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "odd" => Ok(StaggerIndex::Odd),
            "even" => Ok(StaggerIndex::Even),
            other => Err(format!("unknown stagger index '{other}'")),
        }
    }
}

/// Stable address of an object inside [`Map::layers`]: the layer path
/// through any groups, then the index in that object group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub layer: Vec<usize>,
    pub index: usize,
}

/// Address of any entity of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityPath {
    Map,
    Tileset(usize),
    Tile { tileset: usize, tile: usize },
    /// Collision group of a tile.
    Collision { tileset: usize, tile: usize },
    CollisionObject { tileset: usize, tile: usize, object: usize },
    /// Index path through group layers.
    Layer(Vec<usize>),
    Object(ObjectHandle),
}

/// A loaded map and everything it owns.
#[derive(Debug)]
pub struct Map {
    /// Document the map was read from.
    pub source: PathBuf,
    pub version: String,
    pub tiled_version: Option<String>,
    pub class: String,
    pub orientation: Orientation,
    pub render_order: RenderOrder,
    /// In tiles.
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub hex_side_length: Option<u32>,
    pub stagger_axis: Option<StaggerAxis>,
    pub stagger_index: Option<StaggerIndex>,
    pub parallax_origin: Point,
    pub background_color: Option<Color>,
    pub next_layer_id: Option<u32>,
    pub next_object_id: Option<u32>,
    pub infinite: bool,
    /// Document order.
    pub tilesets: Vec<Tileset>,
    /// Top-level layers in document order.
    pub layers: Vec<Layer>,
    /// Every tile of every tileset keyed by base id.
    pub tile_index: BTreeMap<u32, TileEntry>,
    pub properties: Properties,
    /// Non-fatal problems met while loading.
    pub anomalies: Vec<Anomaly>,
    pub ext: Extension,
    pub(crate) object_index: HashMap<u32, ObjectHandle>,
}

impl Map {
    pub fn pixel_width(&self) -> u32 {
        self.width * self.tile_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.height * self.tile_height
    }

    /// Tile record for a cell code; flip bits are ignored.
    pub fn tile(&self, gid: u32) -> Option<&Tile> {
        let entry = self.tile_index.get(&(gid & GID_MASK))?;
        self.tilesets.get(entry.tileset)?.tile(entry.local_id)
    }

    /// Tileset properties overlaid with the tile's own.
    pub fn tile_properties(&self, gid: u32) -> Option<&Properties> {
        self.tile_index.get(&(gid & GID_MASK)).map(|e| &e.properties)
    }

    pub fn tileset_of(&self, tile: &TileRef) -> Option<&Tileset> {
        self.tilesets.get(tile.tileset)
    }

    pub fn tile_of(&self, tile: &TileRef) -> Option<&Tile> {
        self.tileset_of(tile)?.tile(tile.local_id)
    }

    pub fn tileset_by_name(&self, name: &str) -> Option<&Tileset> {
        self.tilesets.iter().find(|t| t.name == name)
    }

    pub fn layer_at(&self, path: &[usize]) -> Option<&Layer> {
        let (first, rest) = path.split_first()?;
        let mut layer = self.layers.get(*first)?;
        for idx in rest {
            layer = layer.as_group()?.layers.get(*idx)?;
        }
        Some(layer)
    }

    fn layer_at_mut(&mut self, path: &[usize]) -> Option<&mut Layer> {
        let (first, rest) = path.split_first()?;
        let mut layer = self.layers.get_mut(*first)?;
        for idx in rest {
            layer = match layer {
                Layer::Group(g) => g.layers.get_mut(*idx)?,
                _ => return None,
            };
        }
        Some(layer)
    }

    /// Depth-first, pre-order walk of every layer with its path.
    pub fn all_layers(&self) -> Vec<(Vec<usize>, &Layer)> {
        fn walk<'a>(layers: &'a [Layer], prefix: &[usize], out: &mut Vec<(Vec<usize>, &'a Layer)>) {
            for (i, layer) in layers.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(i);
                out.push((path.clone(), layer));
                if let Layer::Group(g) = layer {
                    walk(&g.layers, &path, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.layers, &[], &mut out);
        out
    }

    /// First layer with that name, searched depth-first.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.all_layers()
            .into_iter()
            .map(|(_, l)| l)
            .find(|l| l.name() == name)
    }

    pub fn object(&self, handle: &ObjectHandle) -> Option<&Object> {
        self.layer_at(&handle.layer)?
            .as_object_group()?
            .objects
            .get(handle.index)
    }

    pub fn object_by_id(&self, id: u32) -> Option<&Object> {
        self.object(self.object_index.get(&id)?)
    }

    pub fn handle_of(&self, id: u32) -> Option<&ObjectHandle> {
        self.object_index.get(&id)
    }

    /// Target of an `object` property, if it was resolved.
    pub fn referenced(&self, reference: &ObjectRef) -> Option<&Object> {
        self.object(reference.handle()?)
    }

    /// Every layer object with its handle, layers depth-first.
    pub fn objects(&self) -> Vec<(ObjectHandle, &Object)> {
        self.all_layers()
            .into_iter()
            .filter_map(|(path, layer)| Some((path, layer.as_object_group()?)))
            .flat_map(|(path, group)| {
                group.objects.iter().enumerate().map(move |(index, o)| {
                    (
                        ObjectHandle {
                            layer: path.clone(),
                            index,
                        },
                        o,
                    )
                })
            })
            .collect()
    }

    pub fn entity(&self, path: &EntityPath) -> Option<EntityRef<'_>> {
        Some(match path {
            EntityPath::Map => EntityRef::Map(self),
            EntityPath::Tileset(ts) => EntityRef::Tileset(self.tilesets.get(*ts)?),
            EntityPath::Tile { tileset, tile } => {
                EntityRef::Tile(self.tilesets.get(*tileset)?.tiles.get(*tile)?)
            }
            EntityPath::Collision { tileset, tile } => EntityRef::ObjectGroup(
                self.tilesets.get(*tileset)?.tiles.get(*tile)?.collision.as_ref()?,
            ),
            EntityPath::CollisionObject { tileset, tile, object } => EntityRef::Object(
                self.tilesets
                    .get(*tileset)?
                    .tiles
                    .get(*tile)?
                    .collision
                    .as_ref()?
                    .objects
                    .get(*object)?,
            ),
            EntityPath::Layer(p) => match self.layer_at(p)? {
                Layer::Tiles(l) => EntityRef::TileLayer(l),
                Layer::Objects(l) => EntityRef::ObjectGroup(l),
                Layer::Image(l) => EntityRef::ImageLayer(l),
                Layer::Group(l) => EntityRef::GroupLayer(l),
            },
            EntityPath::Object(handle) => EntityRef::Object(self.object(handle)?),
        })
    }

    pub(crate) fn extension_mut(&mut self, path: &EntityPath) -> Option<&mut Extension> {
        Some(match path {
            EntityPath::Map => &mut self.ext,
            EntityPath::Tileset(ts) => &mut self.tilesets.get_mut(*ts)?.ext,
            EntityPath::Tile { tileset, tile } => {
                &mut self.tilesets.get_mut(*tileset)?.tiles.get_mut(*tile)?.ext
            }
            EntityPath::Collision { tileset, tile } => {
                &mut self.tilesets.get_mut(*tileset)?.tiles.get_mut(*tile)?.collision.as_mut()?.ext
            }
            EntityPath::CollisionObject { tileset, tile, object } => {
                &mut self
                    .tilesets
                    .get_mut(*tileset)?
                    .tiles
                    .get_mut(*tile)?
                    .collision
                    .as_mut()?
                    .objects
                    .get_mut(*object)?
                    .ext
            }
            EntityPath::Layer(p) => self.layer_at_mut(p)?.ext_mut(),
            EntityPath::Object(handle) => match self.layer_at_mut(&handle.layer)? {
                Layer::Objects(g) => &mut g.objects.get_mut(handle.index)?.ext,
                _ => return None,
            },
        })
    }

    /// Every entity, descendants before their parent, siblings in document
    /// order: tilesets first, then layers, the map last.
    pub fn post_order(&self) -> Vec<EntityPath> {
        fn walk(layers: &[Layer], prefix: &[usize], out: &mut Vec<EntityPath>) {
            for (i, layer) in layers.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(i);
                match layer {
                    Layer::Objects(g) => out.extend((0..g.objects.len()).map(|index| {
                        EntityPath::Object(ObjectHandle {
                            layer: path.clone(),
                            index,
                        })
                    })),
                    Layer::Group(g) => walk(&g.layers, &path, out),
                    Layer::Tiles(_) | Layer::Image(_) => {}
                }
                out.push(EntityPath::Layer(path));
            }
        }

        let mut out = Vec::new();
        for (tileset, ts) in self.tilesets.iter().enumerate() {
            for (tile, t) in ts.tiles.iter().enumerate() {
                if let Some(collision) = &t.collision {
                    out.extend((0..collision.objects.len()).map(|object| {
                        EntityPath::CollisionObject { tileset, tile, object }
                    }));
                    out.push(EntityPath::Collision { tileset, tile });
                }
                out.push(EntityPath::Tile { tileset, tile });
            }
            out.push(EntityPath::Tileset(tileset));
        }
        walk(&self.layers, &[], &mut out);
        out.push(EntityPath::Map);
        out
    }
}
