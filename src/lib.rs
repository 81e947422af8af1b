//! Tiled map loader: reads `.tmx`/`.tmj` maps with their tilesets into a
//! typed entity graph, with host specializations for editor classes.
//!
//! ```no_run
//! use tmx_graph::Loader;
//!
//! let map = Loader::new().load("assets/level1.tmx")?;
//! for (x, y, tile) in map.layers[0].as_tile_layer().unwrap().tiles() {
//!     let props = map.tile_properties(tile.gid);
//!     println!("{x},{y}: {props:?}");
//! }
//! # Ok::<(), tmx_graph::MapError>(())
//! ```

mod builder;
pub mod codec;
mod error;
pub mod gid;
pub mod layer;
pub mod loader;
pub mod map;
pub mod object;
pub mod project;
pub mod properties;
pub mod registry;
#[cfg(feature = "macroquad")]
pub mod render;
pub mod tileset;
pub mod tree;

pub use error::{Anomaly, MapError, RegistryError};
pub use gid::{Flip, Gid, TileRef};
pub use layer::{GroupLayer, ImageLayer, Layer, LayerData, LayerInfo, TileLayer};
pub use loader::{FsReader, LoadOptions, Loader, MemoryReader, ResourceReader};
pub use map::{EntityPath, Map, ObjectHandle};
pub use object::{Object, ObjectGroup, ObjectShape, Point, Text};
pub use properties::{Color, ObjectRef, Properties, PropertyTypes, PropertyValue};
pub use registry::{EntityKind, EntityRef, Extension, Specialization, TypeRegistry};
pub use tileset::{Image, Tile, Tileset};

use std::path::Path;

/// Loads a map from the filesystem with an empty registry.
pub fn load(path: impl AsRef<Path>) -> Result<Map, MapError> {
    Loader::new().load(path)
}
