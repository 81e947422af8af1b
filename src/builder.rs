//! Turns an attributed tree into the map graph.
//!
//! Tilesets are built first so every tile id met afterwards can be resolved.
//! Layers follow in document order. Object references inside properties are
//! resolved in a second pass, once every object id is known.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{self, Compression, DecodeError, Encoding};
use crate::error::{Anomaly, MapError};
use crate::gid::{build_tile_index, GidResolver, ResolveError, TileRef, GID_MASK};
use crate::layer::{Chunk, Chunks, GroupLayer, ImageLayer, Layer, LayerData, LayerInfo, TileLayer};
use crate::loader::{resolve_relative, Loader};
use crate::map::{Map, ObjectHandle};
use crate::object::{parse_points, DrawOrder, Object, ObjectGroup, ObjectShape, Point, Text};
use crate::properties::{Color, ObjectRef, Properties, PropertyTyper};
use crate::registry::EntityRef;
use crate::tileset::{Frame, Image, Tile, Tileset};
use crate::tree::{Element, Location};

pub(crate) fn build_map(loader: &Loader, root: &Element, path: &Path) -> Result<Map, MapError> {
    let loc = Location::root(path, root);
    if root.tag != "map" {
        return Err(loc.malformed(format!("expected a <map> root, found <{}>", root.tag)));
    }
    let mut builder = Builder {
        loader,
        infinite: false,
        anomalies: Vec::new(),
    };
    builder.map(root, path, &loc)
}

/// Layer attributes composed through enclosing groups.
#[derive(Debug, Clone, Copy)]
struct Inherited {
    opacity: f32,
    offset: Point,
    visible: bool,
}

impl Inherited {
    const ROOT: Inherited = Inherited {
        opacity: 1.0,
        offset: Point::new(0.0, 0.0),
        visible: true,
    };

    fn of(info: &LayerInfo) -> Self {
        Inherited {
            opacity: info.effective_opacity,
            offset: info.effective_offset,
            visible: info.effective_visible,
        }
    }
}

/// Tile id resolution against the map's tilesets.
struct Gids<'a> {
    resolver: GidResolver,
    tilesets: &'a [Tileset],
}

impl Gids<'_> {
    fn resolve(&self, raw: u32, loc: &Location) -> Result<Option<TileRef>, MapError> {
        self.resolver.resolve(raw).map_err(|e| match e {
            ResolveError::Unresolved(gid) => MapError::UnresolvedTileId {
                path: loc.document().to_path_buf(),
                element: loc.element().to_owned(),
                gid,
            },
            other => loc.malformed(other),
        })
    }
}

struct Builder<'l> {
    loader: &'l Loader,
    /// Tile layers store chunks, even when they declare none.
    infinite: bool,
    anomalies: Vec<Anomaly>,
}

impl Builder<'_> {
    fn map(&mut self, el: &Element, path: &Path, loc: &Location) -> Result<Map, MapError> {
        self.infinite = loc.flag(el, "infinite", false)?;
        let mut tilesets = Vec::new();
        for ts in el.children_named("tileset") {
            tilesets.push(self.tileset(ts, path, loc)?);
        }
        let resolver = GidResolver::new(
            tilesets
                .iter()
                .enumerate()
                .map(|(i, ts)| (i, ts.first_gid, ts.span())),
        )
        .map_err(|e| match e {
            ResolveError::Overlap { first, second, gid } => MapError::OverlappingTilesetRanges {
                path: path.to_path_buf(),
                first: tilesets[first].name.clone(),
                second: tilesets[second].name.clone(),
                gid,
            },
            other => loc.malformed(other),
        })?;

        let gids = Gids {
            resolver,
            tilesets: &tilesets,
        };
        let layers = self.layers(el, &gids, Inherited::ROOT, path, loc)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let properties = self.properties(el, dir, loc);

        let mut map = Map {
            source: path.to_path_buf(),
            version: el.attr("version").unwrap_or("1.0").to_owned(),
            tiled_version: el.attr("tiledversion").map(str::to_owned),
            class: class_of(el),
            orientation: loc.parse(el, "orientation")?.unwrap_or_default(),
            render_order: loc.parse(el, "renderorder")?.unwrap_or_default(),
            width: loc.required(el, "width")?,
            height: loc.required(el, "height")?,
            tile_width: loc.required(el, "tilewidth")?,
            tile_height: loc.required(el, "tileheight")?,
            hex_side_length: loc.parse(el, "hexsidelength")?,
            stagger_axis: loc.parse(el, "staggeraxis")?,
            stagger_index: loc.parse(el, "staggerindex")?,
            parallax_origin: Point::new(
                loc.parse_or(el, "parallaxoriginx", 0.0)?,
                loc.parse_or(el, "parallaxoriginy", 0.0)?,
            ),
            background_color: loc.parse(el, "backgroundcolor")?,
            next_layer_id: loc.parse(el, "nextlayerid")?,
            next_object_id: loc.parse(el, "nextobjectid")?,
            infinite: self.infinite,
            tilesets,
            layers,
            tile_index: BTreeMap::new(),
            properties,
            anomalies: Vec::new(),
            ext: Default::default(),
            object_index: HashMap::new(),
        };

        map.object_index = index_objects(&map, loc)?;
        resolve_object_refs(&mut map, &mut self.anomalies);
        map.tile_index = build_tile_index(&map.tilesets);
        map.ext = self.loader.registry.extension_for(EntityRef::Map(&map));
        map.anomalies = std::mem::take(&mut self.anomalies);

        if self.loader.options.strict {
            if let Some(anomaly) = map.anomalies.first() {
                return Err(MapError::Anomaly {
                    path: path.to_path_buf(),
                    anomaly: anomaly.clone(),
                });
            }
        }
        Ok(map)
    }

    fn properties(&mut self, owner: &Element, dir: &Path, loc: &Location) -> Properties {
        let loader = self.loader;
        PropertyTyper {
            types: &loader.property_types,
            base_dir: dir,
            anomalies: &mut self.anomalies,
        }
        .properties_of(owner, loc)
    }

    /// `doc` is the document the reference appears in.
    fn tileset(&mut self, el: &Element, doc: &Path, parent: &Location) -> Result<Tileset, MapError> {
        let loc = parent.child(el);
        let first_gid: u32 = loc.required(el, "firstgid")?;
        let Some(source) = el.attr("source") else {
            return self.tileset_body(el, first_gid, None, doc, &loc);
        };

        let ext_path = resolve_relative(doc, source);
        debug!(source = %ext_path.display(), first_gid, "reading external tileset");
        let mut external = self.loader.read_document(&ext_path)?;
        let ext_loc = loc.in_document(&ext_path);
        if external.tag != "tileset" {
            return Err(ext_loc.malformed(format!(
                "expected a <tileset> root, found <{}>",
                external.tag
            )));
        }
        // attributes of the referencing element win
        for (name, value) in &el.attributes {
            if name != "source" {
                external.set_attr(name.clone(), value.clone());
            }
        }
        self.tileset_body(&external, first_gid, Some(ext_path.clone()), &ext_path, &ext_loc)
    }

    fn tileset_body(
        &mut self,
        el: &Element,
        first_gid: u32,
        source: Option<PathBuf>,
        doc: &Path,
        loc: &Location,
    ) -> Result<Tileset, MapError> {
        let dir = doc.parent().unwrap_or_else(|| Path::new(""));
        let tile_width: u32 = loc.required(el, "tilewidth")?;
        let tile_height: u32 = loc.required(el, "tileheight")?;
        let spacing = loc.parse_or(el, "spacing", 0u32)?;
        let margin = loc.parse_or(el, "margin", 0u32)?;
        let image = match el.child("image") {
            Some(img) => Some(image(img, doc, &loc.child(img))?),
            None => None,
        };

        let columns = match loc.parse::<u32>(el, "columns")? {
            Some(c) => c,
            None => image
                .as_ref()
                .and_then(|i| i.width)
                .map_or(0, |w| Tileset::derive_columns(w, tile_width, spacing, margin)),
        };
        // older documents omit tilecount; derive it from the atlas
        let tile_count = match loc.parse::<u32>(el, "tilecount")? {
            Some(c) => c,
            None => image.as_ref().and_then(|i| i.height).map_or(0, |h| {
                columns * Tileset::derive_columns(h, tile_height, spacing, margin)
            }),
        };

        let tile_offset = match el.child("tileoffset") {
            Some(off) => {
                let oloc = loc.child(off);
                Point::new(oloc.parse_or(off, "x", 0.0)?, oloc.parse_or(off, "y", 0.0)?)
            }
            None => Point::default(),
        };
        let properties = self.properties(el, dir, loc);

        let mut declared: BTreeMap<u32, Tile> = BTreeMap::new();
        for tile_el in el.children_named("tile") {
            let tile = self.tile(tile_el, doc, &loc.child(tile_el))?;
            let id = tile.id;
            if declared.insert(id, tile).is_some() {
                return Err(loc.malformed(format!("tile id {id} is declared twice")));
            }
        }
        let span = declared
            .last_key_value()
            .map_or(tile_count as u64, |(id, _)| (tile_count as u64).max(*id as u64 + 1));
        if first_gid == 0 {
            return Err(loc.malformed("firstgid must be at least 1"));
        }
        // every global id of the range must fit below the flip bits
        if first_gid as u64 + span > GID_MASK as u64 + 1 {
            return Err(loc.malformed(format!(
                "tile ids {first_gid}..{} exceed the largest global id {GID_MASK}",
                first_gid as u64 + span
            )));
        }
        let span = span as u32;

        let loader = self.loader;
        let registry = &loader.registry;
        let tiles = (0..span)
            .map(|id| {
                let mut tile = declared.remove(&id).unwrap_or_else(|| Tile::blank(id));
                tile.ext = registry.extension_for(EntityRef::Tile(&tile));
                tile
            })
            .collect();

        let mut tileset = Tileset {
            name: el.attr("name").unwrap_or_default().to_owned(),
            class: class_of(el),
            first_gid,
            source,
            tile_width,
            tile_height,
            spacing,
            margin,
            tile_count,
            columns,
            tile_offset,
            image,
            properties,
            tiles,
            ext: Default::default(),
        };
        debug!(name = %tileset.name, first_gid, span, "tileset built");
        tileset.ext = registry.extension_for(EntityRef::Tileset(&tileset));
        Ok(tileset)
    }

    fn tile(&mut self, el: &Element, doc: &Path, loc: &Location) -> Result<Tile, MapError> {
        let dir = doc.parent().unwrap_or_else(|| Path::new(""));
        let mut tile = Tile::blank(loc.required(el, "id")?);
        tile.class = class_of(el);
        tile.probability = loc.parse_or(el, "probability", 1.0)?;
        if let Some(img) = el.child("image") {
            tile.image = Some(image(img, doc, &loc.child(img))?);
        }
        tile.properties = self.properties(el, dir, loc);
        if let Some(anim) = el.child("animation") {
            let aloc = loc.child(anim);
            tile.animation = anim
                .children_named("frame")
                .map(|f| {
                    Ok(Frame {
                        tile_id: aloc.required(f, "tileid")?,
                        duration: aloc.required(f, "duration")?,
                    })
                })
                .collect::<Result<_, MapError>>()?;
        }
        if let Some(group) = el.child("objectgroup") {
            let gloc = loc.child(group);
            tile.collision = Some(self.object_group(group, None, Inherited::ROOT, doc, &gloc)?);
        }
        Ok(tile)
    }

    fn layers(
        &mut self,
        parent: &Element,
        gids: &Gids<'_>,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<Vec<Layer>, MapError> {
        let mut out = Vec::new();
        for child in &parent.children {
            let cloc = loc.child(child);
            let layer = match child.tag.as_str() {
                "layer" => Layer::Tiles(self.tile_layer(child, gids, inherited, doc, &cloc)?),
                "objectgroup" => {
                    Layer::Objects(self.object_group(child, Some(gids), inherited, doc, &cloc)?)
                }
                "imagelayer" => Layer::Image(self.image_layer(child, inherited, doc, &cloc)?),
                "group" => Layer::Group(self.group(child, gids, inherited, doc, &cloc)?),
                _ => continue,
            };
            out.push(layer);
        }
        Ok(out)
    }

    fn layer_info(
        &mut self,
        el: &Element,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<LayerInfo, MapError> {
        let dir = doc.parent().unwrap_or_else(|| Path::new(""));
        let visible = loc.flag(el, "visible", true)?;
        let opacity: f32 = loc.parse_or(el, "opacity", 1.0)?;
        let offset = Point::new(
            loc.parse_or(el, "offsetx", 0.0)?,
            loc.parse_or(el, "offsety", 0.0)?,
        );
        Ok(LayerInfo {
            id: loc.parse_or(el, "id", 0)?,
            name: el.attr("name").unwrap_or_default().to_owned(),
            class: class_of(el),
            visible,
            opacity,
            offset,
            parallax: Point::new(
                loc.parse_or(el, "parallaxx", 1.0)?,
                loc.parse_or(el, "parallaxy", 1.0)?,
            ),
            tint_color: loc.parse::<Color>(el, "tintcolor")?,
            properties: self.properties(el, dir, loc),
            effective_opacity: inherited.opacity * opacity,
            effective_offset: inherited.offset + offset,
            effective_visible: inherited.visible && visible,
        })
    }

    fn tile_layer(
        &mut self,
        el: &Element,
        gids: &Gids<'_>,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<TileLayer, MapError> {
        let info = self.layer_info(el, inherited, doc, loc)?;
        let width: u32 = loc.required(el, "width")?;
        let height: u32 = loc.required(el, "height")?;
        let cells = width as usize * height as usize;

        let data = match el.child("data") {
            None if self.infinite => LayerData::Chunked(Chunks::new()),
            None => LayerData::Dense(vec![None; cells]),
            Some(data) => {
                let dloc = loc.child(data);
                let encoding =
                    Encoding::from_attr(data.attr("encoding")).map_err(|e| decode_error(e, &dloc))?;
                let compression = Compression::from_attr(data.attr("compression"))
                    .map_err(|e| decode_error(e, &dloc))?;

                if self.infinite || data.child("chunk").is_some() {
                    let mut chunks = Chunks::new();
                    for chunk in data.children_named("chunk") {
                        let x: i32 = dloc.required(chunk, "x")?;
                        let y: i32 = dloc.required(chunk, "y")?;
                        let cloc = dloc.child_segment(&format!("chunk[{x},{y}]"));
                        let cw: u32 = cloc.required(chunk, "width")?;
                        let ch: u32 = cloc.required(chunk, "height")?;
                        let raw = raw_cells(chunk, encoding, compression, cw as usize * ch as usize, &cloc)?;
                        let chunk = Chunk {
                            x,
                            y,
                            width: cw,
                            height: ch,
                            cells: resolve_cells(raw, gids, &cloc)?,
                        };
                        if let Some(other) = chunks.overlapping(&chunk) {
                            return Err(cloc.malformed(format!(
                                "chunk overlaps the chunk at {},{}",
                                other.x, other.y
                            )));
                        }
                        if chunks.insert(chunk).is_some() {
                            return Err(cloc.malformed("two chunks share this origin"));
                        }
                    }
                    LayerData::Chunked(chunks)
                } else {
                    let raw = raw_cells(data, encoding, compression, cells, &dloc)?;
                    LayerData::Dense(resolve_cells(raw, gids, &dloc)?)
                }
            }
        };

        let mut layer = TileLayer {
            info,
            width,
            height,
            data,
            ext: Default::default(),
        };
        debug!(
            layer = %layer.info.name,
            width,
            height,
            infinite = layer.is_infinite(),
            "tile layer decoded"
        );
        layer.ext = self.loader.registry.extension_for(EntityRef::TileLayer(&layer));
        Ok(layer)
    }

    fn object_group(
        &mut self,
        el: &Element,
        gids: Option<&Gids<'_>>,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<ObjectGroup, MapError> {
        let info = self.layer_info(el, inherited, doc, loc)?;
        let mut objects = Vec::new();
        for obj in el.children_named("object") {
            objects.push(self.object(obj, gids, doc, &loc.child(obj))?);
        }
        let mut group = ObjectGroup {
            info,
            color: loc.parse(el, "color")?,
            draw_order: loc.parse_or(el, "draworder", DrawOrder::TopDown)?,
            objects,
            ext: Default::default(),
        };
        group.ext = self.loader.registry.extension_for(EntityRef::ObjectGroup(&group));
        Ok(group)
    }

    fn object(
        &mut self,
        el: &Element,
        gids: Option<&Gids<'_>>,
        doc: &Path,
        loc: &Location,
    ) -> Result<Object, MapError> {
        let dir = doc.parent().unwrap_or_else(|| Path::new(""));
        let width: Option<f32> = loc.parse(el, "width")?;
        let height: Option<f32> = loc.parse(el, "height")?;
        let (mut w, mut h) = (width.unwrap_or(0.0), height.unwrap_or(0.0));

        let shape = if let Some(raw) = loc.parse::<u32>(el, "gid")? {
            let Some(gids) = gids else {
                return Err(loc.malformed("tile objects are only allowed in object layers"));
            };
            let tile = gids.resolve(raw, loc)?.ok_or_else(|| MapError::UnresolvedTileId {
                path: loc.document().to_path_buf(),
                element: loc.element().to_owned(),
                gid: 0,
            })?;
            if let Some(ts) = gids.tilesets.get(tile.tileset) {
                w = width.unwrap_or(ts.tile_width as f32);
                h = height.unwrap_or(ts.tile_height as f32);
            }
            ObjectShape::Tile(tile)
        } else if el.child("ellipse").is_some() {
            ObjectShape::Ellipse
        } else if el.child("point").is_some() {
            ObjectShape::Point
        } else if let Some(poly) = el.child("polygon") {
            ObjectShape::Polygon(points(poly, &loc.child(poly))?)
        } else if let Some(poly) = el.child("polyline") {
            ObjectShape::Polyline(points(poly, &loc.child(poly))?)
        } else if let Some(text) = el.child("text") {
            ObjectShape::Text(text_of(text, &loc.child(text))?)
        } else if w == 0.0 && h == 0.0 {
            ObjectShape::Point
        } else {
            ObjectShape::Rectangle
        };

        let mut object = Object {
            id: loc.parse_or(el, "id", 0)?,
            name: el.attr("name").unwrap_or_default().to_owned(),
            class: class_of(el),
            x: loc.parse_or(el, "x", 0.0)?,
            y: loc.parse_or(el, "y", 0.0)?,
            width: w,
            height: h,
            rotation: loc.parse_or(el, "rotation", 0.0)?,
            visible: loc.flag(el, "visible", true)?,
            shape,
            properties: self.properties(el, dir, loc),
            ext: Default::default(),
        };
        object.ext = self.loader.registry.extension_for(EntityRef::Object(&object));
        Ok(object)
    }

    fn image_layer(
        &mut self,
        el: &Element,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<ImageLayer, MapError> {
        let info = self.layer_info(el, inherited, doc, loc)?;
        let image = match el.child("image") {
            Some(img) => Some(image(img, doc, &loc.child(img))?),
            None => None,
        };
        let mut layer = ImageLayer {
            info,
            image,
            repeat_x: loc.flag(el, "repeatx", false)?,
            repeat_y: loc.flag(el, "repeaty", false)?,
            ext: Default::default(),
        };
        layer.ext = self.loader.registry.extension_for(EntityRef::ImageLayer(&layer));
        Ok(layer)
    }

    fn group(
        &mut self,
        el: &Element,
        gids: &Gids<'_>,
        inherited: Inherited,
        doc: &Path,
        loc: &Location,
    ) -> Result<GroupLayer, MapError> {
        let info = self.layer_info(el, inherited, doc, loc)?;
        let layers = self.layers(el, gids, Inherited::of(&info), doc, loc)?;
        let mut group = GroupLayer {
            info,
            layers,
            ext: Default::default(),
        };
        group.ext = self.loader.registry.extension_for(EntityRef::GroupLayer(&group));
        Ok(group)
    }
}

/// Editor type string: `class`, or the older `type`.
fn class_of(el: &Element) -> String {
    el.attr("class")
        .filter(|s| !s.is_empty())
        .or_else(|| el.attr("type"))
        .unwrap_or_default()
        .to_owned()
}

fn image(el: &Element, doc: &Path, loc: &Location) -> Result<Image, MapError> {
    let source: String = loc.required(el, "source")?;
    Ok(Image {
        source: resolve_relative(doc, &source),
        width: loc.parse(el, "width")?,
        height: loc.parse(el, "height")?,
        trans: loc.parse(el, "trans")?,
    })
}

fn points(el: &Element, loc: &Location) -> Result<Vec<Point>, MapError> {
    let raw = el.attr("points").unwrap_or_default();
    parse_points(raw).map_err(|e| loc.malformed(e))
}

fn text_of(el: &Element, loc: &Location) -> Result<Text, MapError> {
    let defaults = Text::default();
    Ok(Text {
        text: el.text.clone().unwrap_or_default(),
        font_family: el
            .attr("fontfamily")
            .map_or(defaults.font_family, str::to_owned),
        pixel_size: loc.parse_or(el, "pixelsize", defaults.pixel_size)?,
        wrap: loc.flag(el, "wrap", defaults.wrap)?,
        color: loc.parse_or(el, "color", defaults.color)?,
        bold: loc.flag(el, "bold", false)?,
        italic: loc.flag(el, "italic", false)?,
        underline: loc.flag(el, "underline", false)?,
        strikeout: loc.flag(el, "strikeout", false)?,
        kerning: loc.flag(el, "kerning", true)?,
        halign: loc.parse_or(el, "halign", defaults.halign)?,
        valign: loc.parse_or(el, "valign", defaults.valign)?,
    })
}

fn decode_error(err: DecodeError, loc: &Location) -> MapError {
    let path = loc.document().to_path_buf();
    let element = loc.element().to_owned();
    match err {
        DecodeError::UnsupportedEncoding(encoding) => MapError::UnsupportedEncoding {
            path,
            element,
            encoding,
        },
        DecodeError::UnsupportedCompression(compression) => MapError::UnsupportedCompression {
            path,
            element,
            compression,
        },
        DecodeError::Malformed(reason) => MapError::MalformedTileData {
            path,
            element,
            reason,
        },
    }
}

/// Raw cell codes of a `<data>` or `<chunk>` element.
fn raw_cells(
    el: &Element,
    encoding: Encoding,
    compression: Compression,
    expected: usize,
    loc: &Location,
) -> Result<Vec<u32>, MapError> {
    let decoded = match encoding {
        Encoding::Xml => {
            let gids = el
                .children_named("tile")
                .map(|t| loc.parse_or(t, "gid", 0u32))
                .collect::<Result<Vec<_>, _>>()?;
            codec::collect_cells(gids, expected)
        }
        _ => codec::decode_cells(
            encoding,
            compression,
            el.text.as_deref().unwrap_or_default(),
            expected,
        ),
    };
    decoded.map_err(|e| decode_error(e, loc))
}

fn resolve_cells(raw: Vec<u32>, gids: &Gids<'_>, loc: &Location) -> Result<Vec<Option<TileRef>>, MapError> {
    raw.into_iter().map(|code| gids.resolve(code, loc)).collect()
}

fn index_objects(map: &Map, loc: &Location) -> Result<HashMap<u32, ObjectHandle>, MapError> {
    let mut index = HashMap::new();
    for (handle, object) in map.objects() {
        if object.id == 0 {
            continue;
        }
        if index.insert(object.id, handle).is_some() {
            return Err(loc.malformed(format!("object id {} is used twice", object.id)));
        }
    }
    Ok(index)
}

/// Second pass: binds every `object` property to its target. Ids no object
/// carries stay unresolved and are recorded as anomalies.
fn resolve_object_refs(map: &mut Map, anomalies: &mut Vec<Anomaly>) {
    let index = std::mem::take(&mut map.object_index);
    let mut bind = |element: &str, props: &mut Properties| {
        props.for_each_object_ref(&mut |property, reference| {
            let ObjectRef::Unresolved(id) = *reference else {
                return;
            };
            match index.get(&id) {
                Some(handle) => {
                    *reference = ObjectRef::Resolved {
                        id,
                        handle: handle.clone(),
                    }
                }
                None => {
                    let anomaly = Anomaly::DanglingObjectReference {
                        element: element.to_owned(),
                        property: property.to_owned(),
                        id,
                    };
                    warn!(%anomaly, "dangling object reference");
                    anomalies.push(anomaly);
                }
            }
        });
    };

    bind("map", &mut map.properties);
    for ts in &mut map.tilesets {
        let ts_label = format!("map/tileset[{}]", ts.name);
        bind(&ts_label, &mut ts.properties);
        for tile in &mut ts.tiles {
            let tile_label = format!("{ts_label}/tile[{}]", tile.id);
            bind(&tile_label, &mut tile.properties);
            if let Some(group) = &mut tile.collision {
                bind(&format!("{tile_label}/objectgroup"), &mut group.info.properties);
                for obj in &mut group.objects {
                    bind(&format!("{tile_label}/objectgroup/object[{}]", obj.id), &mut obj.properties);
                }
            }
        }
    }

    fn walk(layers: &mut [Layer], prefix: &str, bind: &mut impl FnMut(&str, &mut Properties)) {
        for layer in layers {
            let label = match layer.info().name.as_str() {
                "" => format!("{prefix}/layer"),
                name => format!("{prefix}/layer[{name}]"),
            };
            match layer {
                Layer::Tiles(l) => bind(&label, &mut l.info.properties),
                Layer::Image(l) => bind(&label, &mut l.info.properties),
                Layer::Objects(g) => {
                    bind(&label, &mut g.info.properties);
                    for obj in &mut g.objects {
                        bind(&format!("{label}/object[{}]", obj.id), &mut obj.properties);
                    }
                }
                Layer::Group(g) => {
                    bind(&label, &mut g.info.properties);
                    walk(&mut g.layers, &label, bind);
                }
            }
        }
    }
    walk(&mut map.layers, "map", &mut bind);
    map.object_index = index;
}
