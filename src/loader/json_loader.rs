//! JSON front-end: reads `.tmj`/`.tsj`/`.json` documents into the same
//! attributed tree the XML front-end produces.
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map as JsonMapValue, Value as JsonValue};

use crate::error::MapError;
use crate::tree::Element;

type Attrs = JsonMapValue<String, JsonValue>;

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default)]
    tilesets: Vec<JsonTileset>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonTileset {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    tileoffset: Option<JsonPoint>,
    #[serde(default)]
    tiles: Vec<JsonTile>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonTile {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    objectgroup: Option<JsonLayer>,
    #[serde(default)]
    animation: Vec<JsonFrame>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
    duration: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonData {
    Cells(Vec<u32>),
    Encoded(String),
}

#[derive(Deserialize)]
struct JsonChunk {
    data: JsonData,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<JsonData>,
    #[serde(default)]
    chunks: Vec<JsonChunk>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    ellipse: bool,
    #[serde(default)]
    point: bool,
    #[serde(default)]
    polygon: Option<Vec<JsonPoint>>,
    #[serde(default)]
    polyline: Option<Vec<JsonPoint>>,
    #[serde(default)]
    text: Option<JsonText>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonText {
    #[serde(default)]
    text: String,
    #[serde(flatten)]
    attrs: Attrs,
}

#[derive(Deserialize)]
struct JsonPoint {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    propertytype: Option<String>,
    #[serde(default)]
    value: JsonValue,
}

/// Parses a JSON map or tileset document. The root is a `map` element
/// unless the document declares `"type": "tileset"` or has no layers.
pub fn parse_document(text: &str, path: &Path) -> Result<Element, MapError> {
    let json_err = |source| MapError::Json {
        path: path.to_path_buf(),
        source,
    };
    let value: JsonValue = serde_json::from_str(text).map_err(json_err)?;
    let is_tileset = match value.get("type").and_then(JsonValue::as_str) {
        Some(kind) => kind == "tileset",
        None => value.get("layers").is_none(),
    };
    if is_tileset {
        let ts: JsonTileset = serde_json::from_value(value).map_err(json_err)?;
        Ok(tileset_element(ts))
    } else {
        let map: JsonMap = serde_json::from_value(value).map_err(json_err)?;
        Ok(map_element(map))
    }
}

fn map_element(map: JsonMap) -> Element {
    let mut el = Element::new("map");
    put_attrs(&mut el, map.attrs, &["type"]);
    push_properties(&mut el, map.properties);
    el.children
        .extend(map.tilesets.into_iter().map(tileset_element));
    el.children.extend(map.layers.into_iter().map(layer_element));
    el
}

fn tileset_element(ts: JsonTileset) -> Element {
    let JsonTileset {
        image,
        tileoffset,
        tiles,
        properties,
        mut attrs,
    } = ts;
    let mut el = Element::new("tileset");
    let image = image_element(&mut attrs, image);
    put_attrs(&mut el, attrs, &["type"]);
    push_properties(&mut el, properties);
    if let Some(offset) = tileoffset {
        el.children.push(
            Element::new("tileoffset")
                .with_attr("x", offset.x.to_string())
                .with_attr("y", offset.y.to_string()),
        );
    }
    el.children.extend(image);
    el.children.extend(tiles.into_iter().map(tile_element));
    el
}

fn tile_element(tile: JsonTile) -> Element {
    let JsonTile {
        image,
        objectgroup,
        animation,
        properties,
        mut attrs,
    } = tile;
    let mut el = Element::new("tile");
    let image = image_element(&mut attrs, image);
    put_attrs(&mut el, attrs, &[]);
    push_properties(&mut el, properties);
    el.children.extend(image);
    el.children.extend(objectgroup.map(layer_element));
    if !animation.is_empty() {
        let mut anim = Element::new("animation");
        anim.children.extend(animation.into_iter().map(|f| {
            Element::new("frame")
                .with_attr("tileid", f.tileid.to_string())
                .with_attr("duration", f.duration.to_string())
        }));
        el.children.push(anim);
    }
    el
}

/// Pulls the flattened `image*` keys into an `<image>` element.
fn image_element(attrs: &mut Attrs, image: Option<String>) -> Option<Element> {
    let source = image.filter(|s| !s.is_empty())?;
    let mut el = Element::new("image").with_attr("source", source);
    for (json, xml) in [
        ("imagewidth", "width"),
        ("imageheight", "height"),
        ("transparentcolor", "trans"),
    ] {
        if let Some(value) = attrs.remove(json).as_ref().and_then(scalar) {
            el.set_attr(xml, value);
        }
    }
    Some(el)
}

fn layer_element(layer: JsonLayer) -> Element {
    let JsonLayer {
        kind,
        data,
        chunks,
        layers,
        objects,
        image,
        properties,
        mut attrs,
    } = layer;
    let tag = match kind.as_str() {
        "tilelayer" => "layer",
        other => other,
    };
    let mut el = Element::new(tag);
    let encoding = attrs.remove("encoding");
    let compression = attrs.remove("compression");
    let image = image_element(&mut attrs, image);
    put_attrs(&mut el, attrs, &[]);
    push_properties(&mut el, properties);

    if data.is_some() || !chunks.is_empty() {
        let mut data_el = Element::new("data");
        let encoded = encoding.as_ref().and_then(scalar);
        let compression = compression.as_ref().and_then(scalar).filter(|c| !c.is_empty());
        let cells_are_csv = match (&data, chunks.first()) {
            (Some(JsonData::Cells(_)), _) => true,
            (None, Some(chunk)) => matches!(chunk.data, JsonData::Cells(_)),
            _ => false,
        };
        if cells_are_csv {
            data_el.set_attr("encoding", "csv");
        } else {
            data_el.set_attr("encoding", encoded.unwrap_or_else(|| "base64".to_owned()));
            if let Some(compression) = compression {
                data_el.set_attr("compression", compression);
            }
        }
        if let Some(data) = data {
            data_el.text = Some(payload(data));
        }
        data_el.children.extend(chunks.into_iter().map(|c| {
            Element::new("chunk")
                .with_attr("x", c.x.to_string())
                .with_attr("y", c.y.to_string())
                .with_attr("width", c.width.to_string())
                .with_attr("height", c.height.to_string())
                .with_text(payload(c.data))
        }));
        el.children.push(data_el);
    }

    el.children.extend(image);
    el.children.extend(objects.into_iter().map(object_element));
    el.children.extend(layers.into_iter().map(layer_element));
    el
}

fn payload(data: JsonData) -> String {
    match data {
        JsonData::Cells(cells) => cells
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
        JsonData::Encoded(text) => text,
    }
}

fn object_element(obj: JsonObject) -> Element {
    let mut el = Element::new("object");
    put_attrs(&mut el, obj.attrs, &[]);
    push_properties(&mut el, obj.properties);
    if obj.ellipse {
        el.children.push(Element::new("ellipse"));
    }
    if obj.point {
        el.children.push(Element::new("point"));
    }
    for (tag, points) in [("polygon", obj.polygon), ("polyline", obj.polyline)] {
        if let Some(points) = points {
            let joined = points
                .iter()
                .map(|p| format!("{},{}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ");
            el.children.push(Element::new(tag).with_attr("points", joined));
        }
    }
    if let Some(text) = obj.text {
        let mut text_el = Element::new("text").with_text(text.text);
        put_attrs(&mut text_el, text.attrs, &[]);
        el.children.push(text_el);
    }
    el
}

fn push_properties(el: &mut Element, props: Vec<JsonProperty>) {
    if props.is_empty() {
        return;
    }
    let mut block = Element::new("properties");
    block
        .children
        .extend(props.into_iter().map(property_element));
    el.children.push(block);
}

fn property_element(prop: JsonProperty) -> Element {
    let mut el = Element::new("property").with_attr("name", prop.name);
    if let Some(kind) = prop.kind {
        el.set_attr("type", kind);
    }
    if let Some(pt) = prop.propertytype.filter(|s| !s.is_empty()) {
        el.set_attr("propertytype", pt);
    }
    match prop.value {
        JsonValue::Object(members) => el.children.push(class_members(members)),
        other => {
            if let Some(value) = property_scalar(&other) {
                el.set_attr("value", value);
            }
        }
    }
    el
}

/// Member values of a class property; nested objects are nested classes.
fn class_members(members: Attrs) -> Element {
    let mut block = Element::new("properties");
    for (name, value) in members {
        let mut prop = Element::new("property").with_attr("name", name);
        match value {
            JsonValue::Object(nested) => {
                prop.set_attr("type", "class");
                prop.children.push(class_members(nested));
            }
            other => {
                if let Some(v) = property_scalar(&other) {
                    prop.set_attr("value", v);
                }
            }
        }
        block.children.push(prop);
    }
    block
}

fn property_scalar(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Bool(b) => Some(b.to_string()),
        other => scalar(other),
    }
}

/// Attribute text of a scalar; booleans use the editor's `1`/`0`.
fn scalar(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_owned()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn put_attrs(el: &mut Element, attrs: Attrs, skip: &[&str]) {
    for (name, value) in attrs {
        if skip.contains(&name.as_str()) {
            continue;
        }
        if let Some(text) = scalar(&value) {
            el.set_attr(name, text);
        }
    }
}
