use std::ops::Index;
use std::str::FromStr;

use crate::gid::TileRef;
use crate::layer::LayerInfo;
use crate::properties::{Color, Properties};
use crate::registry::Extension;

/// Pixel-space 2D point or offset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Parses `"x1,y1 x2,y2 ..."` vertex lists.
pub fn parse_points(raw: &str) -> Result<Vec<Point>, String> {
    raw.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("vertex '{pair}' is not 'x,y'"))?;
            let x = x.trim().parse().map_err(|_| format!("vertex '{pair}' has a bad x"))?;
            let y = y.trim().parse().map_err(|_| format!("vertex '{pair}' has a bad y"))?;
            Ok(Point::new(x, y))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl FromStr for HAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(HAlign::Left),
            "center" => Ok(HAlign::Center),
            "right" => Ok(HAlign::Right),
            "justify" => Ok(HAlign::Justify),
            other => Err(format!("unknown horizontal alignment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

impl FromStr for VAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(VAlign::Top),
            "center" => Ok(VAlign::Center),
            "bottom" => Ok(VAlign::Bottom),
            other => Err(format!("unknown vertical alignment '{other}'")),
        }
    }
}

/// Styled text carried by a text object.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub font_family: String,
    pub pixel_size: u32,
    pub wrap: bool,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    pub kerning: bool,
    pub halign: HAlign,
    pub valign: VAlign,
}

impl Default for Text {
    fn default() -> Self {
        Text {
            text: String::new(),
            font_family: "sans-serif".to_owned(),
            pixel_size: 16,
            wrap: false,
            color: Color::rgb(0, 0, 0),
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            kerning: true,
            halign: HAlign::Left,
            valign: VAlign::Top,
        }
    }
}

/// Geometry of an object. Exactly one per object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectShape {
    Rectangle,
    Point,
    Ellipse,
    /// Vertices relative to the object position.
    Polygon(Vec<Point>),
    Polyline(Vec<Point>),
    Text(Text),
    /// Tile object; the object's width/height scale the tile.
    Tile(TileRef),
}

#[derive(Debug)]
pub struct Object {
    /// Map-unique id; 0 when the document carries none.
    pub id: u32,
    pub name: String,
    pub class: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees, clockwise.
    pub rotation: f32,
    pub visible: bool,
    pub shape: ObjectShape,
    pub properties: Properties,
    pub ext: Extension,
}

impl Object {
    pub fn has_tile(&self) -> bool {
        matches!(self.shape, ObjectShape::Tile(_))
    }

    pub fn tile(&self) -> Option<&TileRef> {
        match &self.shape {
            ObjectShape::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrawOrder {
    /// Sorted by y.
    #[default]
    TopDown,
    /// Document order.
    Index,
}

impl FromStr for DrawOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topdown" => Ok(DrawOrder::TopDown),
            "index" => Ok(DrawOrder::Index),
            other => Err(format!("unknown draw order '{other}'")),
        }
    }
}

/// Object layer, also used for per-tile collision shapes.
#[derive(Debug)]
pub struct ObjectGroup {
    pub info: LayerInfo,
    pub color: Option<Color>,
    pub draw_order: DrawOrder,
    /// Document order.
    pub objects: Vec<Object>,
    pub ext: Extension,
}

impl ObjectGroup {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.objects.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Objects in the order they should be drawn.
    pub fn objects_in_draw_order(&self) -> Vec<&Object> {
        let mut objects: Vec<&Object> = self.objects.iter().collect();
        if self.draw_order == DrawOrder::TopDown {
            objects.sort_by(|a, b| a.y.total_cmp(&b.y));
        }
        objects
    }
}

impl Index<usize> for ObjectGroup {
    type Output = Object;

    fn index(&self, index: usize) -> &Object {
        &self.objects[index]
    }
}

impl<'a> IntoIterator for &'a ObjectGroup {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}
