//! Typed custom properties.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::Anomaly;
use crate::map::ObjectHandle;
use crate::tree::{Element, Location};

/// 8-bit-per-channel ARGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::from_argb(0, 0, 0, 0);

    pub const fn from_argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self {
            alpha,
            red,
            green,
            blue,
        }
    }

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::from_argb(0xFF, red, green, blue)
    }

    /// Packed `0xAARRGGBB`.
    pub fn argb(self) -> u32 {
        u32::from_be_bytes([self.alpha, self.red, self.green, self.blue])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not #RRGGBB or #AARRGGBB", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    /// `#AARRGGBB` or `#RRGGBB`; the leading `#` is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let err = || ParseColorError(s.to_owned());
        if !hex.is_ascii() {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::from_argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(err()),
        }
    }
}

/// Reference held by an `object` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    /// Id 0: the property is unset.
    None,
    /// Not resolved yet, or left dangling after resolution.
    Unresolved(u32),
    Resolved { id: u32, handle: ObjectHandle },
}

impl ObjectRef {
    pub fn id(&self) -> Option<u32> {
        match self {
            ObjectRef::None => None,
            ObjectRef::Unresolved(id) | ObjectRef::Resolved { id, .. } => Some(*id),
        }
    }

    pub fn handle(&self) -> Option<&ObjectHandle> {
        match self {
            ObjectRef::Resolved { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Color(Color),
    /// Joined with the directory of the declaring document.
    File(PathBuf),
    Object(ObjectRef),
    Enum {
        property_type: String,
        value: String,
    },
    Class {
        property_type: String,
        properties: Properties,
    },
}

/// Declared `type` of a property. Unknown tags are treated as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTag {
    String,
    Int,
    Float,
    Bool,
    Color,
    File,
    Object,
    Class,
}

impl PropertyTag {
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("int") => PropertyTag::Int,
            Some("float") => PropertyTag::Float,
            Some("bool") => PropertyTag::Bool,
            Some("color") => PropertyTag::Color,
            Some("file") => PropertyTag::File,
            Some("object") => PropertyTag::Object,
            Some("class") => PropertyTag::Class,
            _ => PropertyTag::String,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyTag::String => "string",
            PropertyTag::Int => "int",
            PropertyTag::Float => "float",
            PropertyTag::Bool => "bool",
            PropertyTag::Color => "color",
            PropertyTag::File => "file",
            PropertyTag::Object => "object",
            PropertyTag::Class => "class",
        }
    }

    /// Sentinel stored when raw text does not fit the tag.
    pub fn fallback(self) -> PropertyValue {
        match self {
            PropertyTag::String => PropertyValue::String(String::new()),
            PropertyTag::Int => PropertyValue::Int(0),
            PropertyTag::Float => PropertyValue::Float(0.0),
            PropertyTag::Bool => PropertyValue::Bool(false),
            PropertyTag::Color => PropertyValue::Color(Color::TRANSPARENT),
            PropertyTag::File => PropertyValue::File(PathBuf::new()),
            PropertyTag::Object => PropertyValue::Object(ObjectRef::None),
            PropertyTag::Class => PropertyValue::Class {
                property_type: String::new(),
                properties: Properties::new(),
            },
        }
    }
}

/// Raw text that does not fit the declared tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch(pub PropertyTag);

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid {}", self.0.name())
    }
}

impl std::error::Error for TypeMismatch {}

/// Types one scalar property from its raw text.
///
/// `class` values need their nested element and are typed by
/// [`PropertyTyper`]; here they fail like any other mismatch.
pub fn type_value(tag: PropertyTag, raw: &str, base_dir: &Path) -> Result<PropertyValue, TypeMismatch> {
    let t = raw.trim();
    Ok(match tag {
        PropertyTag::String => PropertyValue::String(raw.to_owned()),
        PropertyTag::Int => PropertyValue::Int(t.parse().map_err(|_| TypeMismatch(tag))?),
        PropertyTag::Float => PropertyValue::Float(t.parse().map_err(|_| TypeMismatch(tag))?),
        PropertyTag::Bool => match t.to_ascii_lowercase().as_str() {
            "true" => PropertyValue::Bool(true),
            "false" => PropertyValue::Bool(false),
            _ => return Err(TypeMismatch(tag)),
        },
        PropertyTag::Color if t.is_empty() => PropertyValue::Color(Color::TRANSPARENT),
        PropertyTag::Color => PropertyValue::Color(t.parse().map_err(|_| TypeMismatch(tag))?),
        PropertyTag::File if t.is_empty() => PropertyValue::File(PathBuf::new()),
        PropertyTag::File => PropertyValue::File(base_dir.join(t)),
        PropertyTag::Object => match t.parse::<u32>().map_err(|_| TypeMismatch(tag))? {
            0 => PropertyValue::Object(ObjectRef::None),
            id => PropertyValue::Object(ObjectRef::Unresolved(id)),
        },
        PropertyTag::Class => return Err(TypeMismatch(tag)),
    })
}

/// Name -> value mapping in declaration order, no duplicate names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(IndexMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertyValue> {
        self.0.get_mut(name)
    }

    /// Replaces (in place) any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.0.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlays `overrides` on a copy of `self`; `overrides` wins.
    pub fn merged(&self, overrides: &Properties) -> Properties {
        let mut out = self.clone();
        out.merge_from(overrides);
        out
    }

    pub fn merge_from(&mut self, overrides: &Properties) {
        for (k, v) in &overrides.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(s) => Some(s),
            PropertyValue::Enum { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|i| i32::try_from(i).ok())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get_f64(name).map(|f| f as f32)
    }

    pub fn get_color(&self, name: &str) -> Option<Color> {
        match self.get(name)? {
            PropertyValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn get_file(&self, name: &str) -> Option<&Path> {
        match self.get(name)? {
            PropertyValue::File(p) => Some(p),
            _ => None,
        }
    }

    pub fn get_object(&self, name: &str) -> Option<&ObjectRef> {
        match self.get(name)? {
            PropertyValue::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn get_class(&self, name: &str) -> Option<&Properties> {
        match self.get(name)? {
            PropertyValue::Class { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Visits every object reference, nested class members included.
    /// The callback receives the dotted property path.
    pub fn for_each_object_ref(&mut self, f: &mut impl FnMut(&str, &mut ObjectRef)) {
        self.visit_refs("", f);
    }

    fn visit_refs(&mut self, prefix: &str, f: &mut impl FnMut(&str, &mut ObjectRef)) {
        for (name, value) in self.0.iter_mut() {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            match value {
                PropertyValue::Object(r) => f(&path, r),
                PropertyValue::Class { properties, .. } => properties.visit_refs(&path, f),
                _ => {}
            }
        }
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a PropertyValue);
    type IntoIter = indexmap::map::Iter<'a, String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Member of a class template.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberTemplate {
    pub name: String,
    pub tag: PropertyTag,
    /// Class or enum name for `class`/enum members.
    pub property_type: Option<String>,
    pub default: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassTemplate {
    pub name: String,
    pub members: Vec<MemberTemplate>,
}

impl ClassTemplate {
    pub fn member(&self, name: &str) -> Option<&MemberTemplate> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTemplate {
    pub name: String,
    pub values: Vec<String>,
    /// Values stored as their index instead of their name.
    pub stored_as_int: bool,
    /// Multiple values allowed (comma separated names or a bit mask).
    pub flags: bool,
}

impl EnumTemplate {
    /// Normalizes a raw enum value to value names; `None` when it does not
    /// name a declared value.
    fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if self.stored_as_int {
            let n: u64 = raw.parse().ok()?;
            if self.flags {
                let names: Vec<&str> = self
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i < 64 && n & (1 << i) != 0)
                    .map(|(_, v)| v.as_str())
                    .collect();
                return Some(names.join(","));
            }
            return self.values.get(n as usize).cloned();
        }
        let known = |v: &str| self.values.iter().any(|d| d == v);
        if self.flags {
            return raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .all(known)
                .then(|| raw.to_owned());
        }
        known(raw).then(|| raw.to_owned())
    }
}

/// Custom property types declared by the editor project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTypes {
    classes: HashMap<String, ClassTemplate>,
    enums: HashMap<String, EnumTemplate>,
}

impl PropertyTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, template: ClassTemplate) {
        self.classes.insert(template.name.clone(), template);
    }

    pub fn add_enum(&mut self, template: EnumTemplate) {
        self.enums.insert(template.name.clone(), template);
    }

    pub fn class(&self, name: &str) -> Option<&ClassTemplate> {
        self.classes.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumTemplate> {
        self.enums.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.enums.is_empty()
    }

    /// Adds every type of `other`; same-named types are replaced.
    pub fn extend(&mut self, other: PropertyTypes) {
        self.classes.extend(other.classes);
        self.enums.extend(other.enums);
    }
}

/// Types `<properties>` blocks of one document.
pub struct PropertyTyper<'a> {
    pub types: &'a PropertyTypes,
    /// Directory `file` values are joined with.
    pub base_dir: &'a Path,
    pub anomalies: &'a mut Vec<Anomaly>,
}

impl PropertyTyper<'_> {
    /// Types the `<properties>` child of `owner`, if any.
    pub fn properties_of(&mut self, owner: &Element, loc: &Location) -> Properties {
        match owner.child("properties") {
            Some(block) => self.type_block(block, None, loc),
            None => Properties::new(),
        }
    }

    fn type_block(
        &mut self,
        block: &Element,
        template: Option<&ClassTemplate>,
        loc: &Location,
    ) -> Properties {
        let mut out = Properties::new();
        if let Some(template) = template {
            for m in &template.members {
                out.insert(m.name.clone(), m.default.clone());
            }
        }
        for prop in block.children_named("property") {
            let Some(name) = prop.attr("name") else {
                warn!(element = loc.element(), "property without a name ignored");
                continue;
            };
            let member = template.and_then(|t| t.member(name));
            let value = self.type_property(prop, name, member, loc);
            out.insert(name, value);
        }
        out
    }

    fn type_property(
        &mut self,
        prop: &Element,
        name: &str,
        member: Option<&MemberTemplate>,
        loc: &Location,
    ) -> PropertyValue {
        let tag = member
            .map(|m| m.tag)
            .unwrap_or_else(|| PropertyTag::parse(prop.attr("type")));
        let property_type = prop
            .attr("propertytype")
            .filter(|s| !s.is_empty())
            .or_else(|| member.and_then(|m| m.property_type.as_deref()));

        if tag == PropertyTag::Class {
            let property_type = property_type.unwrap_or_default();
            let types = self.types;
            let template = types.class(property_type);
            let properties = match prop.child("properties") {
                Some(nested) => self.type_block(nested, template, loc),
                None => {
                    let empty = Element::new("properties");
                    self.type_block(&empty, template, loc)
                }
            };
            return PropertyValue::Class {
                property_type: property_type.to_owned(),
                properties,
            };
        }

        let raw = prop
            .attr("value")
            .or(prop.text.as_deref())
            .unwrap_or_default();

        if let Some(enum_name) = property_type {
            return self.type_enum(enum_name, raw, name, loc);
        }

        match type_value(tag, raw, self.base_dir) {
            Ok(value) => value,
            Err(_) => {
                self.record(Anomaly::PropertyTypeMismatch {
                    element: loc.element().to_owned(),
                    property: name.to_owned(),
                    expected: tag.name().to_owned(),
                    value: raw.to_owned(),
                });
                tag.fallback()
            }
        }
    }

    fn type_enum(&mut self, enum_name: &str, raw: &str, name: &str, loc: &Location) -> PropertyValue {
        let types = self.types;
        let value = match types.enumeration(enum_name) {
            None => raw.to_owned(),
            Some(template) => match template.normalize(raw) {
                Some(v) => v,
                None => {
                    self.record(Anomaly::PropertyTypeMismatch {
                        element: loc.element().to_owned(),
                        property: name.to_owned(),
                        expected: format!("value of enum {enum_name}"),
                        value: raw.to_owned(),
                    });
                    String::new()
                }
            },
        };
        PropertyValue::Enum {
            property_type: enum_name.to_owned(),
            value,
        }
    }

    fn record(&mut self, anomaly: Anomaly) {
        warn!(%anomaly, "property typing anomaly");
        self.anomalies.push(anomaly);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prop(name: &str, ty: &str, value: &str) -> Element {
        Element::new("property")
            .with_attr("name", name)
            .with_attr("type", ty)
            .with_attr("value", value)
    }

    fn type_owner(owner: &Element, types: &PropertyTypes) -> (Properties, Vec<Anomaly>) {
        let mut anomalies = Vec::new();
        let loc = Location::root(Path::new("m.tmx"), owner);
        let props = PropertyTyper {
            types,
            base_dir: Path::new("maps"),
            anomalies: &mut anomalies,
        }
        .properties_of(owner, &loc);
        (props, anomalies)
    }

    #[test]
    fn colors_normalize_to_argb() {
        // the first byte of the 8-digit form is alpha
        let eight: Color = "#FF0000FF".parse().unwrap();
        assert_eq!(eight, Color::rgb(0x00, 0x00, 0xFF));
        let faded: Color = "#80FF0000".parse().unwrap();
        assert_eq!(faded, Color::from_argb(0x80, 0xFF, 0x00, 0x00));
        let blue: Color = "#0000FF".parse().unwrap();
        assert_eq!(blue, Color::from_argb(0xFF, 0, 0, 0xFF));
        let opaque_red: Color = "#FFFF0000".parse().unwrap();
        assert_eq!(opaque_red, Color::rgb(0xFF, 0, 0));
        assert_eq!(opaque_red.argb(), 0xFFFF_0000);
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
    }

    #[test]
    fn scalar_tags() {
        let dir = Path::new("maps");
        assert_eq!(type_value(PropertyTag::Int, " 42 ", dir), Ok(PropertyValue::Int(42)));
        assert_eq!(type_value(PropertyTag::Float, "2.5", dir), Ok(PropertyValue::Float(2.5)));
        assert_eq!(type_value(PropertyTag::Bool, "true", dir), Ok(PropertyValue::Bool(true)));
        assert_eq!(
            type_value(PropertyTag::Bool, "yes", dir),
            Err(TypeMismatch(PropertyTag::Bool))
        );
        assert_eq!(
            type_value(PropertyTag::File, "../sfx/door.ogg", dir),
            Ok(PropertyValue::File(PathBuf::from("maps/../sfx/door.ogg")))
        );
        assert_eq!(
            type_value(PropertyTag::Object, "12", dir),
            Ok(PropertyValue::Object(ObjectRef::Unresolved(12)))
        );
        assert_eq!(
            type_value(PropertyTag::Object, "0", dir),
            Ok(PropertyValue::Object(ObjectRef::None))
        );
        assert_eq!(PropertyTag::parse(Some("vector3")), PropertyTag::String);
    }

    #[test]
    fn mismatch_records_anomaly_and_uses_sentinel() {
        let owner = Element::new("map").with_child(
            Element::new("properties")
                .with_child(prop("hp", "int", "lots"))
                .with_child(prop("ok", "bool", "false")),
        );
        let (props, anomalies) = type_owner(&owner, &PropertyTypes::new());
        assert_eq!(props.get_i64("hp"), Some(0));
        assert_eq!(props.get_bool("ok"), Some(false));
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(
            &anomalies[0],
            Anomaly::PropertyTypeMismatch { property, expected, .. } if property == "hp" && expected == "int"
        ));
    }

    #[test]
    fn multiline_string_from_text() {
        let owner = Element::new("object").with_child(
            Element::new("properties").with_child(
                Element::new("property")
                    .with_attr("name", "dialog")
                    .with_text("line one\nline two"),
            ),
        );
        let (props, _) = type_owner(&owner, &PropertyTypes::new());
        assert_eq!(props.get_string("dialog"), Some("line one\nline two"));
    }

    #[test]
    fn class_typed_against_template() {
        let mut types = PropertyTypes::new();
        types.add_class(ClassTemplate {
            name: "Door".into(),
            members: vec![
                MemberTemplate {
                    name: "locked".into(),
                    tag: PropertyTag::Bool,
                    property_type: None,
                    default: PropertyValue::Bool(true),
                },
                MemberTemplate {
                    name: "key".into(),
                    tag: PropertyTag::Int,
                    property_type: None,
                    default: PropertyValue::Int(0),
                },
            ],
        });
        let owner = Element::new("object").with_child(
            Element::new("properties").with_child(
                Element::new("property")
                    .with_attr("name", "door")
                    .with_attr("type", "class")
                    .with_attr("propertytype", "Door")
                    .with_child(
                        Element::new("properties")
                            // the template says int, the raw tag is ignored
                            .with_child(prop("key", "string", "3"))
                            .with_child(prop("extra", "float", "1.5")),
                    ),
            ),
        );
        let (props, anomalies) = type_owner(&owner, &types);
        assert!(anomalies.is_empty());
        let door = props.get_class("door").unwrap();
        assert_eq!(door.get_bool("locked"), Some(true));
        assert_eq!(door.get_i64("key"), Some(3));
        assert_eq!(door.get_f64("extra"), Some(1.5));
    }

    #[test]
    fn enums_with_and_without_template() {
        let mut types = PropertyTypes::new();
        types.add_enum(EnumTemplate {
            name: "Facing".into(),
            values: vec!["North".into(), "South".into()],
            stored_as_int: true,
            flags: false,
        });
        let facing = |v: &str| {
            Element::new("property")
                .with_attr("name", "facing")
                .with_attr("type", "int")
                .with_attr("propertytype", "Facing")
                .with_attr("value", v)
        };
        let owner = Element::new("object").with_child(
            Element::new("properties")
                .with_child(facing("1"))
                .with_child(
                    Element::new("property")
                        .with_attr("name", "mood")
                        .with_attr("propertytype", "Mood")
                        .with_attr("value", "calm"),
                ),
        );
        let (props, anomalies) = type_owner(&owner, &types);
        assert!(anomalies.is_empty());
        assert_eq!(props.get_string("facing"), Some("South"));
        assert_eq!(
            props.get("mood"),
            Some(&PropertyValue::Enum {
                property_type: "Mood".into(),
                value: "calm".into()
            })
        );

        let bad = Element::new("object")
            .with_child(Element::new("properties").with_child(facing("7")));
        let (props, anomalies) = type_owner(&bad, &types);
        assert_eq!(props.get_string("facing"), Some(""));
        assert_eq!(anomalies.len(), 1);
    }

    #[test]
    fn merge_overrides_instead_of_appending() {
        let base: Properties = [
            ("solid".to_string(), PropertyValue::Bool(false)),
            ("biome".to_string(), PropertyValue::String("forest".into())),
        ]
        .into_iter()
        .collect();
        let tile: Properties = [("solid".to_string(), PropertyValue::Bool(true))]
            .into_iter()
            .collect();

        let merged = base.merged(&tile);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_bool("solid"), Some(true));
        assert_eq!(merged.get_string("biome"), Some("forest"));
    }

    #[test]
    fn object_refs_are_visited_in_nested_classes() {
        let mut inner = Properties::new();
        inner.insert("target", PropertyValue::Object(ObjectRef::Unresolved(4)));
        let mut props = Properties::new();
        props.insert("next", PropertyValue::Object(ObjectRef::Unresolved(2)));
        props.insert(
            "trigger",
            PropertyValue::Class {
                property_type: "Trigger".into(),
                properties: inner,
            },
        );

        let mut seen = Vec::new();
        props.for_each_object_ref(&mut |path, r| seen.push((path.to_owned(), r.id())));
        assert_eq!(
            seen,
            vec![
                ("next".to_string(), Some(2)),
                ("trigger.target".to_string(), Some(4))
            ]
        );
    }
}
