//! Editor project files (`.tiled-project`): custom class and enum types.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::MapError;
use crate::properties::{
    type_value, ClassTemplate, EnumTemplate, MemberTemplate, Properties, PropertyTag, PropertyTypes,
    PropertyValue,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    #[serde(default)]
    property_types: Vec<PropertyTypeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum PropertyTypeDef {
    #[serde(rename = "class")]
    Class(ClassDef),
    #[serde(rename = "enum")]
    Enum(EnumDef),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassDef {
    name: String,
    #[serde(default)]
    members: Vec<MemberDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberDef {
    name: String,
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    value: JsonValue,
    #[serde(default)]
    property_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumDef {
    name: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    storage_type: String,
    #[serde(default)]
    values_as_flags: bool,
}

/// Nested class defaults deeper than this are left empty.
const MAX_CLASS_DEPTH: usize = 16;

/// Parses the `propertyTypes` of a project file. `file` member defaults
/// are resolved against the project's directory.
pub fn parse_project(text: &str, path: &Path) -> Result<PropertyTypes, MapError> {
    let project: ProjectFile = serde_json::from_str(text).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut classes = HashMap::new();
    let mut types = PropertyTypes::new();
    for def in project.property_types {
        match def {
            PropertyTypeDef::Class(c) => {
                classes.insert(c.name.clone(), c);
            }
            PropertyTypeDef::Enum(e) => types.add_enum(EnumTemplate {
                name: e.name,
                values: e.values,
                stored_as_int: e.storage_type == "int",
                flags: e.values_as_flags,
            }),
        }
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    for class in classes.values() {
        let members = class
            .members
            .iter()
            .map(|m| MemberTemplate {
                name: m.name.clone(),
                tag: PropertyTag::parse(Some(&m.member_type)),
                property_type: m.property_type.clone().filter(|s| !s.is_empty()),
                default: member_default(m, &classes, base_dir, 0),
            })
            .collect();
        types.add_class(ClassTemplate {
            name: class.name.clone(),
            members,
        });
    }
    Ok(types)
}

fn member_default(
    member: &MemberDef,
    classes: &HashMap<String, ClassDef>,
    base_dir: &Path,
    depth: usize,
) -> PropertyValue {
    member_value(member, &member.value, classes, base_dir, depth)
}

/// Types `value` as `member` declares it.
fn member_value(
    member: &MemberDef,
    value: &JsonValue,
    classes: &HashMap<String, ClassDef>,
    base_dir: &Path,
    depth: usize,
) -> PropertyValue {
    let tag = PropertyTag::parse(Some(&member.member_type));
    let property_type = member.property_type.as_deref().unwrap_or_default();

    if tag == PropertyTag::Class {
        return class_value(property_type, value, classes, base_dir, depth);
    }

    let raw = raw_text(value).unwrap_or_default();
    if !property_type.is_empty() {
        return PropertyValue::Enum {
            property_type: property_type.to_owned(),
            value: raw,
        };
    }
    type_value(tag, &raw, base_dir).unwrap_or_else(|_| {
        warn!(member = %member.name, value = %raw, "project member value does not fit its type");
        tag.fallback()
    })
}

/// Nested class defaults with `overrides` (a JSON object) applied on top.
fn class_value(
    property_type: &str,
    overrides: &JsonValue,
    classes: &HashMap<String, ClassDef>,
    base_dir: &Path,
    depth: usize,
) -> PropertyValue {
    let mut properties = Properties::new();
    if let Some(class) = classes.get(property_type).filter(|_| depth < MAX_CLASS_DEPTH) {
        for nested in &class.members {
            let value = match overrides.get(&nested.name) {
                Some(v) => member_value(nested, v, classes, base_dir, depth + 1),
                None => member_default(nested, classes, base_dir, depth + 1),
            };
            properties.insert(nested.name.clone(), value);
        }
    }
    // values the template does not declare are kept as they are written
    if let JsonValue::Object(values) = overrides {
        for (name, value) in values {
            if !properties.contains(name) {
                properties.insert(name.clone(), untyped(value));
            }
        }
    }
    PropertyValue::Class {
        property_type: property_type.to_owned(),
        properties,
    }
}

fn untyped(value: &JsonValue) -> PropertyValue {
    match value {
        JsonValue::Bool(b) => PropertyValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => PropertyValue::Int(i),
            None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
        },
        JsonValue::Object(values) => PropertyValue::Class {
            property_type: String::new(),
            properties: values
                .iter()
                .map(|(name, v)| (name.clone(), untyped(v)))
                .collect(),
        },
        other => PropertyValue::String(raw_text(other).unwrap_or_default()),
    }
}

fn raw_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
