//! Attributed tree handed over by the ingestion front-ends.
//!
//! Both the XML and the JSON readers produce this shape, so the builder only
//! ever walks one representation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::MapError;

/// One element of a map, tileset or template document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Attributes in document order; names are unique.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated character data, if any.
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter; replaces an existing value.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Identifier used in error locators: `id`, then `name`.
    pub fn label(&self) -> Option<&str> {
        self.attr("id")
            .or_else(|| self.attr("name"))
            .filter(|s| !s.is_empty())
    }
}

/// Where the builder currently is: document path plus element trail.
#[derive(Debug, Clone)]
pub struct Location {
    document: PathBuf,
    element: String,
}

impl Location {
    pub fn root(document: &Path, el: &Element) -> Self {
        Self {
            document: document.to_path_buf(),
            element: segment(el),
        }
    }

    /// Same trail, different document (external tilesets).
    pub fn in_document(&self, document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            element: self.element.clone(),
        }
    }

    pub fn child(&self, el: &Element) -> Self {
        self.child_segment(&segment(el))
    }

    pub fn child_segment(&self, seg: &str) -> Self {
        Self {
            document: self.document.clone(),
            element: format!("{}/{}", self.element, seg),
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn malformed(&self, message: impl fmt::Display) -> MapError {
        MapError::MalformedDocument {
            path: self.document.clone(),
            element: self.element.clone(),
            message: message.to_string(),
        }
    }

    /// Optional attribute parsed with `FromStr`.
    pub fn parse<T>(&self, el: &Element, name: &str) -> Result<Option<T>, MapError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match el.attr(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| self.malformed(format!("attribute '{name}'='{raw}': {e}"))),
        }
    }

    pub fn parse_or<T>(&self, el: &Element, name: &str, default: T) -> Result<T, MapError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.parse(el, name)?.unwrap_or(default))
    }

    pub fn required<T>(&self, el: &Element, name: &str) -> Result<T, MapError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse(el, name)?
            .ok_or_else(|| self.malformed(format!("missing required attribute '{name}'")))
    }

    /// Editor boolean attribute: `1`/`0`, also accepts `true`/`false`.
    pub fn flag(&self, el: &Element, name: &str, default: bool) -> Result<bool, MapError> {
        match el.attr(name).map(str::trim) {
            None => Ok(default),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(other) => Err(self.malformed(format!("attribute '{name}'='{other}' is not a boolean"))),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.document.display(), self.element)
    }
}

fn segment(el: &Element) -> String {
    match el.label() {
        Some(label) => format!("{}[{}]", el.tag, label),
        None => el.tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_trail_uses_id_then_name() {
        let map = Element::new("map");
        let layer = Element::new("layer").with_attr("name", "ground");
        let object = Element::new("object").with_attr("id", "7").with_attr("name", "door");

        let loc = Location::root(Path::new("level.tmx"), &map)
            .child(&layer)
            .child(&object);
        assert_eq!(loc.element(), "map/layer[ground]/object[7]");
    }

    #[test]
    fn required_attribute_reports_location() {
        let el = Element::new("map").with_attr("width", "ten");
        let loc = Location::root(Path::new("a.tmx"), &el);

        let err = loc.required::<u32>(&el, "width").unwrap_err();
        assert!(matches!(err, MapError::MalformedDocument { ref element, .. } if element == "map"));
        let err = loc.required::<u32>(&el, "height").unwrap_err();
        assert!(err.to_string().contains("missing required attribute 'height'"));
    }

    #[test]
    fn set_attr_replaces_existing_value() {
        let mut el = Element::new("tileset").with_attr("firstgid", "1");
        el.set_attr("firstgid", "5");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attr("firstgid"), Some("5"));
        assert_eq!(el.remove_attr("firstgid").as_deref(), Some("5"));
        assert!(!el.has_attr("firstgid"));
    }
}
