//! XML front-end for `.tmx`, `.tsx` and `.tx` documents.
use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MapError;
use crate::tree::Element;

/// Parses an XML document into an attributed tree. Whitespace-only
/// character data is dropped; everything else is kept verbatim.
pub fn parse_document(text: &str, path: &Path) -> Result<Element, MapError> {
    let xml_err = |source| MapError::Xml {
        path: path.to_path_buf(),
        source,
    };
    match read_tree(text).map_err(xml_err)? {
        Some(root) => Ok(root),
        None => Err(MapError::MalformedDocument {
            path: path.to_path_buf(),
            element: String::new(),
            message: "document has no root element".to_owned(),
        }),
    }
}

fn read_tree(text: &str) -> Result<Option<Element>, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(open(&e)?),
            Event::Empty(e) => {
                let el = open(&e)?;
                close(el, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(el) = stack.pop() {
                    close(el, &mut stack, &mut root);
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                append_text(&mut stack, text);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                append_text(&mut stack, String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(root)
}

fn open(e: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let mut el = Element::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.set_attr(key, value);
    }
    Ok(el)
}

fn close(mut el: Element, stack: &mut [Element], root: &mut Option<Element>) {
    if el.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        el.text = None;
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

fn append_text(stack: &mut [Element], text: Cow<'_, str>) {
    if let Some(top) = stack.last_mut() {
        top.text.get_or_insert_with(String::new).push_str(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Element {
        parse_document(text, Path::new("level.tmx")).unwrap()
    }

    #[test]
    fn nested_elements_and_attributes() {
        let root = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="2" height="1">
 <tileset firstgid="1" source="terrain.tsx"/>
 <layer id="1" name="ground &amp; sky" width="2" height="1">
  <data encoding="csv">
1,2
</data>
 </layer>
</map>"#,
        );
        assert_eq!(root.tag, "map");
        assert_eq!(root.text, None);
        assert_eq!(root.attr("width"), Some("2"));
        assert_eq!(root.child("tileset").unwrap().attr("source"), Some("terrain.tsx"));

        let layer = root.child("layer").unwrap();
        assert_eq!(layer.attr("name"), Some("ground & sky"));
        assert_eq!(layer.child("data").unwrap().text.as_deref(), Some("\n1,2\n"));
    }

    #[test]
    fn multiline_property_text_is_kept() {
        let root = parse(
            "<properties><property name=\"lore\">line one\nline &lt;two&gt;</property></properties>",
        );
        let prop = root.child("property").unwrap();
        assert_eq!(prop.text.as_deref(), Some("line one\nline <two>"));
    }

    #[test]
    fn cdata_sections_are_text() {
        let root = parse("<text><![CDATA[a < b]]></text>");
        assert_eq!(root.text.as_deref(), Some("a < b"));
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = parse_document("<map><layer></map>", Path::new("bad.tmx")).unwrap_err();
        assert!(matches!(err, MapError::Xml { .. }));
    }

    #[test]
    fn empty_document_has_no_root() {
        let err = parse_document("   ", Path::new("empty.tmx")).unwrap_err();
        assert!(matches!(err, MapError::MalformedDocument { .. }));
    }
}
