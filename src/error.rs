use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::EntityKind;

/// Fatal load error. The load is aborted and no map is returned.
#[derive(Debug, Error)]
pub enum MapError {
    /// A document or resource could not be read.
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The XML front-end rejected the document.
    #[error("parsing XML {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    /// The JSON front-end rejected the document.
    #[error("parsing JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally invalid attributed tree: missing required attribute,
    /// unparsable attribute, wrong cardinality.
    #[error("{path} ({element}): malformed document: {message}")]
    MalformedDocument {
        path: PathBuf,
        element: String,
        message: String,
    },

    #[error("{path} ({element}): unsupported tile data encoding '{encoding}'")]
    UnsupportedEncoding {
        path: PathBuf,
        element: String,
        encoding: String,
    },

    #[error("{path} ({element}): unsupported tile data compression '{compression}'")]
    UnsupportedCompression {
        path: PathBuf,
        element: String,
        compression: String,
    },

    /// Decoded payload length mismatch or undecodable payload.
    #[error("{path} ({element}): malformed tile data: {reason}")]
    MalformedTileData {
        path: PathBuf,
        element: String,
        reason: String,
    },

    /// Cell base id outside every tileset range.
    #[error("{path} ({element}): tile id {gid} is not covered by any tileset")]
    UnresolvedTileId {
        path: PathBuf,
        element: String,
        gid: u32,
    },

    #[error(
        "{path}: tilesets '{first}' and '{second}' both claim tile id {gid}"
    )]
    OverlappingTilesetRanges {
        path: PathBuf,
        first: String,
        second: String,
        gid: u32,
    },

    /// A recoverable anomaly promoted to fatal by a strict loader.
    #[error("{path}: {anomaly}")]
    Anomaly { path: PathBuf, anomaly: Anomaly },
}

/// Recoverable document defect. The offending value is replaced by a
/// sentinel, the anomaly is recorded on the map and loading continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    /// An `object` property names an id no object in the map carries.
    #[error("{element}: property '{property}' references missing object {id}")]
    DanglingObjectReference {
        element: String,
        property: String,
        id: u32,
    },

    /// The raw text of a property does not fit its declared type.
    #[error("{element}: property '{property}' value '{value}' is not a valid {expected}")]
    PropertyTypeMismatch {
        element: String,
        property: String,
        expected: String,
        value: String,
    },
}

/// Type registry misconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a base implementation is already registered for {0:?}")]
    DuplicateBase(EntityKind),
}
