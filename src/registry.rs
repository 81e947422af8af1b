//! Class specializations keyed by the editor's type string, and the
//! post-construction hook dispatch.
//!
//! A host registers a [`Specialization`] for an entity kind, either under
//! one or more editor type strings or as the kind's base. While the map is
//! built every entity gets the most specific registered implementation:
//!
//! 1. the implementation registered for `(kind, type string)`,
//! 2. otherwise the base registered for `kind`,
//! 3. otherwise the built-in default, which does nothing.
//!
//! Once the whole map exists, [`run_post_load`] calls every selected
//! implementation's [`Specialization::post_load`] in post-order.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::RegistryError;
use crate::layer::{GroupLayer, ImageLayer, TileLayer};
use crate::map::{EntityPath, Map};
use crate::object::{Object, ObjectGroup};
use crate::tileset::{Tile, Tileset};

/// Host-side state attached to a specialized entity.
pub type State = Box<dyn Any + Send + Sync>;

/// Entity kinds that can carry an editor type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Map,
    Tileset,
    Tile,
    TileLayer,
    ObjectGroup,
    ImageLayer,
    GroupLayer,
    Object,
}

/// Borrowed view of any entity of the graph.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Map(&'a Map),
    Tileset(&'a Tileset),
    Tile(&'a Tile),
    TileLayer(&'a TileLayer),
    ObjectGroup(&'a ObjectGroup),
    ImageLayer(&'a ImageLayer),
    GroupLayer(&'a GroupLayer),
    Object(&'a Object),
}

impl<'a> EntityRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Map(_) => EntityKind::Map,
            EntityRef::Tileset(_) => EntityKind::Tileset,
            EntityRef::Tile(_) => EntityKind::Tile,
            EntityRef::TileLayer(_) => EntityKind::TileLayer,
            EntityRef::ObjectGroup(_) => EntityKind::ObjectGroup,
            EntityRef::ImageLayer(_) => EntityKind::ImageLayer,
            EntityRef::GroupLayer(_) => EntityKind::GroupLayer,
            EntityRef::Object(_) => EntityKind::Object,
        }
    }

    /// The editor type string (empty when unset).
    pub fn class(&self) -> &'a str {
        match self {
            EntityRef::Map(e) => &e.class,
            EntityRef::Tileset(e) => &e.class,
            EntityRef::Tile(e) => &e.class,
            EntityRef::TileLayer(e) => &e.info.class,
            EntityRef::ObjectGroup(e) => &e.info.class,
            EntityRef::ImageLayer(e) => &e.info.class,
            EntityRef::GroupLayer(e) => &e.info.class,
            EntityRef::Object(e) => &e.class,
        }
    }

    pub fn extension(&self) -> &'a Extension {
        match self {
            EntityRef::Map(e) => &e.ext,
            EntityRef::Tileset(e) => &e.ext,
            EntityRef::Tile(e) => &e.ext,
            EntityRef::TileLayer(e) => &e.ext,
            EntityRef::ObjectGroup(e) => &e.ext,
            EntityRef::ImageLayer(e) => &e.ext,
            EntityRef::GroupLayer(e) => &e.ext,
            EntityRef::Object(e) => &e.ext,
        }
    }
}

/// A host implementation substituted for an editor class.
pub trait Specialization: Send + Sync + 'static {
    /// Builds the state stored on the entity. Runs during the build, once
    /// the entity and its children exist; object references in properties
    /// are not resolved yet at this point.
    fn construct(&self, entity: EntityRef<'_>) -> Option<State> {
        let _ = entity;
        None
    }

    /// Post-construction hook, run once per entity after the whole map is
    /// built. Descendants run before their parent.
    ///
    /// `state` is what [`Specialization::construct`] returned. It is moved
    /// out of the entity while the hook runs, so `entity.extension().state()`
    /// reads `None` here; use the argument.
    fn post_load(&self, entity: EntityRef<'_>, map: &Map, state: Option<&mut (dyn Any + Send + Sync)>) {
        let _ = (entity, map, state);
    }
}

/// Implementation selected for an entity, plus the state it constructed.
#[derive(Default)]
pub struct Extension {
    implementation: Option<Arc<dyn Specialization>>,
    state: Option<State>,
}

impl Extension {
    pub(crate) fn new(implementation: Arc<dyn Specialization>, state: Option<State>) -> Self {
        Self {
            implementation: Some(implementation),
            state,
        }
    }

    /// False when the built-in default was used.
    pub fn is_specialized(&self) -> bool {
        self.implementation.is_some()
    }

    pub fn implementation(&self) -> Option<&Arc<dyn Specialization>> {
        self.implementation.as_ref()
    }

    pub fn is_implemented_by(&self, implementation: &Arc<dyn Specialization>) -> bool {
        self.implementation
            .as_ref()
            .is_some_and(|own| Arc::ptr_eq(own, implementation))
    }

    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.as_deref()?.downcast_ref()
    }

    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.as_deref_mut()?.downcast_mut()
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("specialized", &self.is_specialized())
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

/// `(kind, type string)` and per-kind base tables.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    by_type: HashMap<(EntityKind, String), Arc<dyn Specialization>>,
    bases: HashMap<EntityKind, Arc<dyn Specialization>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `implementation` with `type_names` for `kind`, and with
    /// the kind itself when `as_base` is set. A second base for the same
    /// kind is a configuration error and leaves the registry untouched.
    /// Re-registering a type string replaces the earlier implementation.
    pub fn register(
        &mut self,
        kind: EntityKind,
        implementation: Arc<dyn Specialization>,
        type_names: &[&str],
        as_base: bool,
    ) -> Result<(), RegistryError> {
        if as_base {
            if self.bases.contains_key(&kind) {
                return Err(RegistryError::DuplicateBase(kind));
            }
            self.bases.insert(kind, implementation.clone());
        }
        for name in type_names {
            let key = (kind, (*name).to_owned());
            if self.by_type.insert(key, implementation.clone()).is_some() {
                warn!(?kind, type_name = name, "replacing registered specialization");
            }
        }
        Ok(())
    }

    /// Most specific implementation for an entity; `None` means the
    /// built-in default.
    pub fn resolve(&self, kind: EntityKind, type_name: &str) -> Option<&Arc<dyn Specialization>> {
        self.by_type
            .get(&(kind, type_name.to_owned()))
            .or_else(|| self.bases.get(&kind))
    }

    pub fn has_base(&self, kind: EntityKind) -> bool {
        self.bases.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.by_type.len() + self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.bases.is_empty()
    }

    /// Selects the implementation for a freshly built entity and lets it
    /// construct its state.
    pub(crate) fn extension_for(&self, entity: EntityRef<'_>) -> Extension {
        match self.resolve(entity.kind(), entity.class()) {
            Some(implementation) => {
                trace!(kind = ?entity.kind(), class = entity.class(), "specialized entity");
                let state = implementation.construct(entity);
                Extension::new(implementation.clone(), state)
            }
            None => Extension::default(),
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.by_type.keys().collect();
        types.sort();
        let mut bases: Vec<_> = self.bases.keys().collect();
        bases.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &types)
            .field("bases", &bases)
            .finish()
    }
}

/// Runs every specialized entity's hook once, descendants first, siblings
/// in document order.
pub fn run_post_load(map: &mut Map) {
    for path in map.post_order() {
        let Some(ext) = map.extension_mut(&path) else {
            continue;
        };
        let Some(implementation) = ext.implementation.clone() else {
            continue;
        };
        let mut state = ext.state.take();
        if let Some(entity) = map.entity(&path) {
            implementation.post_load(entity, map, state.as_deref_mut());
        }
        if let Some(ext) = map.extension_mut(&path) {
            ext.state = state;
        }
    }
}

/// Hook order for `map`, useful to hosts that run their own passes.
pub fn hook_order(map: &Map) -> Vec<EntityPath> {
    map.post_order()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Specialization for Counting {
        fn post_load(&self, _: EntityRef<'_>, _: &Map, _: Option<&mut (dyn Any + Send + Sync)>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn imp() -> Arc<dyn Specialization> {
        Arc::new(Counting::default())
    }

    #[test]
    fn resolution_precedence() {
        let player = imp();
        let base = imp();
        let mut reg = TypeRegistry::new();
        reg.register(EntityKind::Object, player.clone(), &["player"], false)
            .unwrap();
        reg.register(EntityKind::Object, base.clone(), &[], true).unwrap();

        assert!(Arc::ptr_eq(reg.resolve(EntityKind::Object, "player").unwrap(), &player));
        assert!(Arc::ptr_eq(reg.resolve(EntityKind::Object, "enemy").unwrap(), &base));
        assert!(Arc::ptr_eq(reg.resolve(EntityKind::Object, "").unwrap(), &base));
        // other kinds fall back to the built-in default
        assert!(reg.resolve(EntityKind::ObjectGroup, "player").is_none());
    }

    #[test]
    fn type_string_is_kind_scoped() {
        let mut reg = TypeRegistry::new();
        reg.register(EntityKind::ObjectGroup, imp(), &["spawns"], false)
            .unwrap();
        assert!(reg.resolve(EntityKind::ObjectGroup, "spawns").is_some());
        assert!(reg.resolve(EntityKind::Object, "spawns").is_none());
    }

    #[test]
    fn second_base_is_a_configuration_error() {
        let mut reg = TypeRegistry::new();
        reg.register(EntityKind::Tile, imp(), &[], true).unwrap();
        let err = reg.register(EntityKind::Tile, imp(), &["water"], true).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateBase(EntityKind::Tile));
        // rejected registration left nothing behind
        assert!(reg.has_base(EntityKind::Tile));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn later_type_registration_replaces_earlier() {
        let first = imp();
        let second = imp();
        let mut reg = TypeRegistry::new();
        reg.register(EntityKind::Object, first, &["chest"], false).unwrap();
        reg.register(EntityKind::Object, second.clone(), &["chest"], false)
            .unwrap();
        assert!(Arc::ptr_eq(reg.resolve(EntityKind::Object, "chest").unwrap(), &second));
    }

    #[test]
    fn extension_state_downcasts() {
        struct Hp(u32);
        let mut ext = Extension::new(imp(), Some(Box::new(Hp(3))));
        assert!(ext.is_specialized());
        assert_eq!(ext.state::<Hp>().map(|h| h.0), Some(3));
        assert!(ext.state::<String>().is_none());
        if let Some(hp) = ext.state_mut::<Hp>() {
            hp.0 = 1;
        }
        assert_eq!(ext.state::<Hp>().map(|h| h.0), Some(1));
        assert!(!Extension::default().is_specialized());
    }
}
