//! # Type Fetch/Store Engine
//!
//! Materializes [`TypeModel`]s from their graph representation and writes
//! them back. This is where the self-description closes: a type definition
//! is stored as ordinary topics and associations, addressed through the
//! same store primitives as user data.
//!
//! Fetch is strict. Missing satellites and a sequence that disagrees with
//! the actual association definitions abort the load; nothing is repaired
//! on the fly and no partial model survives in the cache.

use crate::cache::{RecursionGuard, TypeCache};
use crate::model::{AssocDef, AssocDefKind, Cardinality, DataType, TypeKind, TypeModel};
use crate::sequence;
use crate::store::GraphStore;
use crate::types::{AssocId, Association, Role, SimpleValue, Topic, TopikaError};
use crate::uris::{self, RoleType};
use crate::viewconfig::{self, Configurable, ViewConfig};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// =============================================================================
// TYPE STORAGE
// =============================================================================

/// The stateful half of the engine: type cache plus recursion guard.
///
/// All operations are generic over the [`GraphStore`] so the same engine
/// drives the in-memory and the redb backend.
#[derive(Debug, Default)]
pub struct TypeStorage {
    cache: TypeCache,
    guard: RecursionGuard,
}

impl TypeStorage {
    /// Create an engine with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the type cache.
    #[must_use]
    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    // -------------------------------------------------------------------------
    // GET (cache hit or fetch)
    // -------------------------------------------------------------------------

    /// The topic type with the given URI, from the cache or freshly fetched.
    pub fn get_topic_type<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        uri: &str,
    ) -> Result<&'a TypeModel, TopikaError> {
        self.get_type(store, TypeKind::Topic, uri)
    }

    /// The association type with the given URI, from the cache or freshly
    /// fetched.
    pub fn get_assoc_type<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        uri: &str,
    ) -> Result<&'a TypeModel, TopikaError> {
        self.get_type(store, TypeKind::Assoc, uri)
    }

    fn get_type<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        kind: TypeKind,
        uri: &str,
    ) -> Result<&'a TypeModel, TopikaError> {
        if !self.cache.contains(uri) {
            self.fetch_type(store, kind, uri)?;
        }
        let model = self
            .cache
            .get_if_present(uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(uri.to_string()))?;
        // a cache hit may still be of the wrong kind
        if model.kind != kind {
            return Err(TopikaError::TypeMismatch {
                uri: uri.to_string(),
                actual: model.kind.meta_type_uri().to_string(),
                expected: kind.meta_type_uri().to_string(),
            });
        }
        Ok(model)
    }

    /// Load a type without handing out the borrow (internal callers that
    /// continue with cache surgery afterwards).
    fn ensure_loaded<S: GraphStore>(
        &mut self,
        store: &S,
        kind: TypeKind,
        uri: &str,
    ) -> Result<(), TopikaError> {
        self.get_type(store, kind, uri).map(|_| ())
    }

    // -------------------------------------------------------------------------
    // FETCH
    // -------------------------------------------------------------------------

    fn fetch_type<S: GraphStore>(
        &mut self,
        store: &S,
        kind: TypeKind,
        uri: &str,
    ) -> Result<(), TopikaError> {
        debug!(type_uri = uri, kind = kind.name(), "fetching type");
        self.guard.enter(uri)?;
        let result = self.fetch_type_inner(store, kind, uri);
        self.guard.leave(uri);
        result.map_err(|e| {
            // no partial model survives a failed load
            self.cache.discard(uri);
            e.context(format!("fetching {} \"{uri}\" failed", kind.name()))
        })
    }

    fn fetch_type_inner<S: GraphStore>(
        &mut self,
        store: &S,
        kind: TypeKind,
        uri: &str,
    ) -> Result<(), TopikaError> {
        let topic = store
            .fetch_topic_by_uri(uri)?
            .ok_or_else(|| TopikaError::TypeNotFound(uri.to_string()))?;
        kind.check_meta_type(uri, &topic.type_uri)?;

        let data_type = fetch_data_type(store, &topic)?;
        let assoc_defs = fetch_assoc_defs(store, &topic)?;
        let def_ids: Vec<AssocId> = assoc_defs.iter().map(|d| d.id).collect();

        // The model enters the cache before its view configs are resolved:
        // a config topic may be typed by a type that refers back to this one.
        self.cache.put(TypeModel::from_parts(
            kind,
            topic.id,
            uri,
            topic.value,
            data_type,
            assoc_defs,
            ViewConfig::new(),
        ));

        let type_config = viewconfig::fetch_of_type(store, topic.id)?;
        let mut def_configs = Vec::with_capacity(def_ids.len());
        for def_id in &def_ids {
            def_configs.push(viewconfig::fetch_of_assoc_def(store, *def_id)?);
        }
        let model = self
            .cache
            .get_mut(uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(uri.to_string()))?;
        model.view_config = type_config;
        for (def, config) in model.assoc_defs_mut().iter_mut().zip(def_configs) {
            def.view_config = config;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // CREATE / STORE
    // -------------------------------------------------------------------------

    /// Persist a draft type: create its generic topic (URI uniqueness is
    /// enforced by the store), then store the definition parts.
    pub fn create_type<S: GraphStore>(
        &mut self,
        store: &mut S,
        mut model: TypeModel,
    ) -> Result<(), TopikaError> {
        info!(type_uri = %model.uri, kind = model.kind.name(), "creating type");
        model.id = store.create_topic(
            Some(&model.uri),
            model.kind.meta_type_uri(),
            model.value.clone(),
        )?;
        // type topics are themselves instances of their meta type; a world
        // without the meta type topic cannot hold types
        let meta = store
            .fetch_topic_by_uri(model.kind.meta_type_uri())?
            .ok_or_else(|| TopikaError::TypeNotFound(model.kind.meta_type_uri().to_string()))?;
        store.create_assoc(
            uris::INSTANTIATION,
            Role::new(RoleType::Type, meta.id.into()),
            Role::new(RoleType::Instance, model.id.into()),
        )?;
        self.store_type(store, model)
    }

    /// Store the definition parts of a type whose generic topic exists.
    ///
    /// The model enters the cache before anything is written; storing a
    /// self-describing type may need its own entry resolvable.
    pub fn store_type<S: GraphStore>(
        &mut self,
        store: &mut S,
        model: TypeModel,
    ) -> Result<(), TopikaError> {
        let uri = model.uri.clone();
        self.cache.put(model);
        match self.store_type_parts(store, &uri) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.cache.discard(&uri);
                Err(e.context(format!("storing type \"{uri}\" failed")))
            }
        }
    }

    fn store_type_parts<S: GraphStore>(
        &mut self,
        store: &mut S,
        uri: &str,
    ) -> Result<(), TopikaError> {
        let mut model = self
            .cache
            .get_if_present(uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(uri.to_string()))?
            .clone();

        store_data_type_edge(store, &model)?;
        for def in model.assoc_defs_mut() {
            store_assoc_def(store, def)?;
        }
        let def_ids: Vec<AssocId> = model.assoc_defs().iter().map(|d| d.id).collect();
        sequence::store(store, model.id, &def_ids)?;
        model.view_config =
            viewconfig::store(store, Configurable::Type(model.id), &model.view_config)?;

        self.cache.put(model);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // TYPE EDITING
    // -------------------------------------------------------------------------

    /// Append an association definition to a type, updating store, sequence
    /// and cached model.
    pub fn add_assoc_def<S: GraphStore>(
        &mut self,
        store: &mut S,
        kind: TypeKind,
        type_uri: &str,
        assoc_def: AssocDef,
    ) -> Result<(), TopikaError> {
        self.add_assoc_def_impl(store, kind, type_uri, assoc_def, None)
    }

    /// Insert an association definition before an existing one.
    pub fn add_assoc_def_before<S: GraphStore>(
        &mut self,
        store: &mut S,
        kind: TypeKind,
        type_uri: &str,
        assoc_def: AssocDef,
        before_assoc_def_uri: &str,
    ) -> Result<(), TopikaError> {
        self.add_assoc_def_impl(store, kind, type_uri, assoc_def, Some(before_assoc_def_uri))
    }

    fn add_assoc_def_impl<S: GraphStore>(
        &mut self,
        store: &mut S,
        kind: TypeKind,
        type_uri: &str,
        mut assoc_def: AssocDef,
        before: Option<&str>,
    ) -> Result<(), TopikaError> {
        self.ensure_loaded(store, kind, type_uri)?;
        let (type_id, first, last, before_id) = {
            let model = self
                .cache
                .get_if_present(type_uri)
                .ok_or_else(|| TopikaError::TypeCacheInconsistency(type_uri.to_string()))?;
            let before_id = match before {
                Some(before_uri) => Some(
                    model
                        .assoc_def(before_uri)
                        .ok_or_else(|| {
                            TopikaError::ModelViolation(format!(
                                "type \"{type_uri}\" has no assoc def \"{before_uri}\""
                            ))
                        })?
                        .id,
                ),
                None => None,
            };
            (
                model.id,
                model.assoc_defs().first().map(|d| d.id),
                model.assoc_defs().last().map(|d| d.id),
                before_id,
            )
        };

        assoc_def.parent_type_uri = type_uri.to_string();
        store_assoc_def(store, &mut assoc_def)?;
        sequence::insert(store, type_id, assoc_def.id, before_id, first, last)?;

        let model = self
            .cache
            .get_mut(type_uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(type_uri.to_string()))?;
        match before {
            Some(before_uri) => model.insert_assoc_def_before(assoc_def, before_uri)?,
            None => model.push_assoc_def(assoc_def),
        }
        Ok(())
    }

    /// Drop a type from the cache (deletion, redefinition). The next `get`
    /// fetches it fresh.
    pub fn remove_from_cache(&mut self, type_uri: &str) -> Result<TypeModel, TopikaError> {
        self.cache.remove(type_uri)
    }

    // -------------------------------------------------------------------------
    // VIEW CONFIG EDITING
    // -------------------------------------------------------------------------

    /// Update one view config setting of a type, in the graph and in the
    /// cached model.
    pub fn add_type_setting<S: GraphStore>(
        &mut self,
        store: &mut S,
        kind: TypeKind,
        type_uri: &str,
        config_type_uri: &str,
        setting_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        self.ensure_loaded(store, kind, type_uri)?;
        let model = self
            .cache
            .get_mut(type_uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(type_uri.to_string()))?;
        viewconfig::add_setting(
            store,
            Configurable::Type(model.id),
            &mut model.view_config,
            config_type_uri,
            setting_uri,
            value,
        )
    }

    /// Update one view config setting of an association definition.
    pub fn add_assoc_def_setting<S: GraphStore>(
        &mut self,
        store: &mut S,
        kind: TypeKind,
        type_uri: &str,
        assoc_def_uri: &str,
        config_type_uri: &str,
        setting_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        self.ensure_loaded(store, kind, type_uri)?;
        let model = self
            .cache
            .get_mut(type_uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(type_uri.to_string()))?;
        let index = model.assoc_def_index(assoc_def_uri).ok_or_else(|| {
            TopikaError::ModelViolation(format!(
                "type \"{type_uri}\" has no assoc def \"{assoc_def_uri}\""
            ))
        })?;
        let def = &mut model.assoc_defs_mut()[index];
        viewconfig::add_setting(
            store,
            Configurable::AssocDef(def.id),
            &mut def.view_config,
            config_type_uri,
            setting_uri,
            value,
        )
    }

    // -------------------------------------------------------------------------
    // PARENT TYPE DISPATCH
    // -------------------------------------------------------------------------

    /// Resolve the parent type of an assoc-def association, dispatching on
    /// the parent player's meta type.
    pub fn fetch_parent_type<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        assoc_def: &Association,
    ) -> Result<&'a TypeModel, TopikaError> {
        let player = assoc_def.require_player(RoleType::ParentType)?;
        let topic_id = player.topic_id().ok_or_else(|| {
            TopikaError::DataInconsistency(format!(
                "parent type player of assoc def {} is not a topic",
                assoc_def.id.0
            ))
        })?;
        let topic = store
            .fetch_topic(topic_id)?
            .ok_or(TopikaError::ObjectNotFound(topic_id.0))?;
        let uri = topic.require_uri()?.to_string();
        match topic.type_uri.as_str() {
            uris::TOPIC_TYPE | uris::META_TYPE | uris::META_META_TYPE => {
                self.get_type(store, TypeKind::Topic, &uri)
            }
            uris::ASSOC_TYPE => self.get_type(store, TypeKind::Assoc, &uri),
            other => Err(TopikaError::TypeMismatch {
                uri,
                actual: other.to_string(),
                expected: uris::TOPIC_TYPE.to_string(),
            }),
        }
    }
}

// =============================================================================
// FETCH PARTS
// =============================================================================

fn fetch_data_type<S: GraphStore>(store: &S, type_topic: &Topic) -> Result<DataType, TopikaError> {
    let related = store
        .related_topic(
            type_topic.id.into(),
            uris::COMPOSITION,
            RoleType::Type,
            RoleType::Default,
            Some(uris::DATA_TYPE),
        )?
        .ok_or_else(|| {
            TopikaError::DataInconsistency(format!(
                "type \"{}\" has no data type",
                type_topic.uri.as_deref().unwrap_or("?")
            ))
        })?;
    DataType::from_uri(related.topic.require_uri()?)
}

fn fetch_assoc_defs<S: GraphStore>(
    store: &S,
    type_topic: &Topic,
) -> Result<Vec<AssocDef>, TopikaError> {
    // unsorted, straight from the parent_type edges
    let mut unsorted: BTreeMap<AssocId, Association> = BTreeMap::new();
    for assoc in store.assocs_of_player(type_topic.id.into())? {
        if !matches!(
            assoc.type_uri.as_str(),
            uris::COMPOSITION_DEF | uris::AGGREGATION_DEF
        ) {
            continue;
        }
        if assoc.player(RoleType::ParentType) != Some(type_topic.id.into()) {
            continue;
        }
        unsorted.insert(assoc.id, assoc);
    }

    let sequence = sequence::fetch(store, type_topic.id)?;
    if sequence.len() != unsorted.len() {
        let uri = type_topic.uri.as_deref().unwrap_or("?");
        warn!(
            type_uri = uri,
            assoc_defs = unsorted.len(),
            sequence = sequence.len(),
            "assoc defs and sequence disagree"
        );
        return Err(TopikaError::DataInconsistency(format!(
            "type \"{uri}\" has {} assoc defs but its sequence has {} elements",
            unsorted.len(),
            sequence.len()
        )));
    }

    let mut assoc_defs = Vec::with_capacity(sequence.len());
    for element in sequence {
        let assoc = unsorted.remove(&element.assoc.id).ok_or_else(|| {
            TopikaError::DataInconsistency(format!(
                "sequence of type \"{}\" contains {} which is not one of its assoc defs",
                type_topic.uri.as_deref().unwrap_or("?"),
                element.assoc.id.0
            ))
        })?;
        assoc_defs.push(fetch_assoc_def(store, &assoc)?);
    }
    Ok(assoc_defs)
}

fn fetch_assoc_def<S: GraphStore>(
    store: &S,
    assoc: &Association,
) -> Result<AssocDef, TopikaError> {
    let kind = AssocDefKind::from_def_type_uri(&assoc.type_uri)?;
    let parent_type_uri = player_type_uri(store, assoc, RoleType::ParentType)?;
    let child_type_uri = player_type_uri(store, assoc, RoleType::ChildType)?;

    let child_cardinality = fetch_cardinality(store, assoc.id, uris::CHILD_CARDINALITY)?
        .ok_or_else(|| {
            TopikaError::DataInconsistency(format!(
                "assoc def {} has no child cardinality",
                assoc.id.0
            ))
        })?;
    let parent_cardinality = fetch_cardinality(store, assoc.id, uris::PARENT_CARDINALITY)?
        .unwrap_or(Cardinality::One);

    let custom_assoc_type_uri = match store.related_topic(
        assoc.id.into(),
        uris::CUSTOM_ASSOC_TYPE,
        RoleType::Parent,
        RoleType::Child,
        Some(uris::ASSOC_TYPE),
    )? {
        Some(related) => Some(related.topic.require_uri()?.to_string()),
        None => None,
    };

    let mut def = AssocDef::draft(
        kind,
        parent_type_uri,
        child_type_uri,
        parent_cardinality,
        child_cardinality,
    );
    def.id = assoc.id;
    def.custom_assoc_type_uri = custom_assoc_type_uri;
    def.include_in_label = fetch_flag(store, assoc.id, uris::INCLUDE_IN_LABEL)?;
    def.identity_attr = fetch_flag(store, assoc.id, uris::IDENTITY_ATTR)?;
    Ok(def)
}

fn player_type_uri<S: GraphStore>(
    store: &S,
    assoc: &Association,
    role_type: RoleType,
) -> Result<String, TopikaError> {
    let player = assoc.require_player(role_type)?;
    let topic_id = player.topic_id().ok_or_else(|| {
        TopikaError::DataInconsistency(format!(
            "player of role \"{}\" in assoc def {} is not a topic",
            role_type.uri(),
            assoc.id.0
        ))
    })?;
    let topic = store
        .fetch_topic(topic_id)?
        .ok_or(TopikaError::ObjectNotFound(topic_id.0))?;
    Ok(topic.require_uri()?.to_string())
}

fn fetch_cardinality<S: GraphStore>(
    store: &S,
    assoc_def_id: AssocId,
    cardinality_assoc_type: &str,
) -> Result<Option<Cardinality>, TopikaError> {
    match store.related_topic(
        assoc_def_id.into(),
        cardinality_assoc_type,
        RoleType::Parent,
        RoleType::Child,
        Some(uris::CARDINALITY),
    )? {
        Some(related) => Ok(Some(Cardinality::from_uri(related.topic.require_uri()?)?)),
        None => Ok(None),
    }
}

fn fetch_flag<S: GraphStore>(
    store: &S,
    assoc_def_id: AssocId,
    flag_type_uri: &str,
) -> Result<bool, TopikaError> {
    Ok(store
        .related_topic(
            assoc_def_id.into(),
            uris::COMPOSITION,
            RoleType::Parent,
            RoleType::Child,
            Some(flag_type_uri),
        )?
        .and_then(|related| related.topic.value.and_then(|v| v.as_boolean()))
        .unwrap_or(false))
}

// =============================================================================
// STORE PARTS
// =============================================================================

fn store_data_type_edge<S: GraphStore>(
    store: &mut S,
    model: &TypeModel,
) -> Result<(), TopikaError> {
    let data_type_topic = topic_by_uri(store, model.data_type.uri())?;
    store.create_assoc(
        uris::COMPOSITION,
        Role::new(RoleType::Type, model.id.into()),
        Role::new(RoleType::Default, data_type_topic.id.into()),
    )?;
    Ok(())
}

fn store_assoc_def<S: GraphStore>(store: &mut S, def: &mut AssocDef) -> Result<(), TopikaError> {
    let parent = topic_by_uri(store, &def.parent_type_uri)?;
    let child = topic_by_uri(store, &def.child_type_uri)?;
    def.id = store.create_assoc(
        def.kind.def_type_uri(),
        Role::new(RoleType::ParentType, parent.id.into()),
        Role::new(RoleType::ChildType, child.id.into()),
    )?;

    store_cardinality(store, def.id, uris::CHILD_CARDINALITY, def.child_cardinality)?;
    store_cardinality(store, def.id, uris::PARENT_CARDINALITY, def.parent_cardinality)?;

    if let Some(custom_uri) = &def.custom_assoc_type_uri {
        let custom = topic_by_uri(store, custom_uri)?;
        store.create_assoc(
            uris::CUSTOM_ASSOC_TYPE,
            Role::new(RoleType::Parent, def.id.into()),
            Role::new(RoleType::Child, custom.id.into()),
        )?;
    }
    if def.include_in_label {
        store_flag(store, def.id, uris::INCLUDE_IN_LABEL)?;
    }
    if def.identity_attr {
        store_flag(store, def.id, uris::IDENTITY_ATTR)?;
    }
    def.view_config = viewconfig::store(store, Configurable::AssocDef(def.id), &def.view_config)?;
    Ok(())
}

fn store_cardinality<S: GraphStore>(
    store: &mut S,
    assoc_def_id: AssocId,
    cardinality_assoc_type: &str,
    cardinality: Cardinality,
) -> Result<(), TopikaError> {
    let topic = topic_by_uri(store, cardinality.uri())?;
    store.create_assoc(
        cardinality_assoc_type,
        Role::new(RoleType::Parent, assoc_def_id.into()),
        Role::new(RoleType::Child, topic.id.into()),
    )?;
    Ok(())
}

fn store_flag<S: GraphStore>(
    store: &mut S,
    assoc_def_id: AssocId,
    flag_type_uri: &str,
) -> Result<(), TopikaError> {
    let flag = store.create_topic(None, flag_type_uri, Some(SimpleValue::Boolean(true)))?;
    store.create_assoc(
        uris::COMPOSITION,
        Role::new(RoleType::Parent, assoc_def_id.into()),
        Role::new(RoleType::Child, flag.into()),
    )?;
    Ok(())
}

fn topic_by_uri<S: GraphStore>(store: &S, uri: &str) -> Result<Topic, TopikaError> {
    store
        .fetch_topic_by_uri(uri)?
        .ok_or_else(|| TopikaError::TypeNotFound(uri.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// Seed the satellite topics the store engine resolves by URI.
    fn seeded_store() -> MemoryStore {
        let mut s = MemoryStore::new();
        for uri in [uris::TOPIC_TYPE, uris::ASSOC_TYPE] {
            s.create_topic(Some(uri), uris::META_TYPE, Some(SimpleValue::text(uri)))
                .expect("meta type topic");
        }
        for uri in [uris::TEXT, uris::NUMBER, uris::BOOLEAN, uris::COMPOSITE] {
            s.create_topic(Some(uri), uris::DATA_TYPE, Some(SimpleValue::text(uri)))
                .expect("data type topic");
        }
        for uri in [uris::ONE, uris::MANY] {
            s.create_topic(Some(uri), uris::CARDINALITY, Some(SimpleValue::text(uri)))
                .expect("cardinality topic");
        }
        s
    }

    fn person_draft() -> TypeModel {
        let mut model = TypeModel::draft(
            TypeKind::Topic,
            "test.person",
            Some(SimpleValue::text("Person")),
            DataType::Composite,
        );
        model.push_assoc_def(
            AssocDef::draft(
                AssocDefKind::Composition,
                "test.person",
                "test.first_name",
                Cardinality::One,
                Cardinality::One,
            )
            .with_include_in_label(),
        );
        model.push_assoc_def(AssocDef::draft(
            AssocDefKind::Aggregation,
            "test.person",
            "test.employer",
            Cardinality::Many,
            Cardinality::Many,
        ));
        model
    }

    fn create_child_types(storage: &mut TypeStorage, store: &mut MemoryStore) {
        for (uri, name) in [
            ("test.first_name", "First Name"),
            ("test.employer", "Employer"),
        ] {
            storage
                .create_type(
                    store,
                    TypeModel::draft(
                        TypeKind::Topic,
                        uri,
                        Some(SimpleValue::text(name)),
                        DataType::Text,
                    ),
                )
                .expect("child type");
        }
    }

    #[test]
    fn create_and_fetch_roundtrip() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        // fetch with a cold cache
        let mut fresh = TypeStorage::new();
        let model = fresh
            .get_topic_type(&store, "test.person")
            .expect("fetch");

        assert_eq!(model.kind, TypeKind::Topic);
        assert_eq!(model.data_type, DataType::Composite);
        let defs: Vec<_> = model
            .assoc_defs()
            .iter()
            .map(|d| (d.child_type_uri.as_str(), d.kind, d.include_in_label))
            .collect();
        assert_eq!(
            defs,
            vec![
                ("test.first_name", AssocDefKind::Composition, true),
                ("test.employer", AssocDefKind::Aggregation, false),
            ]
        );
        assert_eq!(
            model.assoc_defs()[1].child_cardinality,
            Cardinality::Many
        );
    }

    #[test]
    fn create_type_requires_the_meta_type_topic() {
        // no seeded meta type topics at all
        let mut store = MemoryStore::new();
        let mut storage = TypeStorage::new();

        let err = storage
            .create_type(
                &mut store,
                TypeModel::draft(
                    TypeKind::Topic,
                    "test.orphan",
                    Some(SimpleValue::text("Orphan")),
                    DataType::Text,
                ),
            )
            .expect_err("no meta type");
        assert!(matches!(err.root_cause(), TopikaError::TypeNotFound(_)));
    }

    #[test]
    fn missing_type_reports_type_not_found() {
        let store = seeded_store();
        let mut storage = TypeStorage::new();

        let err = storage
            .get_topic_type(&store, "test.absent")
            .expect_err("absent");
        assert!(matches!(err.root_cause(), TopikaError::TypeNotFound(_)));
        assert!(!storage.cache().contains("test.absent"));
    }

    #[test]
    fn missing_data_type_aborts_the_load() {
        let mut store = seeded_store();
        store
            .create_topic(Some("test.broken"), uris::TOPIC_TYPE, None)
            .expect("bare type topic");
        let mut storage = TypeStorage::new();

        let err = storage
            .get_topic_type(&store, "test.broken")
            .expect_err("no data type");
        assert!(matches!(
            err.root_cause(),
            TopikaError::DataInconsistency(_)
        ));
        // nothing cached, guard cleared
        assert!(!storage.cache().contains("test.broken"));
        let err2 = storage
            .get_topic_type(&store, "test.broken")
            .expect_err("still broken, not stuck in the guard");
        assert!(!matches!(
            err2.root_cause(),
            TopikaError::EndlessRecursion(_)
        ));
    }

    #[test]
    fn cache_hit_of_wrong_kind_is_a_mismatch() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        let err = storage
            .get_assoc_type(&store, "test.person")
            .expect_err("wrong kind");
        assert!(matches!(err, TopikaError::TypeMismatch { .. }));
    }

    #[test]
    fn dangling_assoc_def_breaks_the_count_invariant() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        // a def association without a sequence element
        let type_topic = store
            .fetch_topic_by_uri("test.person")
            .expect("fetch")
            .expect("present");
        let child = store
            .fetch_topic_by_uri("test.employer")
            .expect("fetch")
            .expect("present");
        store
            .create_assoc(
                uris::COMPOSITION_DEF,
                Role::new(RoleType::ParentType, type_topic.id.into()),
                Role::new(RoleType::ChildType, child.id.into()),
            )
            .expect("dangling def");

        let mut fresh = TypeStorage::new();
        let err = fresh
            .get_topic_type(&store, "test.person")
            .expect_err("count mismatch");
        assert!(matches!(
            err.root_cause(),
            TopikaError::DataInconsistency(_)
        ));
    }

    #[test]
    fn add_assoc_def_updates_store_sequence_and_cache() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(
                &mut store,
                TypeModel::draft(
                    TypeKind::Topic,
                    "test.last_name",
                    Some(SimpleValue::text("Last Name")),
                    DataType::Text,
                ),
            )
            .expect("last name type");
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        storage
            .add_assoc_def_before(
                &mut store,
                TypeKind::Topic,
                "test.person",
                AssocDef::draft(
                    AssocDefKind::Composition,
                    "test.person",
                    "test.last_name",
                    Cardinality::One,
                    Cardinality::One,
                ),
                "test.employer",
            )
            .expect("insert");

        let expect_order = ["test.first_name", "test.last_name", "test.employer"];
        let cached: Vec<_> = storage
            .get_topic_type(&store, "test.person")
            .expect("cached")
            .assoc_defs()
            .iter()
            .map(|d| d.child_type_uri.clone())
            .collect();
        assert_eq!(cached, expect_order);

        // a cold fetch agrees with the cache
        let mut fresh = TypeStorage::new();
        let fetched: Vec<_> = fresh
            .get_topic_type(&store, "test.person")
            .expect("fetch")
            .assoc_defs()
            .iter()
            .map(|d| d.child_type_uri.clone())
            .collect();
        assert_eq!(fetched, expect_order);
    }

    #[test]
    fn view_config_settings_roundtrip() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        storage
            .add_type_setting(
                &mut store,
                TypeKind::Topic,
                "test.person",
                "test.widget_config",
                "test.icon",
                SimpleValue::text("person-icon"),
            )
            .expect("type setting");
        storage
            .add_assoc_def_setting(
                &mut store,
                TypeKind::Topic,
                "test.person",
                "test.first_name",
                "test.widget_config",
                "test.width",
                SimpleValue::Number(120),
            )
            .expect("def setting");

        let mut fresh = TypeStorage::new();
        let model = fresh
            .get_topic_type(&store, "test.person")
            .expect("fetch");
        assert_eq!(
            model.view_config.setting("test.widget_config", "test.icon"),
            Some(&SimpleValue::text("person-icon"))
        );
        let def = model.assoc_def("test.first_name").expect("def");
        assert_eq!(
            def.view_config.setting("test.widget_config", "test.width"),
            Some(&SimpleValue::Number(120))
        );
    }

    #[test]
    fn fetch_parent_type_dispatches_on_meta_type() {
        let mut store = seeded_store();
        let mut storage = TypeStorage::new();
        create_child_types(&mut storage, &mut store);
        storage
            .create_type(&mut store, person_draft())
            .expect("create");

        let model = storage
            .get_topic_type(&store, "test.person")
            .expect("model");
        let def_id = model.assoc_defs()[0].id;
        let def_assoc = store
            .fetch_assoc(def_id)
            .expect("fetch")
            .expect("present");

        let parent = storage
            .fetch_parent_type(&store, &def_assoc)
            .expect("parent type");
        assert_eq!(parent.uri, "test.person");
    }
}
