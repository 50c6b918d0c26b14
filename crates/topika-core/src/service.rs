//! # Core Service
//!
//! The engine façade: one object owning the graph store and the type
//! engine state, exposing the public operations.
//!
//! `bootstrap` seeds the self-describing core: every meta type, data type,
//! cardinality and core association type exists as an ordinary topic with
//! its own data-type edge, so the normal fetch path resolves them like any
//! user-defined type. Bootstrapping an already-seeded store is a no-op.

use crate::child_topics::ChildTopics;
use crate::model::{AssocDef, DataType, TypeKind, TypeModel};
use crate::store::GraphStore;
use crate::types::{AssocId, ResultExt, Role, SimpleValue, TopicId, TopikaError};
use crate::typestorage::TypeStorage;
use crate::uris::{self, RoleType};
use tracing::{debug, info};

// =============================================================================
// CORE SERVICE
// =============================================================================

/// The public surface of the type engine, generic over the storage backend.
#[derive(Debug)]
pub struct CoreService<S: GraphStore> {
    store: S,
    types: TypeStorage,
}

impl<S: GraphStore> CoreService<S> {
    /// Wrap a store. No bootstrap is performed here.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            types: TypeStorage::new(),
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write access to the underlying store (needed to drive a
    /// [`ChildTopics`] view).
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Read access to the type engine state (cache inspection).
    #[must_use]
    pub fn types(&self) -> &TypeStorage {
        &self.types
    }

    // -------------------------------------------------------------------------
    // BOOTSTRAP
    // -------------------------------------------------------------------------

    /// Seed the self-describing core. Idempotent: a store that already
    /// carries the meta meta type is left untouched.
    pub fn bootstrap(&mut self) -> Result<(), TopikaError> {
        if self.store.fetch_topic_by_uri(uris::META_META_TYPE)?.is_some() {
            debug!("core already bootstrapped");
            return Ok(());
        }
        info!("bootstrapping the self-describing core");

        // (type topic, its data type) pairs; the edges come after all
        // satellite topics exist
        let mut typed: Vec<(TopicId, DataType)> = Vec::new();

        // the meta level; the meta meta type is typed by itself
        for (uri, type_uri, name) in [
            (uris::META_META_TYPE, uris::META_META_TYPE, "Meta Meta Type"),
            (uris::META_TYPE, uris::META_META_TYPE, "Meta Type"),
            (uris::TOPIC_TYPE, uris::META_TYPE, "Topic Type"),
            (uris::ASSOC_TYPE, uris::META_TYPE, "Association Type"),
        ] {
            typed.push((self.seed(uri, type_uri, name)?, DataType::Text));
        }

        // satellite topic types
        for (uri, name, data_type) in [
            (uris::DATA_TYPE, "Data Type", DataType::Text),
            (uris::CARDINALITY, "Cardinality", DataType::Text),
            (uris::INCLUDE_IN_LABEL, "Include in Label", DataType::Boolean),
            (uris::IDENTITY_ATTR, "Identity Attribute", DataType::Boolean),
            (uris::VIEW_CONFIG, "View Configuration", DataType::Composite),
        ] {
            typed.push((self.seed(uri, uris::TOPIC_TYPE, name)?, data_type));
        }

        // core association types
        for (uri, name) in [
            (uris::COMPOSITION, "Composition"),
            (uris::AGGREGATION, "Aggregation"),
            (uris::COMPOSITION_DEF, "Composition Definition"),
            (uris::AGGREGATION_DEF, "Aggregation Definition"),
            (uris::SEQUENCE, "Sequence"),
            (uris::INSTANTIATION, "Instantiation"),
            (uris::CUSTOM_ASSOC_TYPE, "Custom Association Type"),
            (uris::PARENT_CARDINALITY, "Parent Cardinality"),
            (uris::CHILD_CARDINALITY, "Child Cardinality"),
        ] {
            typed.push((self.seed(uri, uris::ASSOC_TYPE, name)?, DataType::Text));
        }

        // data type and cardinality topics
        for (uri, name) in [
            (uris::TEXT, "Text"),
            (uris::NUMBER, "Number"),
            (uris::BOOLEAN, "Boolean"),
            (uris::HTML, "HTML"),
            (uris::COMPOSITE, "Composite"),
            (uris::REF, "Reference"),
        ] {
            self.seed(uri, uris::DATA_TYPE, name)?;
        }
        for (uri, name) in [(uris::ONE, "One"), (uris::MANY, "Many")] {
            self.seed(uri, uris::CARDINALITY, name)?;
        }

        // every type topic gets its data-type edge
        for (type_id, data_type) in typed {
            let dt_topic = self
                .store
                .fetch_topic_by_uri(data_type.uri())?
                .ok_or_else(|| TopikaError::TypeNotFound(data_type.uri().to_string()))?;
            self.store.create_assoc(
                uris::COMPOSITION,
                Role::new(RoleType::Type, type_id.into()),
                Role::new(RoleType::Default, dt_topic.id.into()),
            )?;
        }
        Ok(())
    }

    fn seed(&mut self, uri: &str, type_uri: &str, name: &str) -> Result<TopicId, TopikaError> {
        self.store
            .create_topic(Some(uri), type_uri, Some(SimpleValue::text(name)))
    }

    // -------------------------------------------------------------------------
    // TYPES
    // -------------------------------------------------------------------------

    /// The topic type with the given URI.
    pub fn get_topic_type(&mut self, uri: &str) -> Result<&TypeModel, TopikaError> {
        self.types.get_topic_type(&self.store, uri)
    }

    /// The association type with the given URI.
    pub fn get_assoc_type(&mut self, uri: &str) -> Result<&TypeModel, TopikaError> {
        self.types.get_assoc_type(&self.store, uri)
    }

    /// Persist a draft topic type.
    pub fn create_topic_type(&mut self, model: TypeModel) -> Result<(), TopikaError> {
        self.create_type(TypeKind::Topic, model)
    }

    /// Persist a draft association type.
    pub fn create_assoc_type(&mut self, model: TypeModel) -> Result<(), TopikaError> {
        self.create_type(TypeKind::Assoc, model)
    }

    fn create_type(&mut self, kind: TypeKind, model: TypeModel) -> Result<(), TopikaError> {
        if model.kind != kind {
            return Err(TopikaError::ModelViolation(format!(
                "\"{}\" is not a {} model",
                model.uri,
                kind.name()
            )));
        }
        self.types.create_type(&mut self.store, model)
    }

    /// Append an association definition to an existing type.
    pub fn add_assoc_def(&mut self, type_uri: &str, assoc_def: AssocDef) -> Result<(), TopikaError> {
        let kind = self.type_kind(type_uri)?;
        self.types
            .add_assoc_def(&mut self.store, kind, type_uri, assoc_def)
    }

    /// Insert an association definition before an existing one.
    pub fn add_assoc_def_before(
        &mut self,
        type_uri: &str,
        assoc_def: AssocDef,
        before_assoc_def_uri: &str,
    ) -> Result<(), TopikaError> {
        let kind = self.type_kind(type_uri)?;
        self.types.add_assoc_def_before(
            &mut self.store,
            kind,
            type_uri,
            assoc_def,
            before_assoc_def_uri,
        )
    }

    /// Drop a type from the cache (after deletion or redefinition).
    pub fn remove_type_from_cache(&mut self, type_uri: &str) -> Result<TypeModel, TopikaError> {
        self.types.remove_from_cache(type_uri)
    }

    // -------------------------------------------------------------------------
    // VIEW CONFIG
    // -------------------------------------------------------------------------

    /// Update one view config setting of a type.
    pub fn add_type_setting(
        &mut self,
        type_uri: &str,
        config_type_uri: &str,
        setting_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        let kind = self.type_kind(type_uri)?;
        self.types.add_type_setting(
            &mut self.store,
            kind,
            type_uri,
            config_type_uri,
            setting_uri,
            value,
        )
    }

    /// Update one view config setting of an association definition.
    pub fn add_assoc_def_setting(
        &mut self,
        type_uri: &str,
        assoc_def_uri: &str,
        config_type_uri: &str,
        setting_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        let kind = self.type_kind(type_uri)?;
        self.types.add_assoc_def_setting(
            &mut self.store,
            kind,
            type_uri,
            assoc_def_uri,
            config_type_uri,
            setting_uri,
            value,
        )
    }

    // -------------------------------------------------------------------------
    // INSTANCES
    // -------------------------------------------------------------------------

    /// Create an instance topic plus its instantiation edge.
    pub fn create_topic(
        &mut self,
        type_uri: &str,
        value: Option<SimpleValue>,
    ) -> Result<TopicId, TopikaError> {
        let type_id = self
            .types
            .get_topic_type(&self.store, type_uri)
            .with_context(|| format!("creating an instance of \"{type_uri}\" failed"))?
            .id;
        let id = self.store.create_topic(None, type_uri, value)?;
        self.store.create_assoc(
            uris::INSTANTIATION,
            Role::new(RoleType::Type, type_id.into()),
            Role::new(RoleType::Instance, id.into()),
        )?;
        Ok(id)
    }

    /// A child-topics view over a topic. Drive it with [`Self::store_mut`].
    pub fn child_topics(&mut self, topic_id: TopicId) -> Result<ChildTopics, TopikaError> {
        let topic = self
            .store
            .fetch_topic(topic_id)?
            .ok_or(TopikaError::ObjectNotFound(topic_id.0))?;
        let model = self
            .types
            .get_topic_type(&self.store, &topic.type_uri)?
            .clone();
        Ok(ChildTopics::new(topic_id.into(), model))
    }

    /// A child-topics view over an association.
    pub fn assoc_child_topics(&mut self, assoc_id: AssocId) -> Result<ChildTopics, TopikaError> {
        let assoc = self
            .store
            .fetch_assoc(assoc_id)?
            .ok_or(TopikaError::ObjectNotFound(assoc_id.0))?;
        let model = self
            .types
            .get_assoc_type(&self.store, &assoc.type_uri)?
            .clone();
        Ok(ChildTopics::new(assoc_id.into(), model))
    }

    // -------------------------------------------------------------------------
    // INTERNAL
    // -------------------------------------------------------------------------

    /// Which kind of type a URI denotes, read off the type topic's meta type.
    fn type_kind(&self, type_uri: &str) -> Result<TypeKind, TopikaError> {
        let topic = self
            .store
            .fetch_topic_by_uri(type_uri)?
            .ok_or_else(|| TopikaError::TypeNotFound(type_uri.to_string()))?;
        match topic.type_uri.as_str() {
            uris::TOPIC_TYPE | uris::META_TYPE | uris::META_META_TYPE => Ok(TypeKind::Topic),
            uris::ASSOC_TYPE => Ok(TypeKind::Assoc),
            other => Err(TopikaError::TypeMismatch {
                uri: type_uri.to_string(),
                actual: other.to_string(),
                expected: uris::TOPIC_TYPE.to_string(),
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
