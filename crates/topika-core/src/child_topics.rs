//! # Composite Value Resolver
//!
//! Navigates the child topics of one object (topic or association) along its
//! type's association definitions.
//!
//! Slots load lazily: constructing a [`ChildTopics`] view reads nothing;
//! the first accessor of a child performs one targeted traversal over the
//! def's instance-level association type and caches the result. Writes go to
//! the graph immediately and update the in-memory slot in the same step.
//!
//! After a write through a def flagged include-in-label the parent's value
//! is recomputed: the space-joined values of all flagged children in def
//! order. Only flagged slots are force-loaded for this; unrelated slots stay
//! untouched.

use crate::model::{AssocDef, Cardinality, TypeModel};
use crate::store::GraphStore;
use crate::types::{PlayerId, RelatedTopic, Role, SimpleValue, Topic, TopicId, TopikaError};
use crate::uris::RoleType;
use std::collections::BTreeMap;
use tracing::debug;

// =============================================================================
// CHILD SLOT
// =============================================================================

/// Load state of one child position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildSlot {
    /// Not fetched yet; says nothing about the graph.
    Unloaded,
    /// Fetched; the vec is the complete set of children for this def.
    Loaded(Vec<RelatedTopic>),
}

// =============================================================================
// CHILD TOPICS VIEW
// =============================================================================

/// A stateful view over one object's children, keyed by assoc-def URI.
///
/// Holds its own copy of the resolved type model, so it stays coherent even
/// if the type is redefined behind its back.
#[derive(Debug, Clone)]
pub struct ChildTopics {
    object: PlayerId,
    type_model: TypeModel,
    slots: BTreeMap<String, ChildSlot>,
}

impl ChildTopics {
    /// Create an all-unloaded view. Reads nothing from the store.
    #[must_use]
    pub fn new(object: PlayerId, type_model: TypeModel) -> Self {
        let slots = type_model
            .assoc_defs()
            .iter()
            .map(|d| (d.assoc_def_uri(), ChildSlot::Unloaded))
            .collect();
        Self {
            object,
            type_model,
            slots,
        }
    }

    /// The object this view belongs to.
    #[must_use]
    pub const fn object(&self) -> PlayerId {
        self.object
    }

    /// The type model driving the navigation.
    #[must_use]
    pub fn type_model(&self) -> &TypeModel {
        &self.type_model
    }

    /// Whether children are present *in the loaded state*. Never fetches:
    /// reports `false` for an unloaded slot even if the graph has children.
    #[must_use]
    pub fn has(&self, child_uri: &str) -> bool {
        matches!(self.slots.get(child_uri), Some(ChildSlot::Loaded(children)) if !children.is_empty())
    }

    // -------------------------------------------------------------------------
    // READ (lazy)
    // -------------------------------------------------------------------------

    /// The children of the given def, fetching them on first access.
    pub fn get<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        child_uri: &str,
    ) -> Result<&'a [RelatedTopic], TopikaError> {
        let def = self.def(child_uri)?.clone();
        self.ensure_loaded(store, &def)?;
        self.loaded(child_uri).map(Vec::as_slice)
    }

    /// The single child of a def, if present.
    pub fn get_one<'a, S: GraphStore>(
        &'a mut self,
        store: &S,
        child_uri: &str,
    ) -> Result<Option<&'a RelatedTopic>, TopikaError> {
        Ok(self.get(store, child_uri)?.first())
    }

    /// The single child's value rendered as a string, if present.
    pub fn string<S: GraphStore>(
        &mut self,
        store: &S,
        child_uri: &str,
    ) -> Result<Option<String>, TopikaError> {
        Ok(self
            .get(store, child_uri)?
            .first()
            .and_then(|child| child.topic.value.as_ref())
            .map(SimpleValue::to_label))
    }

    // -------------------------------------------------------------------------
    // WRITE (immediate)
    // -------------------------------------------------------------------------

    /// Set the value of a cardinality-one child: update the existing child
    /// topic, or create topic and instance-level association.
    pub fn set<S: GraphStore>(
        &mut self,
        store: &mut S,
        child_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        let def = self.one_def(child_uri)?;
        self.ensure_loaded(store, &def)?;

        let existing = self.loaded(child_uri)?.first().map(|c| c.topic.id);
        match existing {
            Some(child_id) => {
                store.update_topic_value(child_id, Some(value.clone()))?;
                if let Some(child) = self.loaded_mut(child_uri)?.first_mut() {
                    child.topic.value = Some(value);
                }
            }
            None => {
                let child = create_child(store, self.object, &def, value)?;
                self.loaded_mut(child_uri)?.push(child);
            }
        }
        self.maybe_recompute_label(store, &def)
    }

    /// Add a child to a cardinality-many def: always creates a new child
    /// topic plus its instance-level association.
    pub fn add<S: GraphStore>(
        &mut self,
        store: &mut S,
        child_uri: &str,
        value: SimpleValue,
    ) -> Result<(), TopikaError> {
        let def = self.many_def(child_uri)?;
        self.ensure_loaded(store, &def)?;

        let child = create_child(store, self.object, &def, value)?;
        self.loaded_mut(child_uri)?.push(child);
        self.maybe_recompute_label(store, &def)
    }

    /// Reference an existing topic as an additional cardinality-many child.
    pub fn add_ref<S: GraphStore>(
        &mut self,
        store: &mut S,
        child_uri: &str,
        child_id: TopicId,
    ) -> Result<(), TopikaError> {
        let def = self.many_def(child_uri)?;
        self.ensure_loaded(store, &def)?;

        let child = reference_child(store, self.object, &def, child_id)?;
        self.loaded_mut(child_uri)?.push(child);
        self.maybe_recompute_label(store, &def)
    }

    /// Reference an existing topic as the cardinality-one child, replacing
    /// a previous reference (the old association is deleted, the old child
    /// topic is kept).
    pub fn put_ref<S: GraphStore>(
        &mut self,
        store: &mut S,
        child_uri: &str,
        child_id: TopicId,
    ) -> Result<(), TopikaError> {
        let def = self.one_def(child_uri)?;
        self.ensure_loaded(store, &def)?;

        if let Some(previous) = self.loaded(child_uri)?.first() {
            store.delete_assoc(previous.relating_assoc)?;
        }
        let child = reference_child(store, self.object, &def, child_id)?;
        *self.loaded_mut(child_uri)? = vec![child];
        self.maybe_recompute_label(store, &def)
    }

    // -------------------------------------------------------------------------
    // LABEL
    // -------------------------------------------------------------------------

    /// Recompute and persist the object's value from its include-in-label
    /// children: their values, space-joined, in def order. Loads flagged
    /// slots only.
    pub fn recompute_label<S: GraphStore>(&mut self, store: &mut S) -> Result<(), TopikaError> {
        let label_defs: Vec<AssocDef> = self.type_model.label_assoc_defs().cloned().collect();
        for def in &label_defs {
            self.ensure_loaded(store, def)?;
        }

        let mut parts = Vec::new();
        for def in &label_defs {
            for child in self.loaded(&def.assoc_def_uri())? {
                if let Some(value) = &child.topic.value {
                    parts.push(value.to_label());
                }
            }
        }
        let label = parts.join(" ");
        debug!(object = self.object.raw(), label = %label, "recomputing label");
        match self.object {
            PlayerId::Topic(id) => store.update_topic_value(id, Some(SimpleValue::text(label))),
            PlayerId::Assoc(id) => store.update_assoc_value(id, Some(SimpleValue::text(label))),
        }
    }

    fn maybe_recompute_label<S: GraphStore>(
        &mut self,
        store: &mut S,
        def: &AssocDef,
    ) -> Result<(), TopikaError> {
        if def.include_in_label {
            self.recompute_label(store)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // INTERNAL
    // -------------------------------------------------------------------------

    fn def(&self, child_uri: &str) -> Result<&AssocDef, TopikaError> {
        self.type_model.assoc_def(child_uri).ok_or_else(|| {
            TopikaError::ModelViolation(format!(
                "type \"{}\" has no assoc def \"{child_uri}\"",
                self.type_model.uri
            ))
        })
    }

    fn one_def(&self, child_uri: &str) -> Result<AssocDef, TopikaError> {
        self.def_of_cardinality(child_uri, Cardinality::One, "set/put_ref requires cardinality one")
    }

    fn many_def(&self, child_uri: &str) -> Result<AssocDef, TopikaError> {
        self.def_of_cardinality(child_uri, Cardinality::Many, "add/add_ref requires cardinality many")
    }

    fn def_of_cardinality(
        &self,
        child_uri: &str,
        expected: Cardinality,
        detail: &str,
    ) -> Result<AssocDef, TopikaError> {
        let def = self.def(child_uri)?;
        if def.child_cardinality != expected {
            return Err(TopikaError::CardinalityViolation {
                assoc_def_uri: child_uri.to_string(),
                cardinality: def.child_cardinality.uri().to_string(),
                detail: detail.to_string(),
            });
        }
        Ok(def.clone())
    }

    fn ensure_loaded<S: GraphStore>(
        &mut self,
        store: &S,
        def: &AssocDef,
    ) -> Result<(), TopikaError> {
        let key = def.assoc_def_uri();
        if matches!(self.slots.get(&key), Some(ChildSlot::Loaded(_))) {
            return Ok(());
        }
        let children = store.related_topics(
            self.object,
            def.instance_level_assoc_type_uri(),
            RoleType::Parent,
            RoleType::Child,
            Some(&def.child_type_uri),
        )?;
        self.slots.insert(key, ChildSlot::Loaded(children));
        Ok(())
    }

    fn loaded(&self, child_uri: &str) -> Result<&Vec<RelatedTopic>, TopikaError> {
        match self.slots.get(child_uri) {
            Some(ChildSlot::Loaded(children)) => Ok(children),
            _ => Err(TopikaError::DataInconsistency(format!(
                "child slot \"{child_uri}\" accessed while unloaded"
            ))),
        }
    }

    fn loaded_mut(&mut self, child_uri: &str) -> Result<&mut Vec<RelatedTopic>, TopikaError> {
        match self.slots.get_mut(child_uri) {
            Some(ChildSlot::Loaded(children)) => Ok(children),
            _ => Err(TopikaError::DataInconsistency(format!(
                "child slot \"{child_uri}\" accessed while unloaded"
            ))),
        }
    }
}

// ---

fn create_child<S: GraphStore>(
    store: &mut S,
    parent: PlayerId,
    def: &AssocDef,
    value: SimpleValue,
) -> Result<RelatedTopic, TopikaError> {
    let child_id = store.create_topic(None, &def.child_type_uri, Some(value.clone()))?;
    let relating_assoc = store.create_assoc(
        def.instance_level_assoc_type_uri(),
        Role::new(RoleType::Parent, parent),
        Role::new(RoleType::Child, child_id.into()),
    )?;
    Ok(RelatedTopic {
        topic: Topic::new(child_id, None, def.child_type_uri.clone(), Some(value)),
        relating_assoc,
    })
}

fn reference_child<S: GraphStore>(
    store: &mut S,
    parent: PlayerId,
    def: &AssocDef,
    child_id: TopicId,
) -> Result<RelatedTopic, TopikaError> {
    let topic = store
        .fetch_topic(child_id)?
        .ok_or(TopikaError::ObjectNotFound(child_id.0))?;
    let relating_assoc = store.create_assoc(
        def.instance_level_assoc_type_uri(),
        Role::new(RoleType::Parent, parent),
        Role::new(RoleType::Child, child_id.into()),
    )?;
    Ok(RelatedTopic {
        topic,
        relating_assoc,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssocDefKind, DataType, TypeKind};
    use crate::store::MemoryStore;

    /// Person: first/last name (card one, in label), employer (card many,
    /// aggregation, not in label).
    fn person_model() -> TypeModel {
        let mut model = TypeModel::draft(
            TypeKind::Topic,
            "test.person",
            Some(SimpleValue::text("Person")),
            DataType::Composite,
        );
        for child in ["test.first_name", "test.last_name"] {
            model.push_assoc_def(
                AssocDef::draft(
                    AssocDefKind::Composition,
                    "test.person",
                    child,
                    Cardinality::One,
                    Cardinality::One,
                )
                .with_include_in_label(),
            );
        }
        model.push_assoc_def(AssocDef::draft(
            AssocDefKind::Aggregation,
            "test.person",
            "test.employer",
            Cardinality::Many,
            Cardinality::Many,
        ));
        model
    }

    fn person_view(store: &mut MemoryStore) -> ChildTopics {
        let person = store
            .create_topic(None, "test.person", None)
            .expect("person");
        ChildTopics::new(person.into(), person_model())
    }

    #[test]
    fn has_reports_loaded_state_only() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);

        assert!(!ct.has("test.first_name"));
        ct.set(&mut store, "test.first_name", SimpleValue::text("Karl"))
            .expect("set");
        assert!(ct.has("test.first_name"));

        // a fresh view starts unloaded again; the accessor loads it
        let mut fresh = ChildTopics::new(ct.object(), person_model());
        assert!(!fresh.has("test.first_name"));
        assert_eq!(
            fresh
                .string(&store, "test.first_name")
                .expect("string"),
            Some("Karl".to_string())
        );
        assert!(fresh.has("test.first_name"));
    }

    #[test]
    fn label_joins_flagged_children_in_def_order() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);

        // written last-name-first; the label still follows def order
        ct.set(&mut store, "test.last_name", SimpleValue::text("Albrecht"))
            .expect("last");
        ct.set(&mut store, "test.first_name", SimpleValue::text("Karl"))
            .expect("first");

        let person_id = ct.object().topic_id().expect("topic");
        let person = store
            .fetch_topic(person_id)
            .expect("fetch")
            .expect("present");
        assert_eq!(person.value, Some(SimpleValue::text("Karl Albrecht")));
    }

    #[test]
    fn unflagged_write_leaves_label_untouched() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);
        ct.set(&mut store, "test.first_name", SimpleValue::text("Karl"))
            .expect("first");

        ct.add(&mut store, "test.employer", SimpleValue::text("Aldi"))
            .expect("employer");

        let person_id = ct.object().topic_id().expect("topic");
        let person = store
            .fetch_topic(person_id)
            .expect("fetch")
            .expect("present");
        assert_eq!(person.value, Some(SimpleValue::text("Karl")));
        // the name slots were not reloaded for the unflagged write
        assert!(!ct.has("test.last_name"));
    }

    #[test]
    fn set_updates_the_existing_child_in_place() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);

        ct.set(&mut store, "test.first_name", SimpleValue::text("Karl"))
            .expect("set");
        let first_id = ct
            .get_one(&store, "test.first_name")
            .expect("get")
            .expect("present")
            .topic
            .id;
        ct.set(&mut store, "test.first_name", SimpleValue::text("Theo"))
            .expect("overwrite");

        let updated = ct
            .get_one(&store, "test.first_name")
            .expect("get")
            .expect("present");
        assert_eq!(updated.topic.id, first_id);
        assert_eq!(updated.topic.value, Some(SimpleValue::text("Theo")));
    }

    #[test]
    fn cardinality_is_enforced_per_operation() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);

        let err = ct
            .add(&mut store, "test.first_name", SimpleValue::text("Karl"))
            .expect_err("add on card one");
        assert!(matches!(err, TopikaError::CardinalityViolation { .. }));

        let err = ct
            .set(&mut store, "test.employer", SimpleValue::text("Aldi"))
            .expect_err("set on card many");
        assert!(matches!(err, TopikaError::CardinalityViolation { .. }));
    }

    #[test]
    fn unknown_child_is_a_model_violation() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);

        let err = ct
            .set(&mut store, "test.shoe_size", SimpleValue::Number(44))
            .expect_err("unknown def");
        assert!(matches!(err, TopikaError::ModelViolation(_)));
    }

    #[test]
    fn add_ref_links_an_existing_topic() {
        let mut store = MemoryStore::new();
        let mut ct = person_view(&mut store);
        let aldi = store
            .create_topic(None, "test.employer", Some(SimpleValue::text("Aldi")))
            .expect("aldi");

        ct.add_ref(&mut store, "test.employer", aldi).expect("ref");

        let employers = ct.get(&store, "test.employer").expect("get");
        assert_eq!(employers.len(), 1);
        assert_eq!(employers[0].topic.id, aldi);
    }

    #[test]
    fn put_ref_replaces_the_reference_but_keeps_the_topic() {
        let mut store = MemoryStore::new();
        let person = store
            .create_topic(None, "test.person", None)
            .expect("person");
        let mut model = TypeModel::draft(
            TypeKind::Topic,
            "test.person",
            None,
            DataType::Composite,
        );
        model.push_assoc_def(AssocDef::draft(
            AssocDefKind::Aggregation,
            "test.person",
            "test.city",
            Cardinality::One,
            Cardinality::One,
        ));
        let mut ct = ChildTopics::new(person.into(), model);

        let berlin = store
            .create_topic(None, "test.city", Some(SimpleValue::text("Berlin")))
            .expect("berlin");
        let hamburg = store
            .create_topic(None, "test.city", Some(SimpleValue::text("Hamburg")))
            .expect("hamburg");

        ct.put_ref(&mut store, "test.city", berlin).expect("first");
        ct.put_ref(&mut store, "test.city", hamburg)
            .expect("replace");

        let cities = ct.get(&store, "test.city").expect("get");
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].topic.id, hamburg);
        // the old city topic survives, only its reference is gone
        assert!(store.fetch_topic(berlin).expect("fetch").is_some());
        let fresh: Vec<_> = store
            .related_topics(
                person.into(),
                crate::uris::AGGREGATION,
                RoleType::Parent,
                RoleType::Child,
                Some("test.city"),
            )
            .expect("query");
        assert_eq!(fresh.len(), 1);
    }
}
