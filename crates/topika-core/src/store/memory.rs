//! In-memory graph store.
//!
//! `BTreeMap` exclusively, for deterministic iteration. Volatile: dropping
//! the store drops the graph. This is the default backend for tests and for
//! callers that persist through some outer mechanism.

use crate::store::GraphStore;
use crate::types::{
    AssocId, Association, PlayerId, Role, SimpleValue, Topic, TopicId, TopikaError,
};
use std::collections::{BTreeMap, BTreeSet};

/// The in-memory graph store.
///
/// Topics and associations draw ids from one shared counter; an id names
/// either a topic or an association, never both.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Topic storage: TopicId -> Topic
    topics: BTreeMap<TopicId, Topic>,

    /// Association storage: AssocId -> Association
    assocs: BTreeMap<AssocId, Association>,

    /// URI index: topic URI -> TopicId
    uri_index: BTreeMap<String, TopicId>,

    /// Player index: raw object id -> ids of associations it plays in
    player_index: BTreeMap<u64, BTreeSet<AssocId>>,

    /// Next id to assign. Ids start at 1; 0 is never assigned.
    next_id: u64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Number of topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of associations.
    #[must_use]
    pub fn assoc_count(&self) -> usize {
        self.assocs.len()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn index_player(&mut self, player: PlayerId, assoc: AssocId) {
        self.player_index.entry(player.raw()).or_default().insert(assoc);
    }

    fn unindex_player(&mut self, player: PlayerId, assoc: AssocId) {
        if let Some(set) = self.player_index.get_mut(&player.raw()) {
            set.remove(&assoc);
            if set.is_empty() {
                self.player_index.remove(&player.raw());
            }
        }
    }
}

impl GraphStore for MemoryStore {
    fn create_topic(
        &mut self,
        uri: Option<&str>,
        type_uri: &str,
        value: Option<SimpleValue>,
    ) -> Result<TopicId, TopikaError> {
        if let Some(uri) = uri
            && self.uri_index.contains_key(uri)
        {
            return Err(TopikaError::UriNotUnique(uri.to_string()));
        }
        let id = TopicId(self.alloc_id());
        let topic = Topic::new(id, uri.map(str::to_string), type_uri, value);
        if let Some(uri) = &topic.uri {
            self.uri_index.insert(uri.clone(), id);
        }
        self.topics.insert(id, topic);
        Ok(id)
    }

    fn fetch_topic(&self, id: TopicId) -> Result<Option<Topic>, TopikaError> {
        Ok(self.topics.get(&id).cloned())
    }

    fn fetch_topic_by_uri(&self, uri: &str) -> Result<Option<Topic>, TopikaError> {
        match self.uri_index.get(uri) {
            Some(id) => self.fetch_topic(*id),
            None => Ok(None),
        }
    }

    fn update_topic_value(
        &mut self,
        id: TopicId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError> {
        let topic = self
            .topics
            .get_mut(&id)
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        topic.value = value;
        Ok(())
    }

    fn delete_topic(&mut self, id: TopicId) -> Result<(), TopikaError> {
        let topic = self
            .topics
            .remove(&id)
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        if let Some(uri) = &topic.uri {
            self.uri_index.remove(uri);
        }
        Ok(())
    }

    fn create_assoc(
        &mut self,
        type_uri: &str,
        role1: Role,
        role2: Role,
    ) -> Result<AssocId, TopikaError> {
        for role in [&role1, &role2] {
            if !self.player_exists(role.player)? {
                return Err(TopikaError::ObjectNotFound(role.player.raw()));
            }
        }
        let id = AssocId(self.alloc_id());
        self.assocs
            .insert(id, Association::new(id, type_uri, role1, role2));
        self.index_player(role1.player, id);
        self.index_player(role2.player, id);
        Ok(id)
    }

    fn fetch_assoc(&self, id: AssocId) -> Result<Option<Association>, TopikaError> {
        Ok(self.assocs.get(&id).cloned())
    }

    fn update_assoc_value(
        &mut self,
        id: AssocId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError> {
        let assoc = self
            .assocs
            .get_mut(&id)
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        assoc.value = value;
        Ok(())
    }

    fn delete_assoc(&mut self, id: AssocId) -> Result<(), TopikaError> {
        let assoc = self
            .assocs
            .remove(&id)
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        self.unindex_player(assoc.role1.player, id);
        self.unindex_player(assoc.role2.player, id);
        Ok(())
    }

    fn assocs_of_player(&self, player: PlayerId) -> Result<Vec<Association>, TopikaError> {
        let Some(ids) = self.player_index.get(&player.raw()) else {
            return Ok(Vec::new());
        };
        let mut assocs = Vec::with_capacity(ids.len());
        for id in ids {
            let assoc = self
                .assocs
                .get(id)
                .ok_or(TopikaError::ObjectNotFound(id.0))?;
            assocs.push(assoc.clone());
        }
        Ok(assocs)
    }
}

// =============================================================================
// TESTS
// =============================================================================
