//! # Graph Store Adapter
//!
//! The opaque storage collaborator of the type engine.
//!
//! The type engine never talks to a database directly; it goes through the
//! `GraphStore` trait. Two backends implement it:
//! - [`MemoryStore`]: `BTreeMap`-backed, deterministic, volatile
//! - [`RedbStore`]: disk-backed ACID storage on redb
//!
//! The traversal queries (`related_topics` and friends) are provided methods
//! built on the primitive `assocs_of_player`, so both backends share one
//! filtering semantics: match the association type, match the role the
//! queried object plays, then resolve the player on the other side.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::types::{
    AssocId, Association, PlayerId, RelatedAssoc, RelatedTopic, Role, SimpleValue, Topic,
    TopicId, TopikaError,
};
use crate::uris::RoleType;

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Primitive create/fetch/delete of nodes, edges and role-tagged
/// connections, plus a URI index.
///
/// Contract notes:
/// - Topics and associations share one monotonic id space.
/// - `create_topic` rejects duplicate URIs with `UriNotUnique`.
/// - `create_assoc` verifies both players exist.
/// - Deletes are primitive: no cascade. Callers delete dependent edges
///   themselves (the sequencer relies on this).
pub trait GraphStore {
    // --- Topics ---

    /// Create a topic. Returns the assigned id.
    fn create_topic(
        &mut self,
        uri: Option<&str>,
        type_uri: &str,
        value: Option<SimpleValue>,
    ) -> Result<TopicId, TopikaError>;

    /// Fetch a topic by id.
    fn fetch_topic(&self, id: TopicId) -> Result<Option<Topic>, TopikaError>;

    /// Fetch a topic by its stable URI.
    fn fetch_topic_by_uri(&self, uri: &str) -> Result<Option<Topic>, TopikaError>;

    /// Replace a topic's scalar value.
    fn update_topic_value(
        &mut self,
        id: TopicId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError>;

    /// Delete a topic. Incident associations are the caller's business.
    fn delete_topic(&mut self, id: TopicId) -> Result<(), TopikaError>;

    // --- Associations ---

    /// Create an association between two roles. Both players must exist.
    fn create_assoc(
        &mut self,
        type_uri: &str,
        role1: Role,
        role2: Role,
    ) -> Result<AssocId, TopikaError>;

    /// Fetch an association by id.
    fn fetch_assoc(&self, id: AssocId) -> Result<Option<Association>, TopikaError>;

    /// Replace an association's scalar value.
    fn update_assoc_value(
        &mut self,
        id: AssocId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError>;

    /// Delete an association.
    fn delete_assoc(&mut self, id: AssocId) -> Result<(), TopikaError>;

    /// All associations in which the given object plays a role, in id order.
    fn assocs_of_player(&self, player: PlayerId) -> Result<Vec<Association>, TopikaError>;

    // --- Transactions ---

    /// Run a group of mutations as one atomic unit.
    ///
    /// Multi-edge operations (the sequencer's relinks) go through this so a
    /// crash or error mid-group never leaves a partially-relinked chain.
    /// The redb backend turns the group into one write transaction: reads
    /// inside the closure see the pending writes, an error aborts the whole
    /// group. Backends without a transactional medium run the closure
    /// directly.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TopikaError>,
    ) -> Result<T, TopikaError>
    where
        Self: Sized,
    {
        f(self)
    }

    // --- Provided traversals ---

    /// Topics related to `player` through associations of `assoc_type`,
    /// where `player` plays `my_role` and the topic plays `others_role`.
    /// `others_type` optionally filters by the related topic's type URI.
    ///
    /// Results are in relating-association id order (creation order).
    fn related_topics(
        &self,
        player: PlayerId,
        assoc_type: &str,
        my_role: RoleType,
        others_role: RoleType,
        others_type: Option<&str>,
    ) -> Result<Vec<RelatedTopic>, TopikaError> {
        let mut related = Vec::new();
        for (other, relating_assoc) in
            matching_roles(self.assocs_of_player(player)?, player, assoc_type, my_role, others_role)
        {
            let Some(topic_id) = other.topic_id() else {
                continue;
            };
            let topic = self
                .fetch_topic(topic_id)?
                .ok_or(TopikaError::ObjectNotFound(topic_id.0))?;
            if others_type.is_none_or(|t| topic.type_uri == t) {
                related.push(RelatedTopic {
                    topic,
                    relating_assoc,
                });
            }
        }
        Ok(related)
    }

    /// Like `related_topics` but expects at most one match; two or more are
    /// a data inconsistency.
    fn related_topic(
        &self,
        player: PlayerId,
        assoc_type: &str,
        my_role: RoleType,
        others_role: RoleType,
        others_type: Option<&str>,
    ) -> Result<Option<RelatedTopic>, TopikaError> {
        let mut topics =
            self.related_topics(player, assoc_type, my_role, others_role, others_type)?;
        if topics.len() > 1 {
            return Err(TopikaError::DataInconsistency(format!(
                "object {} has {} \"{}\" relations where at most 1 is expected",
                player.raw(),
                topics.len(),
                assoc_type
            )));
        }
        Ok(topics.pop())
    }

    /// The association related to `player` through an association of
    /// `assoc_type`, where the related association plays `others_role`.
    /// At most one match is expected.
    fn related_assoc(
        &self,
        player: PlayerId,
        assoc_type: &str,
        my_role: RoleType,
        others_role: RoleType,
    ) -> Result<Option<RelatedAssoc>, TopikaError> {
        let mut related = Vec::new();
        for (other, relating_assoc) in
            matching_roles(self.assocs_of_player(player)?, player, assoc_type, my_role, others_role)
        {
            let Some(assoc_id) = other.assoc_id() else {
                continue;
            };
            let assoc = self
                .fetch_assoc(assoc_id)?
                .ok_or(TopikaError::ObjectNotFound(assoc_id.0))?;
            related.push(RelatedAssoc {
                assoc,
                relating_assoc,
            });
        }
        if related.len() > 1 {
            return Err(TopikaError::DataInconsistency(format!(
                "object {} has {} \"{}\" relations where at most 1 is expected",
                player.raw(),
                related.len(),
                assoc_type
            )));
        }
        Ok(related.pop())
    }

    /// Whether an object (topic or association) exists.
    fn player_exists(&self, player: PlayerId) -> Result<bool, TopikaError> {
        match player {
            PlayerId::Topic(id) => Ok(self.fetch_topic(id)?.is_some()),
            PlayerId::Assoc(id) => Ok(self.fetch_assoc(id)?.is_some()),
        }
    }
}

/// Filter associations down to (other player, relating assoc id) pairs where
/// the queried object plays `my_role` and the other side plays `others_role`.
///
/// Both role pairings are checked independently: in a self-loop the object
/// plays both roles and either direction may match.
fn matching_roles(
    assocs: Vec<Association>,
    player: PlayerId,
    assoc_type: &str,
    my_role: RoleType,
    others_role: RoleType,
) -> Vec<(PlayerId, AssocId)> {
    let mut matches = Vec::new();
    for assoc in assocs {
        if assoc.type_uri != assoc_type {
            continue;
        }
        for (mine, other) in [(&assoc.role1, &assoc.role2), (&assoc.role2, &assoc.role1)] {
            if mine.player == player && mine.role_type == my_role && other.role_type == others_role
            {
                matches.push((other.player, assoc.id));
            }
        }
    }
    matches
}

// =============================================================================
// TESTS
// =============================================================================
