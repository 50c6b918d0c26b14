//! # redb-backed Graph Store
//!
//! A disk-backed `GraphStore` on the redb embedded database:
//! - ACID transactions, crash safety (copy-on-write B-trees)
//! - postcard-serialized topic/association records
//! - a URI index table and a player index table for traversals
//!
//! Every mutating call runs in a write transaction. Stand-alone calls commit
//! on their own; calls inside a [`GraphStore::transaction`] group share one
//! transaction that commits or aborts as a unit, so a multi-edge operation
//! (a sequence relink) is never partially applied. Reads inside a group see
//! the group's pending writes.

use crate::store::GraphStore;
use crate::types::{
    AssocId, Association, PlayerId, Role, SimpleValue, Topic, TopicId, TopikaError,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for topics: id -> postcard-serialized Topic
const TOPICS: TableDefinition<u64, &[u8]> = TableDefinition::new("topics");

/// Table for associations: id -> postcard-serialized Association
const ASSOCS: TableDefinition<u64, &[u8]> = TableDefinition::new("assocs");

/// Table for the URI index: topic URI -> topic id
const URI_INDEX: TableDefinition<&str, u64> = TableDefinition::new("uri_index");

/// Table for the player index: (player id, assoc id) -> ()
///
/// The composite key enables a per-player range scan. Topics and
/// associations share one id space, so the raw player id is unambiguous.
const PLAYER_INDEX: TableDefinition<(u64, u64), ()> = TableDefinition::new("player_index");

/// Table for metadata: key -> u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn io(e: impl std::fmt::Display) -> TopikaError {
    TopikaError::Storage(e.to_string())
}

/// A disk-backed graph store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// The active grouped write transaction, if one is open.
    txn: Option<WriteTransaction>,
    /// Next id to assign. Mirrored in the METADATA table.
    next_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_id", &self.next_id)
            .field("in_transaction", &self.txn.is_some())
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TopikaError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(TOPICS).map_err(io)?;
            let _ = write_txn.open_table(ASSOCS).map_err(io)?;
            let _ = write_txn.open_table(URI_INDEX).map_err(io)?;
            let _ = write_txn.open_table(PLAYER_INDEX).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        let next_id = {
            let read_txn = db.begin_read().map_err(io)?;
            let table = read_txn.open_table(METADATA).map_err(io)?;
            table
                .get("next_id")
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(1)
        };

        Ok(Self {
            db,
            txn: None,
            next_id,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), TopikaError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }

    /// Run `f` against the active grouped transaction, or against a
    /// one-shot write transaction that commits on success.
    fn with_write<T>(
        &mut self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, TopikaError>,
    ) -> Result<T, TopikaError> {
        match &self.txn {
            Some(txn) => f(txn),
            None => {
                let txn = self.db.begin_write().map_err(io)?;
                let value = f(&txn)?;
                txn.commit().map_err(io)?;
                Ok(value)
            }
        }
    }
}

/// Decode a postcard record out of a topic/assoc table.
fn decode<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<T>, TopikaError> {
    match table.get(id).map_err(io)? {
        Some(bytes) => Ok(Some(postcard::from_bytes(bytes.value()).map_err(io)?)),
        None => Ok(None),
    }
}

fn lookup_uri(
    table: &impl ReadableTable<&'static str, u64>,
    uri: &str,
) -> Result<Option<u64>, TopikaError> {
    Ok(table.get(uri).map_err(io)?.map(|v| v.value()))
}

fn scan_player(
    table: &impl ReadableTable<(u64, u64), ()>,
    raw: u64,
) -> Result<Vec<u64>, TopikaError> {
    let mut ids = Vec::new();
    for entry in table.range((raw, 0)..=(raw, u64::MAX)).map_err(io)? {
        let (key, _) = entry.map_err(io)?;
        ids.push(key.value().1);
    }
    Ok(ids)
}

impl GraphStore for RedbStore {
    fn create_topic(
        &mut self,
        uri: Option<&str>,
        type_uri: &str,
        value: Option<SimpleValue>,
    ) -> Result<TopicId, TopikaError> {
        let id = TopicId(self.next_id);
        let topic = Topic::new(id, uri.map(str::to_string), type_uri, value);
        let bytes = postcard::to_allocvec(&topic).map_err(io)?;

        self.with_write(|txn| {
            let mut uri_table = txn.open_table(URI_INDEX).map_err(io)?;
            if let Some(uri) = uri {
                if uri_table.get(uri).map_err(io)?.is_some() {
                    return Err(TopikaError::UriNotUnique(uri.to_string()));
                }
                uri_table.insert(uri, id.0).map_err(io)?;
            }
            let mut topics = txn.open_table(TOPICS).map_err(io)?;
            topics.insert(id.0, bytes.as_slice()).map_err(io)?;
            let mut meta = txn.open_table(METADATA).map_err(io)?;
            meta.insert("next_id", id.0.saturating_add(1)).map_err(io)?;
            Ok(())
        })?;

        // ids handed out inside an aborted group are burned; the counter
        // only moves forward
        self.next_id = self.next_id.saturating_add(1);
        Ok(id)
    }

    fn fetch_topic(&self, id: TopicId) -> Result<Option<Topic>, TopikaError> {
        match &self.txn {
            Some(txn) => decode(&txn.open_table(TOPICS).map_err(io)?, id.0),
            None => {
                let read_txn = self.db.begin_read().map_err(io)?;
                decode(&read_txn.open_table(TOPICS).map_err(io)?, id.0)
            }
        }
    }

    fn fetch_topic_by_uri(&self, uri: &str) -> Result<Option<Topic>, TopikaError> {
        let id = match &self.txn {
            Some(txn) => lookup_uri(&txn.open_table(URI_INDEX).map_err(io)?, uri)?,
            None => {
                let read_txn = self.db.begin_read().map_err(io)?;
                lookup_uri(&read_txn.open_table(URI_INDEX).map_err(io)?, uri)?
            }
        };
        match id {
            Some(id) => self.fetch_topic(TopicId(id)),
            None => Ok(None),
        }
    }

    fn update_topic_value(
        &mut self,
        id: TopicId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError> {
        let mut topic = self
            .fetch_topic(id)?
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        topic.value = value;
        let bytes = postcard::to_allocvec(&topic).map_err(io)?;

        self.with_write(|txn| {
            let mut topics = txn.open_table(TOPICS).map_err(io)?;
            topics.insert(id.0, bytes.as_slice()).map_err(io)?;
            Ok(())
        })
    }

    fn delete_topic(&mut self, id: TopicId) -> Result<(), TopikaError> {
        let topic = self
            .fetch_topic(id)?
            .ok_or(TopikaError::ObjectNotFound(id.0))?;

        self.with_write(|txn| {
            let mut topics = txn.open_table(TOPICS).map_err(io)?;
            topics.remove(id.0).map_err(io)?;
            if let Some(uri) = &topic.uri {
                let mut uri_table = txn.open_table(URI_INDEX).map_err(io)?;
                uri_table.remove(uri.as_str()).map_err(io)?;
            }
            Ok(())
        })
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
        let id = AssocId(self.next_id);
        let assoc = Association::new(id, type_uri, role1, role2);
        let bytes = postcard::to_allocvec(&assoc).map_err(io)?;

        self.with_write(|txn| {
            let mut assocs = txn.open_table(ASSOCS).map_err(io)?;
            assocs.insert(id.0, bytes.as_slice()).map_err(io)?;
            let mut players = txn.open_table(PLAYER_INDEX).map_err(io)?;
            players.insert((role1.player.raw(), id.0), ()).map_err(io)?;
            players.insert((role2.player.raw(), id.0), ()).map_err(io)?;
            let mut meta = txn.open_table(METADATA).map_err(io)?;
            meta.insert("next_id", id.0.saturating_add(1)).map_err(io)?;
            Ok(())
        })?;

        self.next_id = self.next_id.saturating_add(1);
        Ok(id)
    }

    fn fetch_assoc(&self, id: AssocId) -> Result<Option<Association>, TopikaError> {
        match &self.txn {
            Some(txn) => decode(&txn.open_table(ASSOCS).map_err(io)?, id.0),
            None => {
                let read_txn = self.db.begin_read().map_err(io)?;
                decode(&read_txn.open_table(ASSOCS).map_err(io)?, id.0)
            }
        }
    }

    fn update_assoc_value(
        &mut self,
        id: AssocId,
        value: Option<SimpleValue>,
    ) -> Result<(), TopikaError> {
        let mut assoc = self
            .fetch_assoc(id)?
            .ok_or(TopikaError::ObjectNotFound(id.0))?;
        assoc.value = value;
        let bytes = postcard::to_allocvec(&assoc).map_err(io)?;

        self.with_write(|txn| {
            let mut assocs = txn.open_table(ASSOCS).map_err(io)?;
            assocs.insert(id.0, bytes.as_slice()).map_err(io)?;
            Ok(())
        })
    }

    fn delete_assoc(&mut self, id: AssocId) -> Result<(), TopikaError> {
        let assoc = self
            .fetch_assoc(id)?
            .ok_or(TopikaError::ObjectNotFound(id.0))?;

        self.with_write(|txn| {
            let mut assocs = txn.open_table(ASSOCS).map_err(io)?;
            assocs.remove(id.0).map_err(io)?;
            let mut players = txn.open_table(PLAYER_INDEX).map_err(io)?;
            players
                .remove((assoc.role1.player.raw(), id.0))
                .map_err(io)?;
            players
                .remove((assoc.role2.player.raw(), id.0))
                .map_err(io)?;
            Ok(())
        })
    }

    fn assocs_of_player(&self, player: PlayerId) -> Result<Vec<Association>, TopikaError> {
        let raw = player.raw();
        let ids = match &self.txn {
            Some(txn) => scan_player(&txn.open_table(PLAYER_INDEX).map_err(io)?, raw)?,
            None => {
                let read_txn = self.db.begin_read().map_err(io)?;
                scan_player(&read_txn.open_table(PLAYER_INDEX).map_err(io)?, raw)?
            }
        };
        let mut assocs = Vec::with_capacity(ids.len());
        for id in ids {
            let assoc = self
                .fetch_assoc(AssocId(id))?
                .ok_or(TopikaError::ObjectNotFound(id))?;
            assocs.push(assoc);
        }
        Ok(assocs)
    }

    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TopikaError>,
    ) -> Result<T, TopikaError> {
        if self.txn.is_some() {
            // an inner group joins the already-open transaction
            return f(self);
        }
        self.txn = Some(self.db.begin_write().map_err(io)?);
        let result = f(self);
        let txn = self
            .txn
            .take()
            .ok_or_else(|| TopikaError::Storage("write transaction vanished".to_string()))?;
        match result {
            Ok(value) => {
                txn.commit().map_err(io)?;
                Ok(value)
            }
            Err(e) => {
                // dropping an uncommitted transaction aborts it
                drop(txn);
                Err(e)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uris::{self, RoleType};
    use tempfile::NamedTempFile;

    fn open_store() -> (RedbStore, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp file");
        let store = RedbStore::open(file.path()).expect("open");
        (store, file)
    }

    #[test]
    fn topic_roundtrip() {
        let (mut store, _file) = open_store();
        let id = store
            .create_topic(Some("test.a"), "test.type", Some(SimpleValue::text("A")))
            .expect("create");

        let topic = store.fetch_topic(id).expect("fetch").expect("present");
        assert_eq!(topic.uri.as_deref(), Some("test.a"));
        assert_eq!(topic.value, Some(SimpleValue::text("A")));
    }

    #[test]
    fn ids_survive_reopen() {
        let file = NamedTempFile::new().expect("temp file");
        let first_id = {
            let mut store = RedbStore::open(file.path()).expect("open");
            store
                .create_topic(Some("test.a"), "test.type", None)
                .expect("create")
        };

        let mut store = RedbStore::open(file.path()).expect("reopen");
        let second_id = store
            .create_topic(Some("test.b"), "test.type", None)
            .expect("create");

        assert!(second_id.0 > first_id.0);
        assert!(
            store
                .fetch_topic_by_uri("test.a")
                .expect("fetch")
                .is_some()
        );
    }

    #[test]
    fn duplicate_uri_rejected_and_txn_aborted() {
        let (mut store, _file) = open_store();
        store
            .create_topic(Some("test.a"), "test.type", None)
            .expect("create");

        let err = store
            .create_topic(Some("test.a"), "test.type", None)
            .expect_err("duplicate");
        assert!(matches!(err, TopikaError::UriNotUnique(_)));
        // the aborted id must not have been burned into an object
        assert!(store.fetch_topic(TopicId(2)).expect("fetch").is_none());
    }

    #[test]
    fn player_index_range_scan() {
        let (mut store, _file) = open_store();
        let a = store.create_topic(None, "test.type", None).expect("a");
        let b = store.create_topic(None, "test.type", None).expect("b");
        let c = store.create_topic(None, "test.type", None).expect("c");
        store
            .create_assoc(
                uris::COMPOSITION,
                Role::new(RoleType::Parent, a.into()),
                Role::new(RoleType::Child, b.into()),
            )
            .expect("ab");
        store
            .create_assoc(
                uris::COMPOSITION,
                Role::new(RoleType::Parent, a.into()),
                Role::new(RoleType::Child, c.into()),
            )
            .expect("ac");

        assert_eq!(store.assocs_of_player(a.into()).expect("query").len(), 2);
        assert_eq!(store.assocs_of_player(b.into()).expect("query").len(), 1);
    }

    #[test]
    fn transaction_rolls_back_every_pending_write_on_error() {
        let (mut store, _file) = open_store();
        let a = store
            .create_topic(Some("test.a"), "test.type", None)
            .expect("a");

        let err = store
            .transaction(|s| {
                s.create_topic(Some("test.b"), "test.type", None)?;
                s.delete_topic(a)?;
                Err::<(), _>(TopikaError::Storage("forced failure".to_string()))
            })
            .expect_err("aborted");
        assert!(matches!(err, TopikaError::Storage(_)));

        // nothing of the group survives: the create is gone, the delete undone
        assert!(store.fetch_topic_by_uri("test.b").expect("fetch").is_none());
        assert!(store.fetch_topic(a).expect("fetch").is_some());
    }

    #[test]
    fn reads_inside_a_transaction_see_pending_writes() {
        let (mut store, _file) = open_store();
        store
            .transaction(|s| {
                let id = s.create_topic(Some("test.a"), "test.type", None)?;
                let pending = s.fetch_topic_by_uri("test.a")?;
                assert_eq!(pending.map(|t| t.id), Some(id));

                let b = s.create_topic(None, "test.type", None)?;
                s.create_assoc(
                    uris::COMPOSITION,
                    Role::new(RoleType::Parent, id.into()),
                    Role::new(RoleType::Child, b.into()),
                )?;
                assert_eq!(s.assocs_of_player(id.into())?.len(), 1);
                Ok(())
            })
            .expect("transaction");

        assert!(store.fetch_topic_by_uri("test.a").expect("fetch").is_some());
    }

    #[test]
    fn nested_transactions_join_the_outer_group() {
        let (mut store, _file) = open_store();

        let err = store
            .transaction(|s| {
                s.transaction(|inner| {
                    inner.create_topic(Some("test.inner"), "test.type", None)
                })?;
                Err::<(), _>(TopikaError::Storage("outer failure".to_string()))
            })
            .expect_err("outer abort");
        assert!(matches!(err, TopikaError::Storage(_)));

        // the inner group's write aborts with the outer one
        assert!(
            store
                .fetch_topic_by_uri("test.inner")
                .expect("fetch")
                .is_none()
        );
    }
}
