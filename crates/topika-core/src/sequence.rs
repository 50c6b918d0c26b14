//! # Association-Definition Sequencer
//!
//! Maintains the strict order of a type's association definitions as a
//! linked list in the graph:
//! - one `composition` edge from the type topic (role `type`) to the first
//!   definition (role `sequence_start`)
//! - then a chain of `sequence` edges, `predecessor` -> `successor`
//!
//! The sequencer only relinks; it never checks the sequence against the
//! type's actual definitions. The count invariant is enforced by the fetch
//! engine on every load and is never silently repaired here.
//!
//! All mutation paths perform several dependent edge deletes/creates and run
//! inside one [`GraphStore::transaction`] group, so a failure mid-relink
//! rolls the whole operation back instead of leaving a torn chain.

use crate::store::GraphStore;
use crate::types::{AssocId, RelatedAssoc, Role, TopicId, TopikaError};
use crate::uris::{self, RoleType};
use std::collections::BTreeSet;
use tracing::debug;

// =============================================================================
// FETCH
// =============================================================================

/// Walk the sequence of the given type: start edge first, then successor
/// chain. Each element carries its relating edge so deletions can target it.
///
/// A cycle in the chain is reported as a data inconsistency instead of
/// looping forever.
pub fn fetch<S: GraphStore>(
    store: &S,
    type_id: TopicId,
) -> Result<Vec<RelatedAssoc>, TopikaError> {
    let mut sequence = Vec::new();
    let mut seen: BTreeSet<AssocId> = BTreeSet::new();

    let mut next = fetch_start(store, type_id)?;
    while let Some(element) = next {
        if !seen.insert(element.assoc.id) {
            return Err(TopikaError::DataInconsistency(format!(
                "sequence of type {} revisits assoc def {}",
                type_id.0, element.assoc.id.0
            )));
        }
        let id = element.assoc.id;
        sequence.push(element);
        next = fetch_successor(store, id)?;
    }
    Ok(sequence)
}

/// The ids of the sequence elements, in order.
pub fn fetch_ids<S: GraphStore>(store: &S, type_id: TopicId) -> Result<Vec<AssocId>, TopikaError> {
    Ok(fetch(store, type_id)?.into_iter().map(|e| e.assoc.id).collect())
}

fn fetch_start<S: GraphStore>(
    store: &S,
    type_id: TopicId,
) -> Result<Option<RelatedAssoc>, TopikaError> {
    store.related_assoc(
        type_id.into(),
        uris::COMPOSITION,
        RoleType::Type,
        RoleType::SequenceStart,
    )
}

fn fetch_successor<S: GraphStore>(
    store: &S,
    assoc_def_id: AssocId,
) -> Result<Option<RelatedAssoc>, TopikaError> {
    store.related_assoc(
        assoc_def_id.into(),
        uris::SEQUENCE,
        RoleType::Predecessor,
        RoleType::Successor,
    )
}

fn fetch_predecessor<S: GraphStore>(
    store: &S,
    assoc_def_id: AssocId,
) -> Result<Option<RelatedAssoc>, TopikaError> {
    store.related_assoc(
        assoc_def_id.into(),
        uris::SEQUENCE,
        RoleType::Successor,
        RoleType::Predecessor,
    )
}

// =============================================================================
// INSERT
// =============================================================================

/// Add an assoc def to the sequence. Depending on the last three arguments
/// the def is appended at the end, inserted at the start, or inserted in
/// the middle.
///
/// * `before` — the element the new def goes in front of. `None` appends at
///   the end; in that case `last` must identify the current end (`first` is
///   irrelevant).
/// * `first` — the current first element. When it equals `before` the def
///   is inserted at the start.
pub fn insert<S: GraphStore>(
    store: &mut S,
    type_id: TopicId,
    assoc_def_id: AssocId,
    before: Option<AssocId>,
    first: Option<AssocId>,
    last: Option<AssocId>,
) -> Result<(), TopikaError> {
    store.transaction(|store| match before {
        None => append(store, type_id, assoc_def_id, last),
        Some(before) if Some(before) == first => {
            insert_at_start(store, type_id, assoc_def_id, before)
        }
        Some(before) => insert_in_middle(store, assoc_def_id, before),
    })
}

fn append<S: GraphStore>(
    store: &mut S,
    type_id: TopicId,
    assoc_def_id: AssocId,
    last: Option<AssocId>,
) -> Result<(), TopikaError> {
    match last {
        None => store_start(store, type_id, assoc_def_id),
        Some(last) => store_segment(store, last, assoc_def_id),
    }
}

fn insert_at_start<S: GraphStore>(
    store: &mut S,
    type_id: TopicId,
    assoc_def_id: AssocId,
    old_first: AssocId,
) -> Result<(), TopikaError> {
    // delete sequence start
    let start = fetch_start(store, type_id)?.ok_or_else(|| {
        TopikaError::DataInconsistency(format!("type {} has no sequence start", type_id.0))
    })?;
    store.delete_assoc(start.relating_assoc)?;
    // reconnect
    store_start(store, type_id, assoc_def_id)?;
    store_segment(store, assoc_def_id, old_first)
}

fn insert_in_middle<S: GraphStore>(
    store: &mut S,
    assoc_def_id: AssocId,
    before: AssocId,
) -> Result<(), TopikaError> {
    // delete sequence segment
    let pred = fetch_predecessor(store, before)?.ok_or_else(|| {
        TopikaError::DataInconsistency(format!("assoc def {} has no predecessor", before.0))
    })?;
    store.delete_assoc(pred.relating_assoc)?;
    // reconnect
    store_segment(store, pred.assoc.id, assoc_def_id)?;
    store_segment(store, assoc_def_id, before)
}

// =============================================================================
// STORE / REBUILD / DELETE
// =============================================================================

/// Chain a fresh sequence from an ordered id list. The sequence must not
/// exist yet (use [`rebuild`] otherwise).
pub fn store<S: GraphStore>(
    store: &mut S,
    type_id: TopicId,
    ordered: &[AssocId],
) -> Result<(), TopikaError> {
    debug!(type_id = type_id.0, segments = ordered.len(), "storing sequence");
    store.transaction(|store| {
        let mut pred: Option<AssocId> = None;
        for assoc_def_id in ordered {
            append(store, type_id, *assoc_def_id, pred)?;
            pred = Some(*assoc_def_id);
        }
        Ok(())
    })
}

/// Delete the entire chain and rebuild it from the given order. O(n); types
/// are edited rarely and their definition counts are small.
pub fn rebuild<S: GraphStore>(
    store_: &mut S,
    type_id: TopicId,
    ordered: &[AssocId],
) -> Result<(), TopikaError> {
    store_.transaction(|s| {
        delete(s, type_id)?;
        store(s, type_id, ordered)
    })
}

/// Delete every edge of the type's sequence (the start edge and all
/// segments). The assoc defs themselves are untouched.
pub fn delete<S: GraphStore>(store: &mut S, type_id: TopicId) -> Result<(), TopikaError> {
    let sequence = fetch(store, type_id)?;
    debug!(
        type_id = type_id.0,
        segments = sequence.len(),
        "deleting sequence"
    );
    store.transaction(|store| {
        for element in sequence {
            store.delete_assoc(element.relating_assoc)?;
        }
        Ok(())
    })
}

// ---

fn store_start<S: GraphStore>(
    store: &mut S,
    type_id: TopicId,
    assoc_def_id: AssocId,
) -> Result<(), TopikaError> {
    store
        .create_assoc(
            uris::COMPOSITION,
            Role::new(RoleType::Type, type_id.into()),
            Role::new(RoleType::SequenceStart, assoc_def_id.into()),
        )
        .map(|_| ())
}

fn store_segment<S: GraphStore>(
    store: &mut S,
    pred: AssocId,
    succ: AssocId,
) -> Result<(), TopikaError> {
    store
        .create_assoc(
            uris::SEQUENCE,
            Role::new(RoleType::Predecessor, pred.into()),
            Role::new(RoleType::Successor, succ.into()),
        )
        .map(|_| ())
}

// =============================================================================
// TESTS
// =============================================================================
