//! Sequencer behavior against the in-memory store, including a property
//! test over arbitrary insertion programs.

use proptest::prelude::*;
use topika_core::{
    AssocId, GraphStore, MemoryStore, Role, RoleType, TopicId, TopikaError, sequence, uris,
};

/// A type topic plus `n` bare def associations to sequence.
fn setup(n: usize) -> (MemoryStore, TopicId, Vec<AssocId>) {
    let mut store = MemoryStore::new();
    let type_id = store
        .create_topic(Some("test.type"), uris::TOPIC_TYPE, None)
        .expect("type topic");
    let child = store
        .create_topic(Some("test.child"), uris::TOPIC_TYPE, None)
        .expect("child topic");
    let defs = (0..n)
        .map(|_| {
            store
                .create_assoc(
                    uris::COMPOSITION_DEF,
                    Role::new(RoleType::ParentType, type_id.into()),
                    Role::new(RoleType::ChildType, child.into()),
                )
                .expect("def")
        })
        .collect();
    (store, type_id, defs)
}

#[test]
fn insert_covers_start_middle_and_end() {
    let (mut store, type_id, defs) = setup(4);
    sequence::store(&mut store, type_id, &[defs[0], defs[1]]).expect("initial chain");

    // start
    sequence::insert(
        &mut store,
        type_id,
        defs[2],
        Some(defs[0]),
        Some(defs[0]),
        Some(defs[1]),
    )
    .expect("insert at start");
    assert_eq!(
        sequence::fetch_ids(&store, type_id).expect("fetch"),
        vec![defs[2], defs[0], defs[1]]
    );

    // middle
    sequence::insert(
        &mut store,
        type_id,
        defs[3],
        Some(defs[1]),
        Some(defs[2]),
        Some(defs[1]),
    )
    .expect("insert in middle");
    assert_eq!(
        sequence::fetch_ids(&store, type_id).expect("fetch"),
        vec![defs[2], defs[0], defs[3], defs[1]]
    );
}

#[test]
fn append_into_an_empty_sequence_creates_the_start_edge() {
    let (mut store, type_id, defs) = setup(1);

    sequence::insert(&mut store, type_id, defs[0], None, None, None).expect("first append");

    assert_eq!(
        sequence::fetch_ids(&store, type_id).expect("fetch"),
        vec![defs[0]]
    );
}

#[test]
fn rebuild_applies_an_arbitrary_new_order() {
    let (mut store, type_id, defs) = setup(4);
    sequence::store(&mut store, type_id, &defs).expect("chain");

    let shuffled = vec![defs[2], defs[0], defs[3], defs[1]];
    sequence::rebuild(&mut store, type_id, &shuffled).expect("rebuild");

    assert_eq!(
        sequence::fetch_ids(&store, type_id).expect("fetch"),
        shuffled
    );
}

#[test]
fn deliberate_corruption_is_detected_not_repaired() {
    let (mut store, type_id, defs) = setup(3);
    sequence::store(&mut store, type_id, &defs).expect("chain");

    // a second successor for the middle element makes the walk ambiguous
    store
        .create_assoc(
            uris::SEQUENCE,
            Role::new(RoleType::Predecessor, defs[1].into()),
            Role::new(RoleType::Successor, defs[0].into()),
        )
        .expect("rogue segment");

    let err = sequence::fetch_ids(&store, type_id).expect_err("ambiguous");
    assert!(matches!(err, TopikaError::DataInconsistency(_)));
}

#[test]
fn delete_leaves_an_empty_but_valid_sequence() {
    let (mut store, type_id, defs) = setup(3);
    sequence::store(&mut store, type_id, &defs).expect("chain");

    sequence::delete(&mut store, type_id).expect("delete");

    assert!(sequence::fetch_ids(&store, type_id).expect("fetch").is_empty());
    // re-chaining works on the wiped type
    sequence::store(&mut store, type_id, &defs).expect("rechain");
    assert_eq!(sequence::fetch_ids(&store, type_id).expect("fetch"), defs);
}

proptest! {
    /// Any program of (position, element) insertions yields the same order
    /// as a plain `Vec` model.
    #[test]
    fn random_insertion_programs_match_a_vec_model(positions in prop::collection::vec(0usize..=16, 1..12)) {
        let (mut store, type_id, defs) = setup(positions.len());
        let mut model: Vec<AssocId> = Vec::new();

        for (def, pos) in defs.iter().zip(&positions) {
            let pos = *pos % (model.len() + 1);
            let before = model.get(pos).copied();
            sequence::insert(
                &mut store,
                type_id,
                *def,
                before,
                model.first().copied(),
                model.last().copied(),
            )
            .expect("insert");
            model.insert(pos, *def);

            prop_assert_eq!(sequence::fetch_ids(&store, type_id).expect("fetch"), model.clone());
        }
    }
}
