//! # topika-core
//!
//! The self-describing semantic-graph type engine for Topika - THE MODEL.
//!
//! This crate implements the CORE substrate: topics and n-ary-style typed
//! associations whose type definitions live in the very same graph. A type
//! is an ordinary topic; its data type, ordered association definitions,
//! cardinalities and view configuration are ordinary topics and
//! associations hanging off it.
//!
//! ## Architectural Constraints
//!
//! - The type cache is a derived projection of the store; it can always be
//!   rebuilt and is never time-expired
//! - Data inconsistencies surface as errors, never as silent repairs
//! - Storage is reached exclusively through the [`GraphStore`] trait
//! - No async, no network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod child_topics;
pub mod model;
pub mod sequence;
pub mod service;
pub mod store;
pub mod types;
pub mod typestorage;
pub mod uris;
pub mod viewconfig;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AssocId, Association, PlayerId, RelatedAssoc, RelatedTopic, ResultExt, Role, SimpleValue,
    Topic, TopicId, TopikaError,
};
pub use uris::RoleType;

// =============================================================================
// RE-EXPORTS: Type Engine
// =============================================================================

pub use cache::{RecursionGuard, TypeCache};
pub use child_topics::{ChildSlot, ChildTopics};
pub use model::{AssocDef, AssocDefKind, Cardinality, DataType, TypeKind, TypeModel};
pub use service::CoreService;
pub use typestorage::TypeStorage;
pub use viewconfig::{ConfigTopic, Configurable, ViewConfig};

// =============================================================================
// RE-EXPORTS: Storage Backends
// =============================================================================

pub use store::{GraphStore, MemoryStore, RedbStore};
