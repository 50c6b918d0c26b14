//! # Core Type Definitions
//!
//! This module contains the building blocks of the Topika semantic graph:
//! - Object identifiers (`TopicId`, `AssocId`, `PlayerId`)
//! - Graph objects (`Topic`, `Association`, `Role`)
//! - Scalar values (`SimpleValue`)
//! - Error types (`TopikaError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where used as map keys (`BTreeMap`/`BTreeSet` only)
//! - Carry integral numbers only (no floating-point)

use crate::uris::RoleType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// OBJECT IDENTIFIERS
// =============================================================================

/// Unique identifier for a topic.
///
/// Topics and associations share one id space: an id identifies either a
/// topic or an association, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicId(pub u64);

/// Unique identifier for an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssocId(pub u64);

/// A role player: either a topic or another association.
///
/// Associations connecting to associations is what makes meta-level
/// definitions possible (an association definition is itself an association,
/// and sequence segments connect association to association).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerId {
    /// The player is a topic.
    Topic(TopicId),
    /// The player is an association.
    Assoc(AssocId),
}

impl PlayerId {
    /// The raw id value, regardless of player kind.
    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::Topic(TopicId(id)) | Self::Assoc(AssocId(id)) => id,
        }
    }

    /// The topic id, if this player is a topic.
    #[must_use]
    pub const fn topic_id(self) -> Option<TopicId> {
        match self {
            Self::Topic(id) => Some(id),
            Self::Assoc(_) => None,
        }
    }

    /// The association id, if this player is an association.
    #[must_use]
    pub const fn assoc_id(self) -> Option<AssocId> {
        match self {
            Self::Topic(_) => None,
            Self::Assoc(id) => Some(id),
        }
    }
}

impl From<TopicId> for PlayerId {
    fn from(id: TopicId) -> Self {
        Self::Topic(id)
    }
}

impl From<AssocId> for PlayerId {
    fn from(id: AssocId) -> Self {
        Self::Assoc(id)
    }
}

// =============================================================================
// SIMPLE VALUE
// =============================================================================

/// The scalar value of a topic or association.
///
/// Numbers are integral. The `html` data type stores its markup as `Text`;
/// the distinction lives in the type model, not in the value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SimpleValue {
    Text(String),
    Number(i64),
    Boolean(bool),
}

impl SimpleValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The value as a string slice, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a boolean, if it is one.
    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Render the value for label computation.
    #[must_use]
    pub fn to_label(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

// =============================================================================
// TOPIC
// =============================================================================

/// A topic: a graph node with identity, type, optional stable URI and
/// optional scalar value.
///
/// Composite (nested) values are not part of this model; they are navigated
/// on demand through the `child_topics` module, driven by the topic's type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// The internal object id.
    pub id: TopicId,
    /// Optional stable URI. Type topics always have one.
    pub uri: Option<String>,
    /// URI of this topic's type (itself a topic URI).
    pub type_uri: String,
    /// Optional scalar value.
    pub value: Option<SimpleValue>,
}

impl Topic {
    /// Create a new topic model.
    #[must_use]
    pub fn new(
        id: TopicId,
        uri: Option<String>,
        type_uri: impl Into<String>,
        value: Option<SimpleValue>,
    ) -> Self {
        Self {
            id,
            uri,
            type_uri: type_uri.into(),
            value,
        }
    }

    /// The topic's URI, or an error naming the topic when it has none.
    ///
    /// Type topics must have a URI; a missing one is a data inconsistency.
    pub fn require_uri(&self) -> Result<&str, TopikaError> {
        self.uri.as_deref().ok_or_else(|| {
            TopikaError::DataInconsistency(format!("topic {} has no URI", self.id.0))
        })
    }
}

// =============================================================================
// ROLE & ASSOCIATION
// =============================================================================

/// A role inside an association: a role type plus the player filling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Which part the player plays (parent, child, predecessor, ...).
    pub role_type: RoleType,
    /// The topic or association playing the role.
    pub player: PlayerId,
}

impl Role {
    /// Create a new role.
    #[must_use]
    pub const fn new(role_type: RoleType, player: PlayerId) -> Self {
        Self { role_type, player }
    }
}

/// An association: a typed connection between exactly two roles.
///
/// Like a topic, an association has a type URI and an optional scalar value.
/// The two-role invariant is structural: there are exactly two role fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// The internal object id.
    pub id: AssocId,
    /// URI of this association's type. Open set: custom association types
    /// carry user-defined URIs.
    pub type_uri: String,
    /// Optional scalar value.
    pub value: Option<SimpleValue>,
    /// First role.
    pub role1: Role,
    /// Second role.
    pub role2: Role,
}

impl Association {
    /// Create a new association model.
    #[must_use]
    pub fn new(id: AssocId, type_uri: impl Into<String>, role1: Role, role2: Role) -> Self {
        Self {
            id,
            type_uri: type_uri.into(),
            value: None,
            role1,
            role2,
        }
    }

    /// The role of the given role type, if present.
    #[must_use]
    pub fn role(&self, role_type: RoleType) -> Option<&Role> {
        if self.role1.role_type == role_type {
            Some(&self.role1)
        } else if self.role2.role_type == role_type {
            Some(&self.role2)
        } else {
            None
        }
    }

    /// The player of the given role type, if present.
    #[must_use]
    pub fn player(&self, role_type: RoleType) -> Option<PlayerId> {
        self.role(role_type).map(|r| r.player)
    }

    /// The player of the given role type, or a data-inconsistency error
    /// naming the association.
    pub fn require_player(&self, role_type: RoleType) -> Result<PlayerId, TopikaError> {
        self.player(role_type).ok_or_else(|| {
            TopikaError::DataInconsistency(format!(
                "role \"{}\" is missing in association {}",
                role_type.uri(),
                self.id.0
            ))
        })
    }

    /// The role opposite to the given player.
    #[must_use]
    pub fn other_role(&self, player: PlayerId) -> Option<&Role> {
        if self.role1.player == player {
            Some(&self.role2)
        } else if self.role2.player == player {
            Some(&self.role1)
        } else {
            None
        }
    }
}

/// A topic together with the association that relates it to the queried
/// object. Traversal queries return this pair because callers regularly need
/// both ends (e.g. an association definition is the relating association of
/// a child type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTopic {
    pub topic: Topic,
    pub relating_assoc: AssocId,
}

/// An association together with its relating association.
///
/// Used by the sequence walker: the sequence-start edge relates a type topic
/// to the first association definition, which is itself an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedAssoc {
    pub assoc: Association,
    pub relating_assoc: AssocId,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the Topika core.
///
/// - No silent repairs: data inconsistencies surface, always
/// - Internal failures are wrapped with operation context (`Context`) and
///   re-raised; the innermost semantic message stays reachable via `source()`
#[derive(Debug, Error)]
pub enum TopikaError {
    /// The requested type URI is absent from the store.
    #[error("type \"{0}\" not found")]
    TypeNotFound(String),

    /// A URI resolves to a topic of the wrong meta type.
    #[error("URI \"{uri}\" refers to a \"{actual}\" when the caller expects a \"{expected}\"")]
    TypeMismatch {
        uri: String,
        actual: String,
        expected: String,
    },

    /// Required satellite data is missing, or the sequence and the
    /// association definitions disagree. Never silently repaired.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// A type URI was re-entered during its own load.
    #[error("endless recursion detected while loading type \"{0}\"")]
    EndlessRecursion(String),

    /// A create/update would violate URI uniqueness.
    #[error("URI \"{0}\" is not unique")]
    UriNotUnique(String),

    /// A type was removed from the cache that was not in it. Removal is an
    /// exactly-once contract.
    #[error("type \"{0}\" not found in type cache")]
    TypeCacheInconsistency(String),

    /// A caller-supplied model does not fit the type definition it is used
    /// against (unknown assoc def, wrong kind). A validation failure, not a
    /// storage bug.
    #[error("model violation: {0}")]
    ModelViolation(String),

    /// A write violated the cardinality of an association definition.
    #[error("cardinality \"{cardinality}\" of assoc def \"{assoc_def_uri}\" violated: {detail}")]
    CardinalityViolation {
        assoc_def_uri: String,
        cardinality: String,
        detail: String,
    },

    /// The referenced object does not exist in the store.
    #[error("object {0} not found in store")]
    ObjectNotFound(u64),

    /// A storage backend failure (I/O, serialization).
    #[error("storage error: {0}")]
    Storage(String),

    /// An inner error wrapped with the operation that was in progress.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<TopikaError>,
    },
}

impl TopikaError {
    /// Wrap this error with operation context.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost semantic error of a context chain.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension for wrapping fallible operations with context, implementing the
/// wrap-and-rethrow propagation policy.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the given operation context.
    fn with_context(self, f: impl FnOnce() -> String) -> Result<T, TopikaError>;
}

impl<T> ResultExt<T> for Result<T, TopikaError> {
    fn with_context(self, f: impl FnOnce() -> String) -> Result<T, TopikaError> {
        self.map_err(|e| e.context(f()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
