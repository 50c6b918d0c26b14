//! # Core URIs
//!
//! The fixed URI vocabulary of the Topika core.
//!
//! Everything the type engine stores is addressed through this small closed
//! set: meta types, the core association types, the satellite child types of
//! a type definition, and the role types.
//!
//! Role types are a closed enum rather than bare strings so traversal code
//! gets compile-time checking; each variant preserves its semantic URI as
//! the stored discriminant.

use serde::{Deserialize, Serialize};

// =============================================================================
// META TYPES
// =============================================================================

/// Type of all topic types.
pub const TOPIC_TYPE: &str = "topika.core.topic_type";
/// Type of all association types.
pub const ASSOC_TYPE: &str = "topika.core.assoc_type";
/// Type of abstract meta types.
pub const META_TYPE: &str = "topika.core.meta_type";
/// The self-typed root of the type hierarchy.
pub const META_META_TYPE: &str = "topika.core.meta_meta_type";

// =============================================================================
// CORE ASSOCIATION TYPES
// =============================================================================

/// Whole-part relationship; also the carrier of all satellite edges.
pub const COMPOSITION: &str = "topika.core.composition";
/// Loose whole-part relationship.
pub const AGGREGATION: &str = "topika.core.aggregation";
/// An association definition of composition kind.
pub const COMPOSITION_DEF: &str = "topika.core.composition_def";
/// An association definition of aggregation kind.
pub const AGGREGATION_DEF: &str = "topika.core.aggregation_def";
/// A sequence segment: predecessor assoc def -> successor assoc def.
pub const SEQUENCE: &str = "topika.core.sequence";
/// Type topic -> instance topic.
pub const INSTANTIATION: &str = "topika.core.instantiation";
/// Assoc def -> association type override.
pub const CUSTOM_ASSOC_TYPE: &str = "topika.core.custom_assoc_type";
/// Assoc def -> parent-side cardinality topic.
pub const PARENT_CARDINALITY: &str = "topika.core.parent_cardinality";
/// Assoc def -> child-side cardinality topic.
pub const CHILD_CARDINALITY: &str = "topika.core.child_cardinality";

// =============================================================================
// SATELLITE TOPIC TYPES
// =============================================================================

/// Topic type of the data type topics.
pub const DATA_TYPE: &str = "topika.core.data_type";
/// Topic type of the cardinality topics.
pub const CARDINALITY: &str = "topika.core.cardinality";
/// Boolean flag: the child contributes to the parent's label.
pub const INCLUDE_IN_LABEL: &str = "topika.core.include_in_label";
/// Boolean flag: the child identifies the parent.
pub const IDENTITY_ATTR: &str = "topika.core.identity_attr";
/// Topic type of view configuration topics.
pub const VIEW_CONFIG: &str = "topika.core.view_config";

// =============================================================================
// DATA TYPE TOPICS
// =============================================================================

pub const TEXT: &str = "topika.core.text";
pub const NUMBER: &str = "topika.core.number";
pub const BOOLEAN: &str = "topika.core.boolean";
pub const HTML: &str = "topika.core.html";
pub const COMPOSITE: &str = "topika.core.composite";
pub const REF: &str = "topika.core.ref";

// =============================================================================
// CARDINALITY TOPICS
// =============================================================================

pub const ONE: &str = "topika.core.one";
pub const MANY: &str = "topika.core.many";

// =============================================================================
// ROLE TYPES
// =============================================================================

/// The closed set of role types used by the core.
///
/// Custom association types at the instance level reuse `Parent`/`Child`;
/// only association *types* are an open set, role types are not.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RoleType {
    /// Unspecific player (e.g. the data type topic of a type).
    Default,
    /// A type topic playing the "type" part.
    Type,
    /// An instance playing against its type.
    Instance,
    /// Parent side of a whole-part edge.
    Parent,
    /// Child side of a whole-part edge.
    Child,
    /// Parent type inside an association definition.
    ParentType,
    /// Child type inside an association definition.
    ChildType,
    /// First assoc def of a type's sequence.
    SequenceStart,
    /// Predecessor in a sequence segment.
    Predecessor,
    /// Successor in a sequence segment.
    Successor,
}

impl RoleType {
    /// The semantic URI of this role type, stable across releases.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Default => "topika.core.default",
            Self::Type => "topika.core.type",
            Self::Instance => "topika.core.instance",
            Self::Parent => "topika.core.parent",
            Self::Child => "topika.core.child",
            Self::ParentType => "topika.core.parent_type",
            Self::ChildType => "topika.core.child_type",
            Self::SequenceStart => "topika.core.sequence_start",
            Self::Predecessor => "topika.core.predecessor",
            Self::Successor => "topika.core.successor",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_type_uris_are_namespaced() {
        for role in [
            RoleType::Default,
            RoleType::Type,
            RoleType::Instance,
            RoleType::Parent,
            RoleType::Child,
            RoleType::ParentType,
            RoleType::ChildType,
            RoleType::SequenceStart,
            RoleType::Predecessor,
            RoleType::Successor,
        ] {
            assert!(role.uri().starts_with("topika.core."));
        }
    }

    #[test]
    fn role_type_uris_are_distinct() {
        assert_ne!(RoleType::Parent.uri(), RoleType::ParentType.uri());
        assert_ne!(RoleType::Child.uri(), RoleType::ChildType.uri());
    }
}
