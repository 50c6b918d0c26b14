//! # Type Models
//!
//! The in-memory, fully-resolved description of a topic type or association
//! type: data type, ordered association definitions, view configuration.
//!
//! One flat `TypeModel` parameterized by [`TypeKind`] covers both topic
//! types and association types; the two differ only in which meta types
//! their generic topic may carry and in how instances are created.

use crate::types::{AssocId, SimpleValue, TopicId, TopikaError};
use crate::uris;
use crate::viewconfig::ViewConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// DATA TYPE
// =============================================================================

/// The data type of a type: what kind of value its instances carry.
///
/// `Composite` means instances have structure (child topics) instead of a
/// scalar value of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Html,
    Composite,
    Ref,
}

impl DataType {
    /// The URI of the corresponding data type topic.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Text => uris::TEXT,
            Self::Number => uris::NUMBER,
            Self::Boolean => uris::BOOLEAN,
            Self::Html => uris::HTML,
            Self::Composite => uris::COMPOSITE,
            Self::Ref => uris::REF,
        }
    }

    /// Resolve a data type topic URI.
    pub fn from_uri(uri: &str) -> Result<Self, TopikaError> {
        match uri {
            uris::TEXT => Ok(Self::Text),
            uris::NUMBER => Ok(Self::Number),
            uris::BOOLEAN => Ok(Self::Boolean),
            uris::HTML => Ok(Self::Html),
            uris::COMPOSITE => Ok(Self::Composite),
            uris::REF => Ok(Self::Ref),
            other => Err(TopikaError::DataInconsistency(format!(
                "unexpected data type URI: \"{other}\""
            ))),
        }
    }
}

// =============================================================================
// CARDINALITY
// =============================================================================

/// Whether a structural relationship permits multiple child instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// The URI of the corresponding cardinality topic.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::One => uris::ONE,
            Self::Many => uris::MANY,
        }
    }

    /// Resolve a cardinality topic URI.
    pub fn from_uri(uri: &str) -> Result<Self, TopikaError> {
        match uri {
            uris::ONE => Ok(Self::One),
            uris::MANY => Ok(Self::Many),
            other => Err(TopikaError::DataInconsistency(format!(
                "unexpected cardinality URI: \"{other}\""
            ))),
        }
    }
}

// =============================================================================
// TYPE KIND
// =============================================================================

/// Topic type or association type. Same model shape, different
/// instantiation and different admissible meta types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Topic,
    Assoc,
}

impl TypeKind {
    /// Human-readable name, used in error context.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Topic => "topic type",
            Self::Assoc => "association type",
        }
    }

    /// The meta type a freshly created type topic of this kind gets.
    #[must_use]
    pub const fn meta_type_uri(self) -> &'static str {
        match self {
            Self::Topic => uris::TOPIC_TYPE,
            Self::Assoc => uris::ASSOC_TYPE,
        }
    }

    /// Check that a type topic carries an admissible meta type.
    ///
    /// Topic types may be typed `topic_type`, `meta_type` or
    /// `meta_meta_type`; association types must be typed `assoc_type`.
    pub fn check_meta_type(self, uri: &str, actual_type_uri: &str) -> Result<(), TopikaError> {
        let ok = match self {
            Self::Topic => matches!(
                actual_type_uri,
                uris::TOPIC_TYPE | uris::META_TYPE | uris::META_META_TYPE
            ),
            Self::Assoc => actual_type_uri == uris::ASSOC_TYPE,
        };
        if ok {
            Ok(())
        } else {
            Err(TopikaError::TypeMismatch {
                uri: uri.to_string(),
                actual: actual_type_uri.to_string(),
                expected: self.meta_type_uri().to_string(),
            })
        }
    }
}

// =============================================================================
// ASSOCIATION DEFINITION
// =============================================================================

/// Composition or aggregation: the two flavors of association definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssocDefKind {
    Composition,
    Aggregation,
}

impl AssocDefKind {
    /// The association type of the definition itself.
    #[must_use]
    pub const fn def_type_uri(self) -> &'static str {
        match self {
            Self::Composition => uris::COMPOSITION_DEF,
            Self::Aggregation => uris::AGGREGATION_DEF,
        }
    }

    /// The default association type used when instantiating this
    /// relationship at the instance level.
    #[must_use]
    pub const fn default_instance_type_uri(self) -> &'static str {
        match self {
            Self::Composition => uris::COMPOSITION,
            Self::Aggregation => uris::AGGREGATION,
        }
    }

    /// Resolve a definition association's type URI.
    pub fn from_def_type_uri(uri: &str) -> Result<Self, TopikaError> {
        match uri {
            uris::COMPOSITION_DEF => Ok(Self::Composition),
            uris::AGGREGATION_DEF => Ok(Self::Aggregation),
            other => Err(TopikaError::DataInconsistency(format!(
                "unexpected association definition type URI: \"{other}\""
            ))),
        }
    }
}

/// A parent-type -> child-type structural relationship.
///
/// Stored in the graph as an association of type `composition_def` or
/// `aggregation_def` plus satellite edges (cardinalities, flags, custom
/// association type, view configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssocDef {
    /// Id of the underlying association. `AssocId(0)` on a draft that has
    /// not been stored yet; the store engine assigns the real id.
    pub id: AssocId,
    pub kind: AssocDefKind,
    pub parent_type_uri: String,
    pub child_type_uri: String,
    pub parent_cardinality: Cardinality,
    pub child_cardinality: Cardinality,
    /// Overrides the association type used at the instance level.
    pub custom_assoc_type_uri: Option<String>,
    /// Whether instance values of this child contribute to the parent's
    /// computed label.
    pub include_in_label: bool,
    /// Whether this child identifies the parent.
    pub identity_attr: bool,
    pub view_config: ViewConfig,
}

impl AssocDef {
    /// Create a draft definition, to be persisted by the store engine.
    #[must_use]
    pub fn draft(
        kind: AssocDefKind,
        parent_type_uri: impl Into<String>,
        child_type_uri: impl Into<String>,
        parent_cardinality: Cardinality,
        child_cardinality: Cardinality,
    ) -> Self {
        Self {
            id: AssocId(0),
            kind,
            parent_type_uri: parent_type_uri.into(),
            child_type_uri: child_type_uri.into(),
            parent_cardinality,
            child_cardinality,
            custom_assoc_type_uri: None,
            include_in_label: false,
            identity_attr: false,
            view_config: ViewConfig::new(),
        }
    }

    /// Set a custom instance-level association type.
    #[must_use]
    pub fn with_custom_assoc_type(mut self, assoc_type_uri: impl Into<String>) -> Self {
        self.custom_assoc_type_uri = Some(assoc_type_uri.into());
        self
    }

    /// Mark this child as contributing to the parent's label.
    #[must_use]
    pub const fn with_include_in_label(mut self) -> Self {
        self.include_in_label = true;
        self
    }

    /// Mark this child as an identity attribute.
    #[must_use]
    pub const fn with_identity_attr(mut self) -> Self {
        self.identity_attr = true;
        self
    }

    /// The definition's identifier within its parent type: the child type
    /// URI, suffixed with the custom association type when one is set.
    /// Two definitions of one type may share a child type as long as their
    /// custom association types differ.
    #[must_use]
    pub fn assoc_def_uri(&self) -> String {
        match &self.custom_assoc_type_uri {
            Some(custom) => format!("{}#{custom}", self.child_type_uri),
            None => self.child_type_uri.clone(),
        }
    }

    /// The association type used when instantiating this relationship:
    /// the custom type if set, else the kind's default.
    #[must_use]
    pub fn instance_level_assoc_type_uri(&self) -> &str {
        self.custom_assoc_type_uri
            .as_deref()
            .unwrap_or_else(|| self.kind.default_instance_type_uri())
    }
}

// =============================================================================
// TYPE MODEL
// =============================================================================

/// The fully-resolved in-memory model of a topic type or association type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeModel {
    pub kind: TypeKind,
    /// Id of the generic type topic. `TopicId(0)` on an unstored draft.
    pub id: TopicId,
    pub uri: String,
    /// Display name of the type.
    pub value: Option<SimpleValue>,
    pub data_type: DataType,
    /// Ordered: position mirrors the stored sequence.
    assoc_defs: Vec<AssocDef>,
    pub view_config: ViewConfig,
}

impl TypeModel {
    /// Create a draft type model, to be persisted via the store engine.
    #[must_use]
    pub fn draft(
        kind: TypeKind,
        uri: impl Into<String>,
        value: Option<SimpleValue>,
        data_type: DataType,
    ) -> Self {
        Self {
            kind,
            id: TopicId(0),
            uri: uri.into(),
            value,
            data_type,
            assoc_defs: Vec::new(),
            view_config: ViewConfig::new(),
        }
    }

    /// Assemble a model from resolved parts (fetch path).
    #[must_use]
    pub fn from_parts(
        kind: TypeKind,
        id: TopicId,
        uri: impl Into<String>,
        value: Option<SimpleValue>,
        data_type: DataType,
        assoc_defs: Vec<AssocDef>,
        view_config: ViewConfig,
    ) -> Self {
        Self {
            kind,
            id,
            uri: uri.into(),
            value,
            data_type,
            assoc_defs,
            view_config,
        }
    }

    /// The ordered association definitions.
    #[must_use]
    pub fn assoc_defs(&self) -> &[AssocDef] {
        &self.assoc_defs
    }

    /// Mutable access for the store engine (id assignment, view configs).
    pub(crate) fn assoc_defs_mut(&mut self) -> &mut [AssocDef] {
        &mut self.assoc_defs
    }

    /// The definition with the given assoc def URI.
    #[must_use]
    pub fn assoc_def(&self, assoc_def_uri: &str) -> Option<&AssocDef> {
        self.assoc_defs
            .iter()
            .find(|d| d.assoc_def_uri() == assoc_def_uri)
    }

    /// Position of the definition with the given assoc def URI.
    #[must_use]
    pub fn assoc_def_index(&self, assoc_def_uri: &str) -> Option<usize> {
        self.assoc_defs
            .iter()
            .position(|d| d.assoc_def_uri() == assoc_def_uri)
    }

    /// Append a definition (draft assembly or post-store cache refresh).
    pub fn push_assoc_def(&mut self, assoc_def: AssocDef) {
        self.assoc_defs.push(assoc_def);
    }

    /// Insert a definition before the named one.
    pub fn insert_assoc_def_before(
        &mut self,
        assoc_def: AssocDef,
        before_assoc_def_uri: &str,
    ) -> Result<(), TopikaError> {
        let index = self.assoc_def_index(before_assoc_def_uri).ok_or_else(|| {
            TopikaError::ModelViolation(format!(
                "type \"{}\" has no assoc def \"{before_assoc_def_uri}\"",
                self.uri
            ))
        })?;
        self.assoc_defs.insert(index, assoc_def);
        Ok(())
    }

    /// The definitions flagged include-in-label, in sequence order.
    pub fn label_assoc_defs(&self) -> impl Iterator<Item = &AssocDef> {
        self.assoc_defs.iter().filter(|d| d.include_in_label)
    }
}

// =============================================================================
// TESTS
// =============================================================================
