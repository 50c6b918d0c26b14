//! # View Configuration
//!
//! Presentation hints attached to a type or to an association definition:
//! a set of config topics, keyed by their type URI, each carrying flat
//! settings (setting type URI -> scalar value).
//!
//! The core stores and resolves view configs but never interprets them;
//! the keys and values are opaque to the engine. A type carries at most one
//! config topic per config type.
//!
//! Graph encoding: a config topic hangs off its owner (type topic or assoc
//! def) via a `composition` edge, parent -> child; each setting is a child
//! topic of the config topic, linked the same way.

use crate::store::GraphStore;
use crate::types::{AssocId, PlayerId, Role, SimpleValue, TopicId, TopikaError};
use crate::uris::{self, RoleType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// MODEL
// =============================================================================

/// One config topic: its type plus its flat settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTopic {
    /// Id of the config topic. `TopicId(0)` on an unstored draft.
    pub id: TopicId,
    /// The config topic's type URI; also its key within the view config.
    pub type_uri: String,
    /// Setting type URI -> value. Settings load eagerly with the config.
    settings: BTreeMap<String, SimpleValue>,
}

impl ConfigTopic {
    /// Create a draft config topic.
    #[must_use]
    pub fn draft(type_uri: impl Into<String>) -> Self {
        Self {
            id: TopicId(0),
            type_uri: type_uri.into(),
            settings: BTreeMap::new(),
        }
    }

    /// Add a setting (builder style).
    #[must_use]
    pub fn with_setting(mut self, setting_uri: impl Into<String>, value: SimpleValue) -> Self {
        self.settings.insert(setting_uri.into(), value);
        self
    }

    /// The value of a setting, if present.
    #[must_use]
    pub fn setting(&self, setting_uri: &str) -> Option<&SimpleValue> {
        self.settings.get(setting_uri)
    }

    /// All settings, ordered by setting URI.
    pub fn settings(&self) -> impl Iterator<Item = (&str, &SimpleValue)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn put_setting(&mut self, setting_uri: impl Into<String>, value: SimpleValue) {
        self.settings.insert(setting_uri.into(), value);
    }
}

/// The view configuration of a type or association definition.
///
/// Never absent: a type without configuration carries an empty `ViewConfig`,
/// so lookups need no null checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    config_topics: Vec<ConfigTopic>,
}

impl ViewConfig {
    /// Create an empty view configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no config topics are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.config_topics.is_empty()
    }

    /// All config topics, in attachment order.
    #[must_use]
    pub fn config_topics(&self) -> &[ConfigTopic] {
        &self.config_topics
    }

    /// The config topic of the given config type, if present.
    #[must_use]
    pub fn config_topic(&self, config_type_uri: &str) -> Option<&ConfigTopic> {
        self.config_topics
            .iter()
            .find(|c| c.type_uri == config_type_uri)
    }

    fn config_topic_mut(&mut self, config_type_uri: &str) -> Option<&mut ConfigTopic> {
        self.config_topics
            .iter_mut()
            .find(|c| c.type_uri == config_type_uri)
    }

    /// Attach a config topic. At most one per config type; a second topic of
    /// an already-present type is a model violation.
    pub fn add_config_topic(&mut self, config_topic: ConfigTopic) -> Result<(), TopikaError> {
        if self.config_topic(&config_topic.type_uri).is_some() {
            return Err(TopikaError::ModelViolation(format!(
                "view config already has a \"{}\" config topic",
                config_topic.type_uri
            )));
        }
        self.config_topics.push(config_topic);
        Ok(())
    }

    /// Shorthand for a single setting lookup.
    #[must_use]
    pub fn setting(&self, config_type_uri: &str, setting_uri: &str) -> Option<&SimpleValue> {
        self.config_topic(config_type_uri)?.setting(setting_uri)
    }
}

// =============================================================================
// OWNER
// =============================================================================

/// What a view config hangs off: a type topic or an assoc def association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Configurable {
    Type(TopicId),
    AssocDef(AssocId),
}

impl Configurable {
    /// The owner as a role player.
    #[must_use]
    pub const fn player(self) -> PlayerId {
        match self {
            Self::Type(id) => PlayerId::Topic(id),
            Self::AssocDef(id) => PlayerId::Assoc(id),
        }
    }
}

// =============================================================================
// FETCH
// =============================================================================

/// Resolve the view config of a type topic. Every composition child of a
/// type topic is a config topic (instance children never hang off the
/// generic type topic).
pub fn fetch_of_type<S: GraphStore>(store: &S, type_id: TopicId) -> Result<ViewConfig, TopikaError> {
    fetch(store, Configurable::Type(type_id), |_| true)
}

/// Resolve the view config of an assoc def. The def's flag children
/// (include-in-label, identity-attribute) share the same edge shape and are
/// skipped here; the fetch engine reads them separately.
pub fn fetch_of_assoc_def<S: GraphStore>(
    store: &S,
    assoc_def_id: AssocId,
) -> Result<ViewConfig, TopikaError> {
    fetch(store, Configurable::AssocDef(assoc_def_id), |type_uri| {
        !matches!(type_uri, uris::INCLUDE_IN_LABEL | uris::IDENTITY_ATTR)
    })
}

fn fetch<S: GraphStore>(
    store: &S,
    owner: Configurable,
    is_config_topic: impl Fn(&str) -> bool,
) -> Result<ViewConfig, TopikaError> {
    let mut view_config = ViewConfig::new();
    let children = store.related_topics(
        owner.player(),
        uris::COMPOSITION,
        RoleType::Parent,
        RoleType::Child,
        None,
    )?;
    for child in children {
        if !is_config_topic(&child.topic.type_uri) {
            continue;
        }
        let mut config_topic = ConfigTopic::draft(&child.topic.type_uri);
        config_topic.id = child.topic.id;
        for setting in store.related_topics(
            child.topic.id.into(),
            uris::COMPOSITION,
            RoleType::Parent,
            RoleType::Child,
            None,
        )? {
            if let Some(value) = setting.topic.value {
                config_topic.put_setting(setting.topic.type_uri, value);
            }
        }
        view_config.add_config_topic(config_topic)?;
    }
    Ok(view_config)
}

// =============================================================================
// STORE
// =============================================================================

/// Persist every config topic of a draft view config and return the stored
/// form (real topic ids).
pub fn store<S: GraphStore>(
    store_: &mut S,
    owner: Configurable,
    view_config: &ViewConfig,
) -> Result<ViewConfig, TopikaError> {
    let mut stored = ViewConfig::new();
    for config_topic in view_config.config_topics() {
        stored.add_config_topic(store_config_topic(store_, owner, config_topic)?)?;
    }
    Ok(stored)
}

/// Update a single setting of the owner's view config, both in the graph and
/// in the given in-memory config.
///
/// Creates the config topic if the config type is not attached yet, and
/// creates or overwrites the setting topic. This is how type definitions get
/// configured incrementally.
pub fn add_setting<S: GraphStore>(
    store: &mut S,
    owner: Configurable,
    view_config: &mut ViewConfig,
    config_type_uri: &str,
    setting_uri: &str,
    value: SimpleValue,
) -> Result<(), TopikaError> {
    if view_config.config_topic(config_type_uri).is_none() {
        let config_topic =
            store_config_topic(store, owner, &ConfigTopic::draft(config_type_uri))?;
        view_config.add_config_topic(config_topic)?;
    }
    let config_topic = view_config
        .config_topic_mut(config_type_uri)
        .ok_or_else(|| TopikaError::TypeCacheInconsistency(config_type_uri.to_string()))?;

    // overwrite the existing setting topic, else attach a fresh one
    let existing = store.related_topic(
        config_topic.id.into(),
        uris::COMPOSITION,
        RoleType::Parent,
        RoleType::Child,
        Some(setting_uri),
    )?;
    match existing {
        Some(setting) => store.update_topic_value(setting.topic.id, Some(value.clone()))?,
        None => {
            store_child(store, config_topic.id.into(), setting_uri, value.clone())?;
        }
    }
    config_topic.put_setting(setting_uri, value);
    Ok(())
}

fn store_config_topic<S: GraphStore>(
    store: &mut S,
    owner: Configurable,
    config_topic: &ConfigTopic,
) -> Result<ConfigTopic, TopikaError> {
    let id = store_child(store, owner.player(), &config_topic.type_uri, None)?;
    let mut stored = ConfigTopic::draft(&config_topic.type_uri);
    stored.id = id;
    for (setting_uri, value) in config_topic.settings() {
        store_child(store, id.into(), setting_uri, value.clone())?;
        stored.put_setting(setting_uri, value.clone());
    }
    Ok(stored)
}

fn store_child<S: GraphStore>(
    store: &mut S,
    parent: PlayerId,
    type_uri: &str,
    value: impl Into<Option<SimpleValue>>,
) -> Result<TopicId, TopikaError> {
    let id = store.create_topic(None, type_uri, value.into())?;
    store.create_assoc(
        uris::COMPOSITION,
        Role::new(RoleType::Parent, parent),
        Role::new(RoleType::Child, id.into()),
    )?;
    Ok(id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const WIDGET_CONFIG: &str = "test.widget_config";
    const ICON: &str = "test.icon";
    const COLOR: &str = "test.color";

    fn type_topic(store: &mut MemoryStore) -> TopicId {
        store
            .create_topic(Some("test.person"), uris::TOPIC_TYPE, None)
            .expect("type topic")
    }

    #[test]
    fn empty_view_config_needs_no_null_checks() {
        let vc = ViewConfig::new();
        assert!(vc.is_empty());
        assert!(vc.setting(WIDGET_CONFIG, ICON).is_none());
    }

    #[test]
    fn duplicate_config_type_is_rejected() {
        let mut vc = ViewConfig::new();
        vc.add_config_topic(ConfigTopic::draft(WIDGET_CONFIG))
            .expect("first");
        let err = vc
            .add_config_topic(ConfigTopic::draft(WIDGET_CONFIG))
            .expect_err("duplicate");
        assert!(matches!(err, TopikaError::ModelViolation(_)));
    }

    #[test]
    fn store_and_fetch_roundtrip() {
        let mut s = MemoryStore::new();
        let type_id = type_topic(&mut s);

        let mut draft = ViewConfig::new();
        draft
            .add_config_topic(
                ConfigTopic::draft(WIDGET_CONFIG)
                    .with_setting(ICON, SimpleValue::text("\u{1f464}"))
                    .with_setting(COLOR, SimpleValue::text("blue")),
            )
            .expect("draft");
        store(&mut s, Configurable::Type(type_id), &draft).expect("store");

        let fetched = fetch_of_type(&s, type_id).expect("fetch");
        assert_eq!(
            fetched.setting(WIDGET_CONFIG, COLOR),
            Some(&SimpleValue::text("blue"))
        );
        assert_eq!(
            fetched.setting(WIDGET_CONFIG, ICON),
            Some(&SimpleValue::text("\u{1f464}"))
        );
    }

    #[test]
    fn add_setting_creates_config_topic_on_demand() {
        let mut s = MemoryStore::new();
        let type_id = type_topic(&mut s);
        let mut vc = ViewConfig::new();

        add_setting(
            &mut s,
            Configurable::Type(type_id),
            &mut vc,
            WIDGET_CONFIG,
            ICON,
            SimpleValue::text("star"),
        )
        .expect("add");

        assert_eq!(vc.config_topics().len(), 1);
        let fetched = fetch_of_type(&s, type_id).expect("fetch");
        assert_eq!(
            fetched.setting(WIDGET_CONFIG, ICON),
            Some(&SimpleValue::text("star"))
        );
    }

    #[test]
    fn add_setting_overwrites_instead_of_duplicating() {
        let mut s = MemoryStore::new();
        let type_id = type_topic(&mut s);
        let mut vc = ViewConfig::new();

        for color in ["blue", "red"] {
            add_setting(
                &mut s,
                Configurable::Type(type_id),
                &mut vc,
                WIDGET_CONFIG,
                COLOR,
                SimpleValue::text(color),
            )
            .expect("add");
        }

        let fetched = fetch_of_type(&s, type_id).expect("fetch");
        assert_eq!(fetched.config_topics().len(), 1);
        assert_eq!(
            fetched.setting(WIDGET_CONFIG, COLOR),
            Some(&SimpleValue::text("red"))
        );
    }

    #[test]
    fn assoc_def_fetch_skips_flag_children() {
        let mut s = MemoryStore::new();
        let type_id = type_topic(&mut s);
        let child_type = s
            .create_topic(Some("test.name"), uris::TOPIC_TYPE, None)
            .expect("child type");
        let def = s
            .create_assoc(
                uris::COMPOSITION_DEF,
                Role::new(RoleType::ParentType, type_id.into()),
                Role::new(RoleType::ChildType, child_type.into()),
            )
            .expect("def");

        // flag child, same edge shape as a config topic
        store_child(
            &mut s,
            def.into(),
            uris::INCLUDE_IN_LABEL,
            SimpleValue::Boolean(true),
        )
        .expect("flag");
        let mut vc = ViewConfig::new();
        add_setting(
            &mut s,
            Configurable::AssocDef(def),
            &mut vc,
            WIDGET_CONFIG,
            ICON,
            SimpleValue::text("pen"),
        )
        .expect("setting");

        let fetched = fetch_of_assoc_def(&s, def).expect("fetch");
        assert_eq!(fetched.config_topics().len(), 1);
        assert!(fetched.config_topic(uris::INCLUDE_IN_LABEL).is_none());
    }
}
