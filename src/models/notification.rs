//! Normalized notification model.
//!
//! Every poll source turns its raw events into [`Notification`] values before
//! they reach a sink. The JSON shape mirrors the notification records posted
//! by the developer-portal plugin (`kind`, `metadata`, optional `spec`).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use jiff::Timestamp;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::poller::MonotonicClock;

// ============================================================================
// Kind and severity
// ============================================================================

/// Notification category tag.
///
/// `alert` and `tingle` are the categories emitted by the built-in sources;
/// any other tag is carried through as [`NotificationKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Alert,
    Tingle,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::Alert => "alert",
            NotificationKind::Tingle => "tingle",
            NotificationKind::Other(tag) => tag,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "alert" => NotificationKind::Alert,
            "tingle" => NotificationKind::Tingle,
            _ => NotificationKind::Other(tag),
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(tag: &str) -> Self {
        NotificationKind::from(tag.to_string())
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered notification severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(AppError::Validation {
                field: "severity".to_string(),
                reason: format!(
                    "Invalid severity '{}'. Valid values are: info, warning, error, critical",
                    s
                ),
            }),
        }
    }
}

// ============================================================================
// Entity references
// ============================================================================

static ENTITY_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<kind>[A-Za-z][\w-]*):(?:(?P<namespace>[\w.-]+)/)?(?P<name>[\w.@-]+)$")
        .expect("entity ref pattern is valid")
});

/// Reference to the subject (user, group, component) a notification targets.
///
/// Written as `kind:namespace/name`; the namespace defaults to `default`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EntityRef {
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into().to_lowercase(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl FromStr for EntityRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ENTITY_REF_PATTERN
            .captures(s.trim())
            .ok_or_else(|| AppError::Validation {
                field: "entity_ref".to_string(),
                reason: format!("'{}' is not of the form kind:[namespace/]name", s),
            })?;

        let namespace = caps
            .name("namespace")
            .map(|m| m.as_str())
            .unwrap_or(Self::DEFAULT_NAMESPACE);

        Ok(EntityRef::new(&caps["kind"], namespace, &caps["name"]))
    }
}

impl TryFrom<String> for EntityRef {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityRef> for String {
    fn from(entity: EntityRef) -> Self {
        entity.to_string()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.namespace, self.name)
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Opaque icon reference understood by the rendering host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IconRef(pub String);

impl IconRef {
    pub fn error() -> Self {
        IconRef("error".to_string())
    }
}

/// Link attached to a notification; `url` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub title: String,
}

impl Link {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    pub message: String,
    pub title: String,
    pub id: Uuid,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// Category-specific payload. An empty `target_entity_refs` set means the
/// notification is global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconRef>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub target_entity_refs: BTreeSet<EntityRef>,
}

impl NotificationSpec {
    fn is_empty(&self) -> bool {
        self.icon.is_none() && self.links.is_empty() && self.target_entity_refs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub metadata: NotificationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<NotificationSpec>,
}

impl Notification {
    pub fn builder(
        kind: impl Into<NotificationKind>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> NotificationBuilder {
        NotificationBuilder::new(kind, title, message)
    }

    pub fn id(&self) -> Uuid {
        self.metadata.id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.metadata.timestamp
    }

    /// True when the notification is not scoped to any entity.
    pub fn is_global(&self) -> bool {
        self.spec
            .as_ref()
            .is_none_or(|spec| spec.target_entity_refs.is_empty())
    }
}

/// Builder assigning a fresh id and a clock timestamp on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    kind: NotificationKind,
    title: String,
    message: String,
    severity: Option<Severity>,
    spec: NotificationSpec,
}

impl NotificationBuilder {
    pub fn new(
        kind: impl Into<NotificationKind>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            message: message.into(),
            severity: None,
            spec: NotificationSpec::default(),
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn icon(mut self, icon: Option<IconRef>) -> Self {
        self.spec.icon = icon;
        self
    }

    pub fn link(mut self, link: Link) -> Self {
        self.spec.links.push(link);
        self
    }

    pub fn target(mut self, entity: EntityRef) -> Self {
        self.spec.target_entity_refs.insert(entity);
        self
    }

    pub fn targets<I>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = EntityRef>,
    {
        self.spec.target_entity_refs.extend(entities);
        self
    }

    pub fn build(self, clock: &MonotonicClock) -> Notification {
        let spec = (!self.spec.is_empty()).then_some(self.spec);
        Notification {
            kind: self.kind,
            metadata: NotificationMetadata {
                message: self.message,
                title: self.title,
                id: Uuid::new_v4(),
                timestamp: clock.now(),
                severity: self.severity,
            },
            spec,
        }
    }
}
