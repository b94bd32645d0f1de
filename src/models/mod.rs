//! Domain models

mod notification;

pub use notification::{
    EntityRef, IconRef, Link, Notification, NotificationBuilder, NotificationKind,
    NotificationMetadata, NotificationSpec, Severity,
};
