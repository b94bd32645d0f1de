//! Service layer: what happens to notifications once a source produced them.

pub mod notifications;

pub use notifications::NotificationService;
