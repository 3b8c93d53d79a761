//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod blacklist;
pub mod notification;
pub mod user;
pub mod visit_request;
pub mod visitor;

pub use blacklist::BlacklistEntryEntity;
pub use notification::{NotificationEntity, NotificationPriorityDb};
pub use user::{UserEntity, UserRoleDb};
pub use visit_request::{EntryTypeDb, VisitRequestEntity, VisitStatusDb};
pub use visitor::VisitorEntity;
