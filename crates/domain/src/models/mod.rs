//! Domain models for Visitor Gate.

pub mod actor;
pub mod blacklist;
pub mod notification;
pub mod visit_request;
pub mod visitor;

pub use actor::{Actor, UserAccount, UserRole};
pub use blacklist::{BlacklistEntry, NewBlacklistEntry};
pub use notification::{Notification, NotificationData, NotificationPriority};
pub use visit_request::{EntryType, NewVisit, VisitOutcome, VisitRequest, VisitStatus};
pub use visitor::{Visitor, VisitorDetails};
