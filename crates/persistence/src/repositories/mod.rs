//! Repository implementations for database operations.
//!
//! Repositories borrow the connection of an open transaction; the
//! [`PgVisitStore`](crate::store::PgVisitStore) decides transaction scope.

pub mod blacklist;
pub mod notification;
pub mod user;
pub mod visit_request;
pub mod visitor;

pub use blacklist::BlacklistRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;
pub use visit_request::VisitRequestRepository;
pub use visitor::VisitorRepository;
