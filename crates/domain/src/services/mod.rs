//! Domain services for the visitor gate.
//!
//! Each service owns a [`ServiceContext`] and runs every operation in a single
//! store transaction.

pub mod accounts;
pub mod blacklist;
pub mod clock;
pub mod context;
pub mod credential;
pub mod email;
pub mod inbox;
pub(crate) mod notification;
pub mod visit_workflow;
pub mod visitor_directory;

pub use accounts::AccountApprovals;
pub use blacklist::{BlacklistLedger, BlacklistQuery};
pub use clock::{Clock, GatePolicy, ManualClock, SystemClock};
pub use context::ServiceContext;
pub use credential::{CredentialIssuer, ResidentSummary, VerifiedCredential};
pub use email::{DeliveryMode, EmailDeliveryError, EmailSender, MockEmailSender, OutboundEmail};
pub use inbox::Inbox;
pub use visit_workflow::{is_self_approving, VisitDetail, VisitWorkflow};
pub use visitor_directory::{VisitorDirectory, VisitorStatus};
