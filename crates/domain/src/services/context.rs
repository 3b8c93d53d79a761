//! Collaborators shared by every domain service.

use std::sync::Arc;

use super::clock::{Clock, GatePolicy, SystemClock};
use super::email::{DeliveryMode, EmailSender};
use crate::store::VisitStore;

/// Store, clock, mailer and gate policy handed to each service.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn VisitStore>,
    pub clock: Arc<dyn Clock>,
    pub mailer: Arc<dyn EmailSender>,
    pub policy: GatePolicy,
    pub delivery: DeliveryMode,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn VisitStore>, mailer: Arc<dyn EmailSender>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            mailer,
            policy: GatePolicy::default(),
            delivery: DeliveryMode::Background,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("policy", &self.policy)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}
