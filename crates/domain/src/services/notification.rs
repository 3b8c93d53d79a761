//! Notification dispatcher.
//!
//! Each transition enumerates its own audience. In-app rows are written inside
//! the transition's transaction; emails are queued on an [`Outbox`] and leave
//! only after commit. Visitors hold no account, so they are reached by email.
//!
//! | Transition              | In-app                         | Email                              |
//! |-------------------------|--------------------------------|------------------------------------|
//! | new pending             | owning resident                | resident; visitor if pre-registered|
//! | walk-in logged          | owning resident                | resident                           |
//! | approve (or self-approve)| active approved security      | visitor                            |
//! | deny                    | none                           | visitor                            |
//! | cancel                  | owning resident                | none                               |
//! | account approved        | the account holder             | the account holder                 |
//! | account rejected        | none                           | the account holder                 |

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::clock::GatePolicy;
use super::email::{OutboundEmail, Outbox};
use crate::models::{
    EntryType, Notification, NotificationData, NotificationPriority, UserAccount, VisitRequest,
    Visitor,
};
use crate::store::{StoreError, VisitTx};

/// Fan-out for one transition at one instant.
pub(crate) struct Dispatcher<'a> {
    policy: &'a GatePolicy,
    now: DateTime<Utc>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(policy: &'a GatePolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now }
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.policy.utc_offset)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }

    async fn notify(
        &self,
        tx: &mut dyn VisitTx,
        recipient_id: Uuid,
        title: &str,
        message: String,
        priority: NotificationPriority,
        data: NotificationData,
    ) -> Result<(), StoreError> {
        let notification = Notification::new(recipient_id, title, message, priority, data, self.now);
        tx.insert_notification(&notification).await
    }

    fn email(outbox: &mut Outbox, to: Option<&String>, to_name: &str, subject: String, body: String) {
        if let Some(to) = to {
            outbox.push(OutboundEmail {
                to: to.clone(),
                to_name: Some(to_name.to_string()),
                subject,
                body,
            });
        }
    }

    /// Email for a visitor, dropped when they left no address.
    fn email_visitor(outbox: &mut Outbox, visitor: &Visitor, subject: String, body: String) {
        if !visitor.is_contactable() {
            tracing::debug!(visitor_id = %visitor.id, subject = %subject, "Visitor has no email address");
            return;
        }
        Self::email(outbox, visitor.email.as_ref(), &visitor.full_name, subject, body);
    }

    /// An officer logged a walk-in, which waits on the resident.
    pub async fn walk_in_logged(
        &self,
        tx: &mut dyn VisitTx,
        outbox: &mut Outbox,
        request: &VisitRequest,
        visitor: &Visitor,
        resident: &UserAccount,
        officer_id: Uuid,
    ) -> Result<(), StoreError> {
        self.notify(
            tx,
            resident.id,
            "Visitor at the gate",
            format!(
                "{} is at the gate and asks to visit you ({}).",
                visitor.full_name, request.purpose
            ),
            NotificationPriority::High,
            NotificationData::WalkIn {
                visit_request_id: request.id,
                visitor_name: visitor.full_name.clone(),
                security_officer_id: officer_id,
            },
        )
        .await?;
        Self::email(
            outbox,
            resident.email.as_ref(),
            &resident.full_name,
            format!("{} is waiting at the gate", visitor.full_name),
            format!(
                "Hello {},\n\n{} ({}) arrived at the gate at {} to visit you.\nPurpose: {}\n\nPlease approve or deny the request in the app.",
                resident.full_name,
                visitor.full_name,
                visitor.phone_number,
                self.local_time(request.scheduled_at),
                request.purpose
            ),
        );
        Ok(())
    }

    /// A resident-side request entered `pending` without self-approval.
    pub async fn request_received(
        &self,
        tx: &mut dyn VisitTx,
        outbox: &mut Outbox,
        request: &VisitRequest,
        visitor: &Visitor,
        resident: &UserAccount,
    ) -> Result<(), StoreError> {
        let when = self.local_time(request.scheduled_at);

        self.notify(
            tx,
            resident.id,
            "New visit request",
            format!(
                "{} would like to visit on {} ({}).",
                visitor.full_name, when, request.purpose
            ),
            NotificationPriority::Medium,
            NotificationData::VisitRequest {
                visit_request_id: request.id,
                visitor_name: visitor.full_name.clone(),
                scheduled_at: request.scheduled_at,
            },
        )
        .await?;
        Self::email(
            outbox,
            resident.email.as_ref(),
            &resident.full_name,
            format!("New visit request from {}", visitor.full_name),
            format!(
                "Hello {},\n\n{} ({}) requested to visit you on {}.\nPurpose: {}\n\nPlease approve or deny the request in the app.",
                resident.full_name, visitor.full_name, visitor.phone_number, when, request.purpose
            ),
        );
        if request.entry_type == EntryType::PreRegistered {
            Self::email_visitor(
                outbox,
                visitor,
                "Your visit request was received".to_string(),
                format!(
                    "Hello {},\n\nYour request to visit {} on {} was received and is awaiting the resident's approval.\nReference: {}",
                    visitor.full_name, resident.full_name, when, request.id
                ),
            );
        }
        Ok(())
    }

    /// A request entered `approved`, by Approve or by self-approving creation.
    pub async fn request_approved(
        &self,
        tx: &mut dyn VisitTx,
        outbox: &mut Outbox,
        request: &VisitRequest,
        visitor: &Visitor,
        resident: &UserAccount,
        credential: Option<&str>,
    ) -> Result<(), StoreError> {
        let when = self.local_time(request.scheduled_at);
        let unit = resident.unit_number.as_deref().unwrap_or("-");

        // Queried at dispatch time, never cached
        let officers = tx.list_active_security().await?;
        for officer in &officers {
            self.notify(
                tx,
                officer.id,
                "Approved visitor expected",
                format!(
                    "{} is expected on {} to visit {} (unit {}).",
                    visitor.full_name, when, resident.full_name, unit
                ),
                NotificationPriority::Medium,
                NotificationData::VisitApproved {
                    visit_request_id: request.id,
                    visitor_name: visitor.full_name.clone(),
                    resident_name: resident.full_name.clone(),
                    unit_number: resident.unit_number.clone(),
                    scheduled_at: request.scheduled_at,
                },
            )
            .await?;
        }

        let credential_line = credential
            .map(|token| format!("\nYour gate pass: {}\nPresent it at the gate on the day of your visit.", token))
            .unwrap_or_default();
        Self::email_visitor(
            outbox,
            visitor,
            "Your visit was approved".to_string(),
            format!(
                "Hello {},\n\nYour visit to {} (unit {}) on {} was approved.{}\nReference: {}",
                visitor.full_name, resident.full_name, unit, when, credential_line, request.id
            ),
        );

        tracing::debug!(
            visit_request_id = %request.id,
            officers = officers.len(),
            "Approval fanned out"
        );
        Ok(())
    }

    /// A request was denied. Only the visitor hears about it.
    pub fn request_denied(
        &self,
        outbox: &mut Outbox,
        request: &VisitRequest,
        visitor: &Visitor,
        resident: &UserAccount,
    ) {
        let reason = request.denial_reason.as_deref().unwrap_or("not given");
        Self::email_visitor(
            outbox,
            visitor,
            "Your visit request was declined".to_string(),
            format!(
                "Hello {},\n\nYour request to visit {} on {} was declined.\nReason: {}",
                visitor.full_name,
                resident.full_name,
                self.local_time(request.scheduled_at),
                reason
            ),
        );
    }

    /// The visitor withdrew a pending request.
    pub async fn request_cancelled(
        &self,
        tx: &mut dyn VisitTx,
        request: &VisitRequest,
        visitor: &Visitor,
        resident: &UserAccount,
    ) -> Result<(), StoreError> {
        self.notify(
            tx,
            resident.id,
            "Visit request cancelled",
            format!(
                "{} cancelled the visit planned for {}.",
                visitor.full_name,
                self.local_time(request.scheduled_at)
            ),
            NotificationPriority::Low,
            NotificationData::VisitCancelled {
                visit_request_id: request.id,
                visitor_name: visitor.full_name.clone(),
            },
        )
        .await
    }

    /// An administrator approved the account.
    pub async fn account_approved(
        &self,
        tx: &mut dyn VisitTx,
        outbox: &mut Outbox,
        user: &UserAccount,
        approved_by: Uuid,
    ) -> Result<(), StoreError> {
        self.notify(
            tx,
            user.id,
            "Account approved",
            "Your account was approved. You now have full access.".to_string(),
            NotificationPriority::High,
            NotificationData::AccountApproved { approved_by },
        )
        .await?;
        Self::email(
            outbox,
            user.email.as_ref(),
            &user.full_name,
            "Your account was approved".to_string(),
            format!(
                "Hello {},\n\nAn administrator approved your {} account. You can now sign in with full access.",
                user.full_name, user.role
            ),
        );
        Ok(())
    }

    /// An administrator turned the registration down. The account is
    /// deactivated, so only email reaches its holder.
    pub fn account_rejected(&self, outbox: &mut Outbox, user: &UserAccount, reason: &str) {
        Self::email(
            outbox,
            user.email.as_ref(),
            &user.full_name,
            "Your account registration was declined".to_string(),
            format!(
                "Hello {},\n\nAn administrator declined your {} account registration.\nReason: {}",
                user.full_name, user.role, reason
            ),
        );
    }
}
