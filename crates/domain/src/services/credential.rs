//! Credential issuer: gate tokens bound to an approved visit request.
//!
//! Only the SHA-256 digest of a token is stored on the request. Once the
//! request leaves `approved` the digest stays for audit, but verification
//! reports `NotApproved`.

use serde::Serialize;
use uuid::Uuid;

use shared::crypto::{credential_digest, generate_credential_token};

use super::context::ServiceContext;
use crate::error::VisitError;
use crate::models::{Actor, UserRole, VisitRequest, Visitor};

/// Freshly minted credential. `token` is returned to the caller once.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub hash: String,
}

/// Mints a new credential from the OS random source.
pub fn issue() -> IssuedCredential {
    let token = generate_credential_token();
    let hash = credential_digest(&token);
    IssuedCredential { token, hash }
}

/// Resident details shown to the officer at the gate.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub unit_number: Option<String>,
}

/// Successful verification result.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedCredential {
    pub request: VisitRequest,
    pub visitor: Visitor,
    pub resident: ResidentSummary,
}

/// Verifies tokens presented at the gate.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    ctx: ServiceContext,
}

impl CredentialIssuer {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Checks a presented token.
    ///
    /// Fails with `NotFound` for an unknown token, `NotApproved` when the
    /// request is no longer approved, and `Expired` on any day other than the
    /// scheduled one in the gate's calendar.
    pub async fn verify(&self, actor: &Actor, token: &str) -> Result<VerifiedCredential, VisitError> {
        actor.require(&[UserRole::Security, UserRole::Admin])?;
        let token = token.trim();
        if token.is_empty() {
            return Err(VisitError::validation("Credential token is required"));
        }

        let hash = credential_digest(token);
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.store.begin().await?;

        let request = tx
            .find_visit_request_by_credential(&hash)
            .await?
            .ok_or(VisitError::NotFound("Credential"))?;

        if !request.has_active_credential() {
            tracing::info!(
                visit_request_id = %request.id,
                status = %request.status,
                "Credential presented for a request that is no longer approved"
            );
            return Err(VisitError::NotApproved);
        }
        if self.ctx.policy.local_date(now) != request.visit_date {
            tracing::info!(
                visit_request_id = %request.id,
                visit_date = %request.visit_date,
                "Credential presented on the wrong day"
            );
            return Err(VisitError::Expired);
        }

        let visitor = tx
            .find_visitor(request.visitor_id)
            .await?
            .ok_or(VisitError::NotFound("Visitor"))?;
        let resident = tx
            .find_user(request.resident_id)
            .await?
            .ok_or(VisitError::NotFound("Resident"))?;

        tracing::info!(
            visit_request_id = %request.id,
            officer_id = %actor.id,
            "Credential verified"
        );

        Ok(VerifiedCredential {
            request,
            visitor,
            resident: ResidentSummary {
                id: resident.id,
                full_name: resident.full_name,
                unit_number: resident.unit_number,
            },
        })
    }
}
