//! HTTP route handlers.
//!
//! Handlers only extract, call one domain operation and shape the response.

pub mod admin;
pub mod blacklist;
pub mod health;
pub mod notifications;
pub mod requests;
pub mod resident;
pub mod security;
pub mod visitor;

use domain::models::{VisitOutcome, VisitRequest};
use serde::{Deserialize, Serialize};

/// A visit request, plus the gate credential when this call minted one.
///
/// The plaintext credential is only ever returned here; it cannot be fetched
/// again.
#[derive(Debug, Serialize)]
pub struct VisitResponse {
    #[serde(flatten)]
    pub request: VisitRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl From<VisitOutcome> for VisitResponse {
    fn from(outcome: VisitOutcome) -> Self {
        Self {
            request: outcome.request,
            credential: outcome.credential,
        }
    }
}

/// Envelope for list responses.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// `?limit=&offset=` paging.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}
