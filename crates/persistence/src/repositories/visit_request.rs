//! Visit request repository for database operations.

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::{EntryTypeDb, VisitRequestEntity, VisitStatusDb};
use crate::metrics::QueryTimer;
use domain::models::{VisitRequest, VisitStatus};
use domain::store::{VisitOrder, VisitRequestFilter};

const COLUMNS: &str = "id, visitor_id, resident_id, security_officer_id, entry_type, status, \
    scheduled_at, visit_date, expected_duration_minutes, purpose, notes, vehicle_registration, \
    number_of_guests, credential_hash, denial_reason, approved_by, created_at, updated_at, \
    approved_at, denied_at, completed_at, cancelled_at, actual_arrival, actual_departure";

/// Repository for visit requests.
pub struct VisitRequestRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> VisitRequestRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(
        &mut self,
        id: Uuid,
    ) -> Result<Option<VisitRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visit_request_by_id");
        let sql = format!("SELECT {} FROM visit_requests WHERE id = $1", COLUMNS);
        let result = sqlx::query_as::<_, VisitRequestEntity>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await;
        timer.record();
        result
    }

    /// Find a visit request and lock the row until the transaction ends.
    pub async fn find_by_id_for_update(
        &mut self,
        id: Uuid,
    ) -> Result<Option<VisitRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visit_request_for_update");
        let sql = format!(
            "SELECT {} FROM visit_requests WHERE id = $1 FOR UPDATE",
            COLUMNS
        );
        let result = sqlx::query_as::<_, VisitRequestEntity>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await;
        timer.record();
        result
    }

    /// Find the request a gate credential was issued for.
    pub async fn find_by_credential_hash(
        &mut self,
        credential_hash: &str,
    ) -> Result<Option<VisitRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visit_request_by_credential");
        let sql = format!(
            "SELECT {} FROM visit_requests WHERE credential_hash = $1",
            COLUMNS
        );
        let result = sqlx::query_as::<_, VisitRequestEntity>(&sql)
            .bind(credential_hash)
            .fetch_optional(&mut *self.conn)
            .await;
        timer.record();
        result
    }

    /// Find a pending or approved request for the visitor, resident and day.
    pub async fn find_live(
        &mut self,
        visitor_id: Uuid,
        resident_id: Uuid,
        visit_date: NaiveDate,
    ) -> Result<Option<VisitRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_live_visit_request");
        let sql = format!(
            r#"
            SELECT {}
            FROM visit_requests
            WHERE visitor_id = $1 AND resident_id = $2 AND visit_date = $3
              AND status IN ('pending', 'approved')
            LIMIT 1
            "#,
            COLUMNS
        );
        let result = sqlx::query_as::<_, VisitRequestEntity>(&sql)
            .bind(visitor_id)
            .bind(resident_id)
            .bind(visit_date)
            .fetch_optional(&mut *self.conn)
            .await;
        timer.record();
        result
    }

    pub async fn insert(&mut self, request: &VisitRequest) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_visit_request");
        let sql = format!(
            r#"
            INSERT INTO visit_requests ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
            COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(request.id)
            .bind(request.visitor_id)
            .bind(request.resident_id)
            .bind(request.security_officer_id)
            .bind(EntryTypeDb::from(request.entry_type))
            .bind(VisitStatusDb::from(request.status))
            .bind(request.scheduled_at)
            .bind(request.visit_date)
            .bind(request.expected_duration_minutes)
            .bind(&request.purpose)
            .bind(&request.notes)
            .bind(&request.vehicle_registration)
            .bind(request.number_of_guests)
            .bind(&request.credential_hash)
            .bind(&request.denial_reason)
            .bind(request.approved_by)
            .bind(request.created_at)
            .bind(request.updated_at)
            .bind(request.approved_at)
            .bind(request.denied_at)
            .bind(request.completed_at)
            .bind(request.cancelled_at)
            .bind(request.actual_arrival)
            .bind(request.actual_departure)
            .execute(&mut *self.conn)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Write every mutable column if the stored status is still `expected`.
    ///
    /// Returns true if a row was updated.
    pub async fn update_if_status(
        &mut self,
        request: &VisitRequest,
        expected: VisitStatus,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("update_visit_request_if_status");
        let result = sqlx::query(
            r#"
            UPDATE visit_requests
            SET status = $3, security_officer_id = $4, credential_hash = $5,
                denial_reason = $6, approved_by = $7, updated_at = $8, approved_at = $9,
                denied_at = $10, completed_at = $11, cancelled_at = $12,
                actual_arrival = $13, actual_departure = $14
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(request.id)
        .bind(VisitStatusDb::from(expected))
        .bind(VisitStatusDb::from(request.status))
        .bind(request.security_officer_id)
        .bind(&request.credential_hash)
        .bind(&request.denial_reason)
        .bind(request.approved_by)
        .bind(request.updated_at)
        .bind(request.approved_at)
        .bind(request.denied_at)
        .bind(request.completed_at)
        .bind(request.cancelled_at)
        .bind(request.actual_arrival)
        .bind(request.actual_departure)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// List requests matching `filter`. Unset filter fields match everything.
    pub async fn list(
        &mut self,
        filter: &VisitRequestFilter,
    ) -> Result<Vec<VisitRequestEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_visit_requests");
        let order = match filter.order {
            VisitOrder::NewestFirst => "created_at DESC, id DESC",
            VisitOrder::ScheduledAscending => "scheduled_at ASC, id ASC",
        };
        let sql = format!(
            r#"
            SELECT {}
            FROM visit_requests
            WHERE ($1::uuid IS NULL OR resident_id = $1)
              AND ($2::uuid IS NULL OR visitor_id = $2)
              AND (cardinality($3::text[]) = 0 OR status::text = ANY($3))
              AND ($4::entry_type IS NULL OR entry_type = $4)
              AND ($5::date IS NULL OR visit_date = $5)
              AND ($6::date IS NULL OR visit_date >= $6)
              AND ($7::timestamptz IS NULL OR created_at >= $7)
            ORDER BY {}
            LIMIT $8 OFFSET $9
            "#,
            COLUMNS, order
        );
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query_as::<_, VisitRequestEntity>(&sql)
            .bind(filter.resident_id)
            .bind(filter.visitor_id)
            .bind(statuses)
            .bind(filter.entry_type.map(EntryTypeDb::from))
            .bind(filter.visit_date)
            .bind(filter.visit_date_from)
            .bind(filter.created_since)
            .bind(filter.limit)
            .bind(filter.offset.unwrap_or(0).max(0))
            .fetch_all(&mut *self.conn)
            .await;
        timer.record();
        result
    }
}
