//! Visitor repository for database operations.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::entities::VisitorEntity;
use crate::metrics::QueryTimer;
use domain::models::Visitor;

/// Repository for the visitor directory.
pub struct VisitorRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> VisitorRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&mut self, id: Uuid) -> Result<Option<VisitorEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visitor_by_id");
        let result = sqlx::query_as::<_, VisitorEntity>(
            r#"
            SELECT id, phone_number, full_name, email, id_number, company, default_purpose,
                   created_at, updated_at
            FROM visitors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    /// Find a visitor by normalized phone number.
    pub async fn find_by_phone(
        &mut self,
        phone_number: &str,
    ) -> Result<Option<VisitorEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visitor_by_phone");
        let result = sqlx::query_as::<_, VisitorEntity>(
            r#"
            SELECT id, phone_number, full_name, email, id_number, company, default_purpose,
                   created_at, updated_at
            FROM visitors
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&mut *self.conn)
        .await;
        timer.record();
        result
    }

    pub async fn insert(&mut self, visitor: &Visitor) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_visitor");
        let result = sqlx::query(
            r#"
            INSERT INTO visitors (id, phone_number, full_name, email, id_number, company,
                                  default_purpose, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(visitor.id)
        .bind(&visitor.phone_number)
        .bind(&visitor.full_name)
        .bind(&visitor.email)
        .bind(&visitor.id_number)
        .bind(&visitor.company)
        .bind(&visitor.default_purpose)
        .bind(visitor.created_at)
        .bind(visitor.updated_at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Overwrite the mutable profile fields. The phone number never changes.
    pub async fn update(&mut self, visitor: &Visitor) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_visitor");
        let result = sqlx::query(
            r#"
            UPDATE visitors
            SET full_name = $2, email = $3, id_number = $4, company = $5,
                default_purpose = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(visitor.id)
        .bind(&visitor.full_name)
        .bind(&visitor.email)
        .bind(&visitor.id_number)
        .bind(&visitor.company)
        .bind(&visitor.default_purpose)
        .bind(visitor.updated_at)
        .execute(&mut *self.conn)
        .await;
        timer.record();
        result.map(|_| ())
    }
}
