//! Booking Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingItem, BookingRepository, BookingStatus, ServicePayment, ServicePaymentStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Backed by `uq_bookings_technician_slot`.
fn slot_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict(
            "Technician is already booked for this time slot".to_string(),
        ),
        _ => AppError::Database(e),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    service_id: Uuid,
    user_id: Option<Uuid>,
    technician_id: Option<Uuid>,
    status: String,
    scheduled_date: NaiveDate,
    scheduled_time: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    customer_email: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    estimated_costs: i64,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, AppError> {
        let status = BookingStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown booking status {}", self.status)))?;
        Ok(Booking {
            id: self.id,
            service_id: self.service_id,
            user_id: self.user_id,
            technician_id: self.technician_id,
            status,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_email: self.customer_email,
            address: self.address,
            notes: self.notes,
            estimated_costs: self.estimated_costs,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingItemRow {
    id: Uuid,
    booking_id: Uuid,
    service_item_id: Uuid,
    quantity: i32,
    price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ServicePaymentRow {
    id: Uuid,
    booking_id: Uuid,
    provider: String,
    amount: i64,
    status: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServicePaymentRow {
    fn into_payment(self) -> ServicePayment {
        ServicePayment {
            id: self.id,
            booking_id: self.booking_id,
            provider: self.provider,
            amount: self.amount,
            status: ServicePaymentStatus::from_str(&self.status).unwrap_or_default(),
            transaction_id: self.transaction_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const BOOKING_COLUMNS: &str = "id, service_id, user_id, technician_id, status, scheduled_date, \
     scheduled_time, customer_name, customer_phone, customer_email, address, notes, \
     estimated_costs, completed_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, booking_id, provider, amount, status, transaction_id, created_at, updated_at";

fn rows_into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, AppError> {
    rows.into_iter().map(BookingRow::into_booking).collect()
}

#[derive(Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn list(
        &self,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, i64), AppError> {
        let status = status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_bookings WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM service_bookings
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows_into_bookings(rows)?, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM service_bookings WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows_into_bookings(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM service_bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(BookingRow::into_booking)
        .transpose()
    }

    async fn items(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, AppError> {
        let rows = sqlx::query_as::<_, BookingItemRow>(
            r#"
            SELECT id, booking_id, service_item_id, quantity, price
            FROM service_booking_items
            WHERE booking_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BookingItem {
                id: r.id,
                booking_id: r.booking_id,
                service_item_id: r.service_item_id,
                quantity: r.quantity,
                price: r.price,
            })
            .collect())
    }

    async fn slot_taken(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM service_bookings
                WHERE technician_id = $1
                  AND scheduled_date = $2
                  AND scheduled_time = $3
                  AND status NOT IN ('CANCELLED', 'COMPLETED')
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(technician_id)
        .bind(date)
        .bind(time)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn create(&self, booking: &Booking, items: &[BookingItem]) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO service_bookings (id, service_id, user_id, technician_id, status,
                                          scheduled_date, scheduled_time, customer_name,
                                          customer_phone, customer_email, address, notes,
                                          estimated_costs, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.id)
        .bind(booking.service_id)
        .bind(booking.user_id)
        .bind(booking.technician_id)
        .bind(booking.status.as_str())
        .bind(booking.scheduled_date)
        .bind(&booking.scheduled_time)
        .bind(&booking.customer_name)
        .bind(&booking.customer_phone)
        .bind(&booking.customer_email)
        .bind(&booking.address)
        .bind(&booking.notes)
        .bind(booking.estimated_costs)
        .bind(booking.completed_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(slot_conflict)?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO service_booking_items (id, booking_id, service_item_id,
                                                   quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(booking.id)
            .bind(item.service_item_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.into_booking()
    }

    async fn update(&self, booking: &Booking) -> Result<Booking, AppError> {
        sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE service_bookings
            SET technician_id = $2, status = $3, scheduled_date = $4, scheduled_time = $5,
                customer_name = $6, customer_phone = $7, customer_email = $8, address = $9,
                notes = $10, estimated_costs = $11, completed_at = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.id)
        .bind(booking.technician_id)
        .bind(booking.status.as_str())
        .bind(booking.scheduled_date)
        .bind(&booking.scheduled_time)
        .bind(&booking.customer_name)
        .bind(&booking.customer_phone)
        .bind(&booking.customer_email)
        .bind(&booking.address)
        .bind(&booking.notes)
        .bind(booking.estimated_costs)
        .bind(booking.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(slot_conflict)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?
        .into_booking()
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM service_payments WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM service_booking_items WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM service_bookings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_payment(&self, payment: &ServicePayment) -> Result<ServicePayment, AppError> {
        let row = sqlx::query_as::<_, ServicePaymentRow>(&format!(
            r#"
            INSERT INTO service_payments (id, booking_id, provider, amount, status, transaction_id,
                                          created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_payment())
    }

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: ServicePaymentStatus,
    ) -> Result<Option<ServicePayment>, AppError> {
        let row = sqlx::query_as::<_, ServicePaymentRow>(&format!(
            r#"
            UPDATE service_payments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServicePaymentRow::into_payment))
    }
}
