//! Technician slot uniqueness

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use uuid::Uuid;

use shop_server::domain::{Booking, BookingRepository, BookingStatus};
use shop_server::infrastructure::repositories::PgBookingRepository;
use shop_server::shared::error::AppError;

async fn seed_service_and_technician(pool: &PgPool) -> (Uuid, Uuid) {
    let service = Uuid::now_v7();
    sqlx::query("INSERT INTO services (id, name, slug) VALUES ($1, $2, $3)")
        .bind(service)
        .bind("Lap dat dan karaoke")
        .bind(format!("lap-dat-{service}"))
        .execute(pool)
        .await
        .unwrap();

    let technician = Uuid::now_v7();
    sqlx::query("INSERT INTO technicians (id, name, phone) VALUES ($1, $2, $3)")
        .bind(technician)
        .bind("Tran Van Minh")
        .bind("0912345678")
        .execute(pool)
        .await
        .unwrap();

    (service, technician)
}

fn booking(service: Uuid, technician: Uuid, time: &str) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::now_v7(),
        service_id: service,
        user_id: None,
        technician_id: Some(technician),
        status: BookingStatus::Assigned,
        scheduled_date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
        scheduled_time: time.to_string(),
        customer_name: Some("Le Thi Hoa".to_string()),
        customer_phone: Some("0987654321".to_string()),
        customer_email: None,
        address: Some("45 Le Loi".to_string()),
        notes: None,
        estimated_costs: 500_000,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn second_booking_for_a_taken_slot_conflicts(pool: PgPool) {
    let (service, technician) = seed_service_and_technician(&pool).await;
    let bookings = PgBookingRepository::new(pool.clone());

    bookings
        .create(&booking(service, technician, "09:00"), &[])
        .await
        .unwrap();
    let err = bookings
        .create(&booking(service, technician, "09:00"), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref msg) if msg.contains("already booked")));
    bookings
        .create(&booking(service, technician, "10:00"), &[])
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn cancelled_booking_frees_its_slot(pool: PgPool) {
    let (service, technician) = seed_service_and_technician(&pool).await;
    let bookings = PgBookingRepository::new(pool.clone());
    let date = NaiveDate::from_ymd_opt(2026, 11, 20).unwrap();

    let mut first = bookings
        .create(&booking(service, technician, "14:00"), &[])
        .await
        .unwrap();
    first.status = BookingStatus::Cancelled;
    bookings.update(&first).await.unwrap();

    assert!(!bookings.slot_taken(technician, date, "14:00", None).await.unwrap());
    bookings
        .create(&booking(service, technician, "14:00"), &[])
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL and a local Postgres; non-CI integration test"]
async fn rescheduling_onto_a_taken_slot_conflicts(pool: PgPool) {
    let (service, technician) = seed_service_and_technician(&pool).await;
    let bookings = PgBookingRepository::new(pool.clone());

    bookings
        .create(&booking(service, technician, "09:00"), &[])
        .await
        .unwrap();
    let mut other = bookings
        .create(&booking(service, technician, "15:00"), &[])
        .await
        .unwrap();

    other.scheduled_time = "09:00".to_string();
    let err = bookings.update(&other).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    let stored = bookings.find_by_id(other.id).await.unwrap().unwrap();
    assert_eq!(stored.scheduled_time, "15:00");
}
