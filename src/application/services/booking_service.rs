//! Booking Service
//!
//! Service visits booked by customers and guests. Slots come from
//! [`BookingSchedule`]; a technician can hold a slot only once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::dto::request::{CreateBookingRequest, UpdateBookingRequest};
use crate::application::services::order_service::Viewer;
use crate::domain::services::{BookingSchedule, ScheduleError};
use crate::domain::{
    Booking, BookingItem, BookingRepository, BookingStatus, ServicePayment, ServicePaymentStatus,
    ServiceRepository, TechnicianRepository, User, UserRepository,
};
use crate::infrastructure::telegram::{booking_message, StaffNotifier};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::validation::{is_valid_email, is_valid_vn_phone};

const DEFAULT_PAYMENT_PROVIDER: &str = "COD";

#[async_trait]
pub trait BookingService: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingDetail, BookingError>;

    async fn create_guest(
        &self,
        request: CreateBookingRequest,
    ) -> Result<BookingDetail, BookingError>;

    async fn update(
        &self,
        id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<Booking, BookingError>;

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Booking, BookingError>;

    async fn assign_technician(
        &self,
        id: Uuid,
        technician_id: Uuid,
    ) -> Result<Booking, BookingError>;

    async fn create_payment(
        &self,
        booking_id: Uuid,
        provider: Option<String>,
        amount: Option<i64>,
    ) -> Result<ServicePayment, BookingError>;

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: ServicePaymentStatus,
    ) -> Result<ServicePayment, BookingError>;

    async fn list(
        &self,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Paginated<Booking>, BookingError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError>;

    async fn get(&self, id: Uuid, viewer: Viewer) -> Result<BookingDetail, BookingError>;

    async fn delete(&self, id: Uuid) -> Result<(), BookingError>;
}

/// Booking with its items.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub items: Vec<BookingItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service is not available for booking")]
    ServiceInactive,

    #[error("Service item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Technician not found")]
    TechnicianNotFound,

    #[error("Technician is not active")]
    TechnicianInactive,

    #[error("Technician is already booked at {date} {time}")]
    SlotTaken { date: NaiveDate, time: String },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Customer name and phone are required")]
    ContactRequired,

    #[error("Invalid Vietnamese phone number")]
    InvalidPhone,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Cannot change booking status from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Payment not found")]
    PaymentNotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound
            | BookingError::ServiceNotFound
            | BookingError::ItemNotFound(_)
            | BookingError::TechnicianNotFound
            | BookingError::PaymentNotFound => AppError::NotFound(err.to_string()),
            BookingError::SlotTaken { .. } => AppError::Conflict(err.to_string()),
            BookingError::ServiceInactive
            | BookingError::TechnicianInactive
            | BookingError::Schedule(_)
            | BookingError::ContactRequired
            | BookingError::InvalidPhone
            | BookingError::InvalidEmail
            | BookingError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
            BookingError::Repository(e) => e,
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn compact_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

fn checked_phone(phone: Option<String>) -> Result<Option<String>, BookingError> {
    match trimmed(phone) {
        Some(phone) if !is_valid_vn_phone(&phone) => Err(BookingError::InvalidPhone),
        phone => Ok(phone.map(|p| compact_phone(&p))),
    }
}

fn checked_email(email: Option<String>) -> Result<Option<String>, BookingError> {
    match trimmed(email) {
        Some(email) if !is_valid_email(&email) => Err(BookingError::InvalidEmail),
        email => Ok(email.map(|e| e.to_lowercase())),
    }
}

pub struct BookingServiceImpl<B, S, K, U, T>
where
    B: BookingRepository,
    S: ServiceRepository,
    K: TechnicianRepository,
    U: UserRepository,
    T: StaffNotifier,
{
    booking_repo: Arc<B>,
    service_repo: Arc<S>,
    technician_repo: Arc<K>,
    user_repo: Arc<U>,
    notifier: Arc<T>,
    schedule: BookingSchedule,
}

impl<B, S, K, U, T> BookingServiceImpl<B, S, K, U, T>
where
    B: BookingRepository,
    S: ServiceRepository,
    K: TechnicianRepository,
    U: UserRepository,
    T: StaffNotifier + 'static,
{
    pub fn new(
        booking_repo: Arc<B>,
        service_repo: Arc<S>,
        technician_repo: Arc<K>,
        user_repo: Arc<U>,
        notifier: Arc<T>,
        schedule: BookingSchedule,
    ) -> Self {
        Self {
            booking_repo,
            service_repo,
            technician_repo,
            user_repo,
            notifier,
            schedule,
        }
    }

    async fn find(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    async fn ensure_slot_free(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), BookingError> {
        if self
            .booking_repo
            .slot_taken(technician_id, date, time, exclude)
            .await?
        {
            return Err(BookingError::SlotTaken {
                date,
                time: time.to_string(),
            });
        }
        Ok(())
    }

    /// Shared by signed-in and guest bookings. `user` fills in missing
    /// contact details.
    async fn book(
        &self,
        user: Option<User>,
        request: CreateBookingRequest,
    ) -> Result<BookingDetail, BookingError> {
        let service = self
            .service_repo
            .find_by_id(request.service_id)
            .await?
            .ok_or(BookingError::ServiceNotFound)?;
        if !service.is_active {
            return Err(BookingError::ServiceInactive);
        }

        let time = request.scheduled_time.trim().to_string();
        self.schedule
            .validate(request.scheduled_date, &time, Utc::now())?;

        if let Some(technician_id) = request.technician_id {
            self.technician_repo
                .find_by_id(technician_id)
                .await?
                .ok_or(BookingError::TechnicianNotFound)?;
            self.ensure_slot_free(technician_id, request.scheduled_date, &time, None)
                .await?;
        }

        let booking_id = Uuid::now_v7();
        let available = self.service_repo.items(service.id).await?;
        let mut items = Vec::with_capacity(request.items.len());
        for wanted in &request.items {
            let item = available
                .iter()
                .find(|i| i.id == wanted.service_item_id && i.is_active)
                .ok_or(BookingError::ItemNotFound(wanted.service_item_id))?;
            items.push(BookingItem {
                id: Uuid::now_v7(),
                booking_id,
                service_item_id: item.id,
                quantity: wanted.quantity,
                price: item.price,
            });
        }

        let estimated_costs = request.estimated_costs.unwrap_or_else(|| {
            service.base_price
                + items
                    .iter()
                    .map(|i| i.price * i64::from(i.quantity))
                    .sum::<i64>()
        });

        let now = Utc::now();
        let booking = Booking {
            id: booking_id,
            service_id: service.id,
            user_id: user.as_ref().map(|u| u.id),
            technician_id: request.technician_id,
            status: BookingStatus::Pending,
            scheduled_date: request.scheduled_date,
            scheduled_time: time,
            customer_name: trimmed(request.customer_name)
                .or_else(|| user.as_ref().map(|u| u.full_name.clone())),
            customer_phone: checked_phone(request.customer_phone)?
                .or_else(|| user.as_ref().and_then(|u| u.phone.clone())),
            customer_email: checked_email(request.customer_email)?
                .or_else(|| user.as_ref().map(|u| u.email.clone())),
            address: trimmed(request.address),
            notes: trimmed(request.notes),
            estimated_costs,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let booking = self.booking_repo.create(&booking, &items).await?;
        info!(
            booking_id = %booking.id,
            service = %service.name,
            date = %booking.scheduled_date,
            time = %booking.scheduled_time,
            guest = booking.user_id.is_none(),
            "Booking created"
        );

        let notifier = Arc::clone(&self.notifier);
        let text = booking_message(&booking, &service.name);
        tokio::spawn(async move {
            notifier.send_message(&text).await;
        });

        Ok(BookingDetail { booking, items })
    }
}

#[async_trait]
impl<B, S, K, U, T> BookingService for BookingServiceImpl<B, S, K, U, T>
where
    B: BookingRepository + 'static,
    S: ServiceRepository + 'static,
    K: TechnicianRepository + 'static,
    U: UserRepository + 'static,
    T: StaffNotifier + 'static,
{
    #[instrument(skip(self, request))]
    async fn create(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingDetail, BookingError> {
        let user = self.user_repo.find_by_id(user_id).await?;
        self.book(user, request).await
    }

    #[instrument(skip(self, request))]
    async fn create_guest(
        &self,
        request: CreateBookingRequest,
    ) -> Result<BookingDetail, BookingError> {
        let has_name = request
            .customer_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        let has_phone = request
            .customer_phone
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if !has_name || !has_phone {
            return Err(BookingError::ContactRequired);
        }
        self.book(None, request).await
    }

    async fn update(
        &self,
        id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.find(id).await?;

        let rescheduled = request
            .scheduled_date
            .is_some_and(|d| d != booking.scheduled_date)
            || request
                .scheduled_time
                .as_deref()
                .is_some_and(|t| t.trim() != booking.scheduled_time);
        if let Some(date) = request.scheduled_date {
            booking.scheduled_date = date;
        }
        if let Some(time) = request.scheduled_time {
            booking.scheduled_time = time.trim().to_string();
        }
        if rescheduled {
            self.schedule
                .validate(booking.scheduled_date, &booking.scheduled_time, Utc::now())?;
        }

        let technician_changed = request
            .technician_id
            .is_some_and(|t| Some(t) != booking.technician_id);
        if let Some(technician_id) = request.technician_id {
            self.technician_repo
                .find_by_id(technician_id)
                .await?
                .ok_or(BookingError::TechnicianNotFound)?;
            booking.technician_id = Some(technician_id);
        }
        if rescheduled || technician_changed {
            if let Some(technician_id) = booking.technician_id {
                self.ensure_slot_free(
                    technician_id,
                    booking.scheduled_date,
                    &booking.scheduled_time,
                    Some(booking.id),
                )
                .await?;
            }
        }

        if request.customer_name.is_some() {
            booking.customer_name = trimmed(request.customer_name);
        }
        if request.customer_phone.is_some() {
            booking.customer_phone = checked_phone(request.customer_phone)?;
        }
        if request.customer_email.is_some() {
            booking.customer_email = checked_email(request.customer_email)?;
        }
        if request.address.is_some() {
            booking.address = trimmed(request.address);
        }
        if request.notes.is_some() {
            booking.notes = trimmed(request.notes);
        }
        if let Some(costs) = request.estimated_costs {
            booking.estimated_costs = costs;
        }

        booking.updated_at = Utc::now();
        Ok(self.booking_repo.update(&booking).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.find(id).await?;
        if !booking.status.can_transition_to(status) {
            return Err(BookingError::InvalidTransition {
                from: booking.status.as_str(),
                to: status.as_str(),
            });
        }

        let now = Utc::now();
        let from = booking.status;
        booking.status = status;
        if status == BookingStatus::Completed {
            booking.completed_at = Some(now);
        }
        booking.updated_at = now;

        let updated = self.booking_repo.update(&booking).await?;
        info!(
            booking_id = %id,
            from = from.as_str(),
            to = status.as_str(),
            "Booking status changed"
        );
        Ok(updated)
    }

    async fn assign_technician(
        &self,
        id: Uuid,
        technician_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.find(id).await?;
        let technician = self
            .technician_repo
            .find_by_id(technician_id)
            .await?
            .ok_or(BookingError::TechnicianNotFound)?;
        if !technician.is_active {
            return Err(BookingError::TechnicianInactive);
        }
        self.ensure_slot_free(
            technician_id,
            booking.scheduled_date,
            &booking.scheduled_time,
            Some(booking.id),
        )
        .await?;

        booking.technician_id = Some(technician_id);
        if booking.status.can_transition_to(BookingStatus::Assigned) {
            booking.status = BookingStatus::Assigned;
        }
        booking.updated_at = Utc::now();

        let updated = self.booking_repo.update(&booking).await?;
        info!(booking_id = %id, technician = %technician.name, "Technician assigned");
        Ok(updated)
    }

    async fn create_payment(
        &self,
        booking_id: Uuid,
        provider: Option<String>,
        amount: Option<i64>,
    ) -> Result<ServicePayment, BookingError> {
        let booking = self.find(booking_id).await?;
        let now = Utc::now();
        let payment = ServicePayment {
            id: Uuid::now_v7(),
            booking_id,
            provider: trimmed(provider)
                .map(|p| p.to_uppercase())
                .unwrap_or_else(|| DEFAULT_PAYMENT_PROVIDER.to_string()),
            amount: amount.unwrap_or(booking.estimated_costs),
            status: ServicePaymentStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        Ok(self.booking_repo.create_payment(&payment).await?)
    }

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: ServicePaymentStatus,
    ) -> Result<ServicePayment, BookingError> {
        self.booking_repo
            .update_payment_status(payment_id, status)
            .await?
            .ok_or(BookingError::PaymentNotFound)
    }

    async fn list(
        &self,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Paginated<Booking>, BookingError> {
        let (bookings, total) = self.booking_repo.list(status, page).await?;
        Ok(Paginated::new(bookings, page, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.booking_repo.list_for_user(user_id).await?)
    }

    async fn get(&self, id: Uuid, viewer: Viewer) -> Result<BookingDetail, BookingError> {
        let booking = self.find(id).await?;
        if let Viewer::Customer(user_id) = viewer {
            if booking.user_id != Some(user_id) {
                return Err(BookingError::NotFound);
            }
        }
        let items = self.booking_repo.items(id).await?;
        Ok(BookingDetail { booking, items })
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        self.find(id).await?;
        self.booking_repo.delete(id).await?;
        info!(booking_id = %id, "Booking deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::request::BookingItemRequest;
    use crate::application::services::service_catalog_service::tests::service;
    use crate::domain::{
        MockBookingRepository, MockServiceRepository, MockTechnicianRepository,
        MockUserRepository, ServiceItem, Technician,
    };
    use crate::infrastructure::telegram::MockStaffNotifier;
    use chrono::Duration;
    use mockall::predicate::{always, eq};
    use pretty_assertions::assert_eq;

    fn in_two_days() -> NaiveDate {
        (Utc::now() + Duration::days(2)).date_naive()
    }

    fn request(service_id: Uuid) -> CreateBookingRequest {
        CreateBookingRequest {
            service_id,
            items: vec![],
            technician_id: None,
            scheduled_date: in_two_days(),
            scheduled_time: "09:00".into(),
            customer_name: Some("Bình".into()),
            customer_phone: Some("0912 345 678".into()),
            customer_email: None,
            address: Some("12 Hai Bà Trưng".into()),
            notes: None,
            estimated_costs: None,
        }
    }

    fn item(service_id: Uuid, price: i64) -> ServiceItem {
        let now = Utc::now();
        ServiceItem {
            id: Uuid::now_v7(),
            service_id,
            name: "Thay tụ".into(),
            description: None,
            price,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn technician(active: bool) -> Technician {
        let now = Utc::now();
        Technician {
            id: Uuid::now_v7(),
            name: "Minh".into(),
            phone: "0987654321".into(),
            email: None,
            skills: vec![],
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    fn booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::now_v7(),
            service_id: Uuid::now_v7(),
            user_id: None,
            technician_id: None,
            status,
            scheduled_date: in_two_days(),
            scheduled_time: "10:00".into(),
            customer_name: Some("Bình".into()),
            customer_phone: Some("0912345678".into()),
            customer_email: None,
            address: None,
            notes: None,
            estimated_costs: 500_000,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Mocks {
        bookings: MockBookingRepository,
        services: MockServiceRepository,
        technicians: MockTechnicianRepository,
        users: MockUserRepository,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                bookings: MockBookingRepository::new(),
                services: MockServiceRepository::new(),
                technicians: MockTechnicianRepository::new(),
                users: MockUserRepository::new(),
            }
        }

        fn build(
            self,
        ) -> BookingServiceImpl<
            MockBookingRepository,
            MockServiceRepository,
            MockTechnicianRepository,
            MockUserRepository,
            MockStaffNotifier,
        > {
            let mut notifier = MockStaffNotifier::new();
            notifier.expect_send_message().returning(|_| ());
            BookingServiceImpl::new(
                Arc::new(self.bookings),
                Arc::new(self.services),
                Arc::new(self.technicians),
                Arc::new(self.users),
                Arc::new(notifier),
                BookingSchedule::new(7),
            )
        }
    }

    #[tokio::test]
    async fn guest_booking_sums_base_price_and_items() {
        let svc_row = service(300_000);
        let service_id = svc_row.id;
        let extra = item(service_id, 150_000);
        let extra_id = extra.id;

        let mut mocks = Mocks::new();
        mocks
            .services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(svc_row.clone())));
        mocks
            .services
            .expect_items()
            .returning(move |_| Ok(vec![extra.clone()]));
        mocks
            .bookings
            .expect_create()
            .returning(|b, _| Ok(b.clone()));
        let svc = mocks.build();

        let mut req = request(service_id);
        req.items = vec![BookingItemRequest {
            service_item_id: extra_id,
            quantity: 2,
        }];
        let detail = svc.create_guest(req).await.unwrap();

        assert_eq!(detail.booking.estimated_costs, 600_000);
        assert_eq!(detail.booking.customer_phone.as_deref(), Some("0912345678"));
        assert_eq!(detail.booking.user_id, None);
        assert_eq!(detail.items.len(), 1);
    }

    #[tokio::test]
    async fn guest_booking_requires_valid_phone() {
        let svc_row = service(300_000);
        let service_id = svc_row.id;
        let mut mocks = Mocks::new();
        mocks
            .services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(svc_row.clone())));
        mocks.services.expect_items().returning(|_| Ok(vec![]));
        let svc = mocks.build();

        let mut req = request(service_id);
        req.customer_phone = Some("12345".into());
        assert!(matches!(
            svc.create_guest(req).await,
            Err(BookingError::InvalidPhone)
        ));

        let mut req = request(service_id);
        req.customer_phone = None;
        assert!(matches!(
            svc.create_guest(req).await,
            Err(BookingError::ContactRequired)
        ));
    }

    #[tokio::test]
    async fn lunch_hour_is_not_a_slot() {
        let svc_row = service(300_000);
        let service_id = svc_row.id;
        let mut mocks = Mocks::new();
        mocks
            .services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(svc_row.clone())));
        let svc = mocks.build();

        let mut req = request(service_id);
        req.scheduled_time = "12:00".into();
        let err = svc.create_guest(req).await.unwrap_err();
        assert!(matches!(err, BookingError::Schedule(ScheduleError::NotASlot(_))));
    }

    #[tokio::test]
    async fn taken_slot_is_a_conflict() {
        let svc_row = service(300_000);
        let service_id = svc_row.id;
        let tech = technician(true);
        let tech_id = tech.id;

        let mut mocks = Mocks::new();
        mocks
            .services
            .expect_find_by_id()
            .returning(move |_| Ok(Some(svc_row.clone())));
        mocks
            .technicians
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tech.clone())));
        mocks
            .bookings
            .expect_slot_taken()
            .with(eq(tech_id), always(), eq("09:00"), eq(None::<Uuid>))
            .returning(|_, _, _, _| Ok(true));
        mocks.bookings.expect_create().never();
        let svc = mocks.build();

        let mut req = request(service_id);
        req.technician_id = Some(tech_id);
        let err = svc.create_guest(req).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn completing_sets_completed_at() {
        let current = booking(BookingStatus::InProgress);
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        mocks
            .bookings
            .expect_update()
            .returning(|b| Ok(b.clone()));
        let svc = mocks.build();

        let updated = svc
            .update_status(Uuid::now_v7(), BookingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Completed);
        assert!(updated.completed_at.is_some());
    }

    #[tokio::test]
    async fn terminal_bookings_cannot_move() {
        let current = booking(BookingStatus::Cancelled);
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        let svc = mocks.build();

        assert!(matches!(
            svc.update_status(Uuid::now_v7(), BookingStatus::Confirmed).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn assigning_moves_pending_to_assigned() {
        let current = booking(BookingStatus::Pending);
        let booking_id = current.id;
        let tech = technician(true);

        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        mocks
            .technicians
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tech.clone())));
        mocks
            .bookings
            .expect_slot_taken()
            .with(always(), always(), always(), eq(Some(booking_id)))
            .returning(|_, _, _, _| Ok(false));
        mocks
            .bookings
            .expect_update()
            .returning(|b| Ok(b.clone()));
        let svc = mocks.build();

        let updated = svc
            .assign_technician(booking_id, Uuid::now_v7())
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Assigned);
        assert!(updated.technician_id.is_some());
    }

    #[tokio::test]
    async fn inactive_technicians_cannot_be_assigned() {
        let current = booking(BookingStatus::Pending);
        let tech = technician(false);
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        mocks
            .technicians
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tech.clone())));
        let svc = mocks.build();

        assert!(matches!(
            svc.assign_technician(Uuid::now_v7(), Uuid::now_v7()).await,
            Err(BookingError::TechnicianInactive)
        ));
    }

    #[tokio::test]
    async fn payment_defaults_to_cod_for_estimated_costs() {
        let current = booking(BookingStatus::Confirmed);
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        mocks
            .bookings
            .expect_create_payment()
            .returning(|p| Ok(p.clone()));
        let svc = mocks.build();

        let payment = svc
            .create_payment(Uuid::now_v7(), None, None)
            .await
            .unwrap();
        assert_eq!(payment.provider, "COD");
        assert_eq!(payment.amount, 500_000);
        assert_eq!(payment.status, ServicePaymentStatus::Pending);
    }

    #[tokio::test]
    async fn customers_only_see_their_bookings() {
        let owner = Uuid::now_v7();
        let mut current = booking(BookingStatus::Pending);
        current.user_id = Some(owner);
        let mut mocks = Mocks::new();
        mocks
            .bookings
            .expect_find_by_id()
            .returning(move |_| Ok(Some(current.clone())));
        mocks.bookings.expect_items().returning(|_| Ok(vec![]));
        let svc = mocks.build();

        assert!(svc.get(Uuid::now_v7(), Viewer::Customer(owner)).await.is_ok());
        assert!(matches!(
            svc.get(Uuid::now_v7(), Viewer::Customer(Uuid::now_v7())).await,
            Err(BookingError::NotFound)
        ));
    }
}
