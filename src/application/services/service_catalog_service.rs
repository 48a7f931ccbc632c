//! Service Catalog Service
//!
//! Service types, services with their add-on items, and technicians.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::application::dto::request::{
    CreateServiceItemRequest, CreateServiceRequest, CreateServiceTypeRequest,
    CreateTechnicianRequest, UpdateServiceItemRequest, UpdateServiceRequest,
    UpdateServiceTypeRequest,
};
use crate::domain::{
    Service, ServiceItem, ServicePricing, ServiceRepository, ServiceStats, ServiceType,
    ServiceTypeRepository, Technician, TechnicianRepository, DEFAULT_DURATION_MINUTES,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};
use crate::shared::slug::{slugify, with_suffix};

const MAX_SLUG_ATTEMPTS: u32 = 100;

#[async_trait]
pub trait ServiceCatalogService: Send + Sync {
    async fn list_types(&self) -> Result<Vec<ServiceType>, ServiceCatalogError>;

    async fn get_type(&self, id: Uuid) -> Result<ServiceType, ServiceCatalogError>;

    async fn create_type(
        &self,
        input: CreateServiceTypeRequest,
    ) -> Result<ServiceType, ServiceCatalogError>;

    async fn update_type(
        &self,
        id: Uuid,
        input: UpdateServiceTypeRequest,
    ) -> Result<ServiceType, ServiceCatalogError>;

    async fn delete_type(&self, id: Uuid) -> Result<(), ServiceCatalogError>;

    async fn list_services(
        &self,
        type_id: Option<Uuid>,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<Paginated<Service>, ServiceCatalogError>;

    async fn get_service(&self, id: Uuid) -> Result<ServiceDetail, ServiceCatalogError>;

    async fn get_service_by_slug(&self, slug: &str) -> Result<ServiceDetail, ServiceCatalogError>;

    async fn create_service(
        &self,
        input: CreateServiceRequest,
    ) -> Result<Service, ServiceCatalogError>;

    async fn update_service(
        &self,
        id: Uuid,
        input: UpdateServiceRequest,
    ) -> Result<Service, ServiceCatalogError>;

    async fn delete_service(&self, id: Uuid) -> Result<(), ServiceCatalogError>;

    async fn add_item(
        &self,
        service_id: Uuid,
        input: CreateServiceItemRequest,
    ) -> Result<ServiceItem, ServiceCatalogError>;

    async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateServiceItemRequest,
    ) -> Result<ServiceItem, ServiceCatalogError>;

    async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceCatalogError>;

    async fn stats(&self) -> Result<ServiceStats, ServiceCatalogError>;

    async fn list_technicians(
        &self,
        active_only: bool,
    ) -> Result<Vec<Technician>, ServiceCatalogError>;

    async fn create_technician(
        &self,
        input: CreateTechnicianRequest,
    ) -> Result<Technician, ServiceCatalogError>;
}

/// Service with its add-on items.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub service: Service,
    pub items: Vec<ServiceItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceCatalogError {
    #[error("Service type not found")]
    TypeNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service item not found")]
    ItemNotFound,

    #[error("Could not derive a slug from '{0}'")]
    InvalidSlug(String),

    #[error("No free slug left for '{0}'")]
    SlugExhausted(String),

    #[error("Service type still has {0} services")]
    TypeInUse(i64),

    #[error("Service has {0} bookings")]
    ServiceInUse(i64),

    #[error("Service item is used by {0} bookings")]
    ItemInUse(i64),

    #[error("Minimum price cannot exceed maximum price")]
    InvalidPriceRange,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ServiceCatalogError> for AppError {
    fn from(err: ServiceCatalogError) -> Self {
        match err {
            ServiceCatalogError::TypeNotFound
            | ServiceCatalogError::ServiceNotFound
            | ServiceCatalogError::ItemNotFound => AppError::NotFound(err.to_string()),
            ServiceCatalogError::TypeInUse(_)
            | ServiceCatalogError::ServiceInUse(_)
            | ServiceCatalogError::ItemInUse(_)
            | ServiceCatalogError::SlugExhausted(_) => AppError::Conflict(err.to_string()),
            ServiceCatalogError::InvalidSlug(_) | ServiceCatalogError::InvalidPriceRange => {
                AppError::BadRequest(err.to_string())
            }
            ServiceCatalogError::Repository(e) => e,
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct ServiceCatalogServiceImpl<T, S, K>
where
    T: ServiceTypeRepository,
    S: ServiceRepository,
    K: TechnicianRepository,
{
    type_repo: Arc<T>,
    service_repo: Arc<S>,
    technician_repo: Arc<K>,
}

impl<T, S, K> ServiceCatalogServiceImpl<T, S, K>
where
    T: ServiceTypeRepository,
    S: ServiceRepository,
    K: TechnicianRepository,
{
    pub fn new(type_repo: Arc<T>, service_repo: Arc<S>, technician_repo: Arc<K>) -> Self {
        Self {
            type_repo,
            service_repo,
            technician_repo,
        }
    }

    async fn find_type(&self, id: Uuid) -> Result<ServiceType, ServiceCatalogError> {
        self.type_repo
            .find_by_id(id)
            .await?
            .ok_or(ServiceCatalogError::TypeNotFound)
    }

    async fn find_service(&self, id: Uuid) -> Result<Service, ServiceCatalogError> {
        self.service_repo
            .find_by_id(id)
            .await?
            .ok_or(ServiceCatalogError::ServiceNotFound)
    }

    async fn find_item(&self, id: Uuid) -> Result<ServiceItem, ServiceCatalogError> {
        self.service_repo
            .find_item(id)
            .await?
            .ok_or(ServiceCatalogError::ItemNotFound)
    }

    async fn type_slug(&self, name: &str) -> Result<String, ServiceCatalogError> {
        let base = slugify(name);
        if base.is_empty() {
            return Err(ServiceCatalogError::InvalidSlug(name.to_string()));
        }
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.type_repo.slug_exists(&candidate, None).await? {
                return Ok(candidate);
            }
        }
        Err(ServiceCatalogError::SlugExhausted(base))
    }

    async fn service_slug(&self, name: &str) -> Result<String, ServiceCatalogError> {
        let base = slugify(name);
        if base.is_empty() {
            return Err(ServiceCatalogError::InvalidSlug(name.to_string()));
        }
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.service_repo.slug_exists(&candidate, None).await? {
                return Ok(candidate);
            }
        }
        Err(ServiceCatalogError::SlugExhausted(base))
    }

    async fn detail(&self, service: Service) -> Result<ServiceDetail, ServiceCatalogError> {
        let items = self.service_repo.items(service.id).await?;
        Ok(ServiceDetail { service, items })
    }
}

fn check_range(min: Option<i64>, max: Option<i64>) -> Result<(), ServiceCatalogError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ServiceCatalogError::InvalidPriceRange),
        _ => Ok(()),
    }
}

#[async_trait]
impl<T, S, K> ServiceCatalogService for ServiceCatalogServiceImpl<T, S, K>
where
    T: ServiceTypeRepository + 'static,
    S: ServiceRepository + 'static,
    K: TechnicianRepository + 'static,
{
    async fn list_types(&self) -> Result<Vec<ServiceType>, ServiceCatalogError> {
        Ok(self.type_repo.list().await?)
    }

    async fn get_type(&self, id: Uuid) -> Result<ServiceType, ServiceCatalogError> {
        self.find_type(id).await
    }

    async fn create_type(
        &self,
        input: CreateServiceTypeRequest,
    ) -> Result<ServiceType, ServiceCatalogError> {
        let name = input.name.trim().to_string();
        let slug = self.type_slug(&name).await?;
        let sort_order = self.type_repo.max_sort_order().await? + 1;
        let now = Utc::now();

        let service_type = ServiceType {
            id: Uuid::now_v7(),
            name,
            slug,
            description: trimmed(input.description),
            icon: trimmed(input.icon),
            sort_order,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        let created = self.type_repo.create(&service_type).await?;
        info!(type_id = %created.id, slug = %created.slug, "Service type created");
        Ok(created)
    }

    async fn update_type(
        &self,
        id: Uuid,
        input: UpdateServiceTypeRequest,
    ) -> Result<ServiceType, ServiceCatalogError> {
        let mut service_type = self.find_type(id).await?;
        if let Some(name) = input.name {
            service_type.name = name.trim().to_string();
        }
        if input.description.is_some() {
            service_type.description = trimmed(input.description);
        }
        if input.icon.is_some() {
            service_type.icon = trimmed(input.icon);
        }
        if let Some(sort_order) = input.sort_order {
            service_type.sort_order = sort_order;
        }
        if let Some(is_active) = input.is_active {
            service_type.is_active = is_active;
        }
        service_type.updated_at = Utc::now();
        Ok(self.type_repo.update(&service_type).await?)
    }

    async fn delete_type(&self, id: Uuid) -> Result<(), ServiceCatalogError> {
        self.find_type(id).await?;
        let services = self.type_repo.count_services(id).await?;
        if services > 0 {
            return Err(ServiceCatalogError::TypeInUse(services));
        }
        self.type_repo.delete(id).await?;
        info!(type_id = %id, "Service type deleted");
        Ok(())
    }

    async fn list_services(
        &self,
        type_id: Option<Uuid>,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<Paginated<Service>, ServiceCatalogError> {
        let (services, total) = self.service_repo.list(type_id, is_active, page).await?;
        Ok(Paginated::new(services, page, total))
    }

    async fn get_service(&self, id: Uuid) -> Result<ServiceDetail, ServiceCatalogError> {
        let service = self.find_service(id).await?;
        self.detail(service).await
    }

    async fn get_service_by_slug(&self, slug: &str) -> Result<ServiceDetail, ServiceCatalogError> {
        let service = self
            .service_repo
            .find_by_slug(slug)
            .await?
            .ok_or(ServiceCatalogError::ServiceNotFound)?;
        self.detail(service).await
    }

    async fn create_service(
        &self,
        input: CreateServiceRequest,
    ) -> Result<Service, ServiceCatalogError> {
        if let Some(type_id) = input.type_id {
            self.find_type(type_id).await?;
        }
        check_range(input.min_price, input.max_price)?;

        let name = input.name.trim().to_string();
        let slug = self.service_slug(&name).await?;
        let price_type = input.price_type.unwrap_or_default();
        let pricing = ServicePricing::normalize(
            price_type,
            input.base_price,
            input.min_price,
            input.max_price,
        );
        let now = Utc::now();

        let mut service = Service {
            id: Uuid::now_v7(),
            type_id: input.type_id,
            name,
            slug,
            description: trimmed(input.description),
            price_type,
            base_price: 0,
            min_price: None,
            max_price: None,
            duration_minutes: input.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            images: input.images,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        service.apply_pricing(pricing);

        let created = self.service_repo.create(&service).await?;
        info!(
            service_id = %created.id,
            slug = %created.slug,
            price_type = created.price_type.as_str(),
            "Service created"
        );
        Ok(created)
    }

    async fn update_service(
        &self,
        id: Uuid,
        input: UpdateServiceRequest,
    ) -> Result<Service, ServiceCatalogError> {
        let mut service = self.find_service(id).await?;

        if let Some(type_id) = input.type_id {
            self.find_type(type_id).await?;
            service.type_id = Some(type_id);
        }
        if let Some(name) = input.name {
            service.name = name.trim().to_string();
        }
        if input.description.is_some() {
            service.description = trimmed(input.description);
        }
        if let Some(duration) = input.duration_minutes {
            service.duration_minutes = duration;
        }
        if let Some(images) = input.images {
            service.images = images;
        }
        if let Some(is_active) = input.is_active {
            service.is_active = is_active;
        }

        let repriced = input.price_type.is_some()
            || input.base_price.is_some()
            || input.min_price.is_some()
            || input.max_price.is_some();
        if repriced {
            let min_price = input.min_price.or(service.min_price);
            let max_price = input.max_price.or(service.max_price);
            check_range(min_price, max_price)?;

            service.price_type = input.price_type.unwrap_or(service.price_type);
            let pricing = ServicePricing::normalize(
                service.price_type,
                input.base_price.or(Some(service.base_price)),
                min_price,
                max_price,
            );
            service.apply_pricing(pricing);
        }

        service.updated_at = Utc::now();
        Ok(self.service_repo.update(&service).await?)
    }

    async fn delete_service(&self, id: Uuid) -> Result<(), ServiceCatalogError> {
        self.find_service(id).await?;
        let bookings = self.service_repo.count_bookings(id).await?;
        if bookings > 0 {
            return Err(ServiceCatalogError::ServiceInUse(bookings));
        }
        self.service_repo.delete(id).await?;
        info!(service_id = %id, "Service deleted");
        Ok(())
    }

    async fn add_item(
        &self,
        service_id: Uuid,
        input: CreateServiceItemRequest,
    ) -> Result<ServiceItem, ServiceCatalogError> {
        self.find_service(service_id).await?;
        let now = Utc::now();
        let item = ServiceItem {
            id: Uuid::now_v7(),
            service_id,
            name: input.name.trim().to_string(),
            description: trimmed(input.description),
            price: input.price,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        Ok(self.service_repo.create_item(&item).await?)
    }

    async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateServiceItemRequest,
    ) -> Result<ServiceItem, ServiceCatalogError> {
        let mut item = self.find_item(item_id).await?;
        if let Some(name) = input.name {
            item.name = name.trim().to_string();
        }
        if input.description.is_some() {
            item.description = trimmed(input.description);
        }
        if let Some(price) = input.price {
            item.price = price;
        }
        if let Some(is_active) = input.is_active {
            item.is_active = is_active;
        }
        item.updated_at = Utc::now();
        Ok(self.service_repo.update_item(&item).await?)
    }

    async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceCatalogError> {
        self.find_item(item_id).await?;
        let bookings = self.service_repo.count_item_bookings(item_id).await?;
        if bookings > 0 {
            return Err(ServiceCatalogError::ItemInUse(bookings));
        }
        Ok(self.service_repo.delete_item(item_id).await?)
    }

    async fn stats(&self) -> Result<ServiceStats, ServiceCatalogError> {
        Ok(self.service_repo.stats().await?)
    }

    async fn list_technicians(
        &self,
        active_only: bool,
    ) -> Result<Vec<Technician>, ServiceCatalogError> {
        Ok(self.technician_repo.list(active_only).await?)
    }

    async fn create_technician(
        &self,
        input: CreateTechnicianRequest,
    ) -> Result<Technician, ServiceCatalogError> {
        let now = Utc::now();
        let technician = Technician {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            phone: input.phone.split_whitespace().collect(),
            email: trimmed(input.email).map(|e| e.to_lowercase()),
            skills: input
                .skills
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let created = self.technician_repo.create(&technician).await?;
        info!(technician_id = %created.id, "Technician created");
        Ok(created)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{
        MockServiceRepository, MockServiceTypeRepository, MockTechnicianRepository, PriceType,
    };
    use mockall::predicate::{always, eq};
    use pretty_assertions::assert_eq;

    pub(crate) fn service(base_price: i64) -> Service {
        let now = Utc::now();
        Service {
            id: Uuid::now_v7(),
            type_id: None,
            name: "Sửa ampli".into(),
            slug: "sua-ampli".into(),
            description: None,
            price_type: PriceType::Fixed,
            base_price,
            min_price: None,
            max_price: None,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            images: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_request(price_type: PriceType) -> CreateServiceRequest {
        CreateServiceRequest {
            type_id: None,
            name: "Sửa Ampli".into(),
            description: None,
            price_type: Some(price_type),
            base_price: Some(300_000),
            min_price: Some(200_000),
            max_price: Some(900_000),
            duration_minutes: None,
            images: vec![],
            is_active: None,
        }
    }

    fn build(
        types: MockServiceTypeRepository,
        services: MockServiceRepository,
    ) -> ServiceCatalogServiceImpl<
        MockServiceTypeRepository,
        MockServiceRepository,
        MockTechnicianRepository,
    > {
        ServiceCatalogServiceImpl::new(
            Arc::new(types),
            Arc::new(services),
            Arc::new(MockTechnicianRepository::new()),
        )
    }

    #[tokio::test]
    async fn type_gets_next_sort_order_and_unique_slug() {
        let mut types = MockServiceTypeRepository::new();
        types
            .expect_slug_exists()
            .with(eq("lap-dat"), always())
            .returning(|_, _| Ok(true));
        types
            .expect_slug_exists()
            .with(eq("lap-dat-1"), always())
            .returning(|_, _| Ok(false));
        types.expect_max_sort_order().returning(|| Ok(4));
        types.expect_create().returning(|t| Ok(t.clone()));

        let svc = build(types, MockServiceRepository::new());
        let created = svc
            .create_type(CreateServiceTypeRequest {
                name: "Lắp đặt".into(),
                description: None,
                icon: None,
                is_active: None,
            })
            .await
            .unwrap();

        assert_eq!(created.slug, "lap-dat-1");
        assert_eq!(created.sort_order, 5);
    }

    #[tokio::test]
    async fn range_services_take_base_from_minimum() {
        let mut services = MockServiceRepository::new();
        services.expect_slug_exists().returning(|_, _| Ok(false));
        services.expect_create().returning(|s| Ok(s.clone()));

        let svc = build(MockServiceTypeRepository::new(), services);
        let created = svc
            .create_service(create_request(PriceType::Range))
            .await
            .unwrap();

        assert_eq!(created.slug, "sua-ampli");
        assert_eq!(created.base_price, 200_000);
        assert_eq!(created.max_price, Some(900_000));
        assert_eq!(created.duration_minutes, DEFAULT_DURATION_MINUTES);
    }

    #[tokio::test]
    async fn contact_services_have_no_price() {
        let mut services = MockServiceRepository::new();
        services.expect_slug_exists().returning(|_, _| Ok(false));
        services.expect_create().returning(|s| Ok(s.clone()));

        let svc = build(MockServiceTypeRepository::new(), services);
        let created = svc
            .create_service(create_request(PriceType::Contact))
            .await
            .unwrap();
        assert_eq!((created.base_price, created.min_price), (0, None));
    }

    #[tokio::test]
    async fn booked_services_cannot_be_deleted() {
        let mut services = MockServiceRepository::new();
        services
            .expect_find_by_id()
            .returning(|_| Ok(Some(service(100_000))));
        services.expect_count_bookings().returning(|_| Ok(2));
        services.expect_delete().never();

        let svc = build(MockServiceTypeRepository::new(), services);
        let err = svc.delete_service(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn types_in_use_cannot_be_deleted() {
        let mut types = MockServiceTypeRepository::new();
        types.expect_find_by_id().returning(|id| {
            let now = Utc::now();
            Ok(Some(ServiceType {
                id,
                name: "Sửa chữa".into(),
                slug: "sua-chua".into(),
                description: None,
                icon: None,
                sort_order: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            }))
        });
        types.expect_count_services().returning(|_| Ok(3));
        types.expect_delete().never();

        let svc = build(types, MockServiceRepository::new());
        assert!(matches!(
            svc.delete_type(Uuid::now_v7()).await,
            Err(ServiceCatalogError::TypeInUse(3))
        ));
    }

    #[tokio::test]
    async fn inverted_price_range_is_rejected() {
        let svc = build(MockServiceTypeRepository::new(), MockServiceRepository::new());
        let mut request = create_request(PriceType::Range);
        request.min_price = Some(1_000_000);
        let err = svc.create_service(request).await.unwrap_err();
        assert!(matches!(err, ServiceCatalogError::InvalidPriceRange));
    }
}
