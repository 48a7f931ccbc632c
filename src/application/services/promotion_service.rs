//! Promotion Service
//!
//! Discount code validation and promotion administration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::application::dto::request::{CreatePromotionRequest, UpdatePromotionRequest};
use crate::domain::{
    Promotion, PromotionRejection, PromotionRepository, PromotionStats, PromotionType,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};

const MAX_COPY_ATTEMPTS: u32 = 100;

#[async_trait]
pub trait PromotionService: Send + Sync {
    async fn validate(
        &self,
        code: &str,
        order_amount: i64,
    ) -> Result<AppliedPromotion, PromotionError>;

    async fn list(
        &self,
        active: Option<bool>,
        page: PageRequest,
    ) -> Result<Paginated<Promotion>, PromotionError>;

    async fn get(&self, id: Uuid) -> Result<Promotion, PromotionError>;

    async fn create(&self, input: CreatePromotionRequest) -> Result<Promotion, PromotionError>;

    async fn update(&self, id: Uuid, input: UpdatePromotionRequest)
        -> Result<Promotion, PromotionError>;

    async fn delete(&self, id: Uuid) -> Result<(), PromotionError>;

    async fn toggle_active(&self, id: Uuid) -> Result<Promotion, PromotionError>;

    /// Inactive copy under `<CODE>_COPY_<n>` with usage reset.
    async fn duplicate(&self, id: Uuid) -> Result<Promotion, PromotionError>;

    async fn stats(&self) -> Result<PromotionStats, PromotionError>;
}

/// A code that passed validation for a given order amount.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppliedPromotion {
    pub promotion_id: Uuid,
    pub code: String,
    pub name: String,
    pub promo_type: PromotionType,
    pub discount: i64,
    pub free_shipping: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("Promotion not found")]
    NotFound,

    #[error("{0}")]
    Rejected(#[from] PromotionRejection),

    #[error("Promotion code '{0}' already exists")]
    CodeExists(String),

    #[error("Percentage promotions cannot exceed 100")]
    PercentageTooLarge,

    #[error("Promotion must start before it expires")]
    InvalidWindow,

    #[error("Could not generate a unique copy code")]
    CopyCodeExhausted,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<PromotionError> for AppError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::NotFound => AppError::NotFound(err.to_string()),
            PromotionError::CodeExists(_) => AppError::Conflict(err.to_string()),
            PromotionError::Rejected(_)
            | PromotionError::PercentageTooLarge
            | PromotionError::InvalidWindow => AppError::BadRequest(err.to_string()),
            PromotionError::CopyCodeExhausted => AppError::Internal(err.to_string()),
            PromotionError::Repository(e) => e,
        }
    }
}

/// Look up a code and check it against the order amount.
pub async fn apply_code<R: PromotionRepository + ?Sized>(
    repo: &R,
    code: &str,
    order_amount: i64,
    now: DateTime<Utc>,
) -> Result<(Promotion, AppliedPromotion), PromotionError> {
    let promotion = repo
        .find_by_code(&Promotion::normalize_code(code))
        .await?
        .ok_or(PromotionRejection::NotFound)?;

    promotion.check_applicable(order_amount, now)?;

    let applied = AppliedPromotion {
        promotion_id: promotion.id,
        code: promotion.code.clone(),
        name: promotion.name.clone(),
        promo_type: promotion.promo_type,
        discount: promotion.discount_for(order_amount),
        free_shipping: promotion.grants_free_shipping(),
    };
    Ok((promotion, applied))
}

fn check_rules(promotion: &Promotion) -> Result<(), PromotionError> {
    if promotion.promo_type == PromotionType::Percentage && promotion.value > 100 {
        return Err(PromotionError::PercentageTooLarge);
    }
    if let (Some(start), Some(end)) = (promotion.starts_at, promotion.expires_at) {
        if start >= end {
            return Err(PromotionError::InvalidWindow);
        }
    }
    Ok(())
}

pub struct PromotionServiceImpl<R>
where
    R: PromotionRepository,
{
    promotion_repo: Arc<R>,
}

impl<R> PromotionServiceImpl<R>
where
    R: PromotionRepository,
{
    pub fn new(promotion_repo: Arc<R>) -> Self {
        Self { promotion_repo }
    }

    async fn find(&self, id: Uuid) -> Result<Promotion, PromotionError> {
        self.promotion_repo
            .find_by_id(id)
            .await?
            .ok_or(PromotionError::NotFound)
    }
}

#[async_trait]
impl<R> PromotionService for PromotionServiceImpl<R>
where
    R: PromotionRepository + 'static,
{
    async fn validate(
        &self,
        code: &str,
        order_amount: i64,
    ) -> Result<AppliedPromotion, PromotionError> {
        let (_, applied) =
            apply_code(self.promotion_repo.as_ref(), code, order_amount, Utc::now()).await?;
        Ok(applied)
    }

    async fn list(
        &self,
        active: Option<bool>,
        page: PageRequest,
    ) -> Result<Paginated<Promotion>, PromotionError> {
        let (items, total) = self.promotion_repo.list(active, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    async fn get(&self, id: Uuid) -> Result<Promotion, PromotionError> {
        self.find(id).await
    }

    async fn create(&self, input: CreatePromotionRequest) -> Result<Promotion, PromotionError> {
        let code = Promotion::normalize_code(&input.code);
        if self.promotion_repo.code_exists(&code).await? {
            return Err(PromotionError::CodeExists(code));
        }

        let now = Utc::now();
        let promotion = Promotion {
            id: Uuid::now_v7(),
            code,
            name: input.name.trim().to_string(),
            description: input.description,
            promo_type: input.promo_type,
            value: input.value,
            min_order_amount: input.min_order_amount,
            max_discount: input.max_discount,
            usage_limit: input.usage_limit,
            usage_count: 0,
            is_active: input.is_active.unwrap_or(true),
            starts_at: input.starts_at,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };
        check_rules(&promotion)?;

        let created = self.promotion_repo.create(&promotion).await?;
        info!(promotion_id = %created.id, code = %created.code, "Promotion created");
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdatePromotionRequest,
    ) -> Result<Promotion, PromotionError> {
        let mut promotion = self.find(id).await?;

        if let Some(code) = input.code {
            let code = Promotion::normalize_code(&code);
            if code != promotion.code && self.promotion_repo.code_exists(&code).await? {
                return Err(PromotionError::CodeExists(code));
            }
            promotion.code = code;
        }
        if let Some(name) = input.name {
            promotion.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            promotion.description = Some(description);
        }
        if let Some(promo_type) = input.promo_type {
            promotion.promo_type = promo_type;
        }
        if let Some(value) = input.value {
            promotion.value = value;
        }
        if let Some(min) = input.min_order_amount {
            promotion.min_order_amount = Some(min);
        }
        if let Some(max) = input.max_discount {
            promotion.max_discount = Some(max);
        }
        if let Some(limit) = input.usage_limit {
            promotion.usage_limit = Some(limit);
        }
        if let Some(active) = input.is_active {
            promotion.is_active = active;
        }
        if let Some(starts_at) = input.starts_at {
            promotion.starts_at = Some(starts_at);
        }
        if let Some(expires_at) = input.expires_at {
            promotion.expires_at = Some(expires_at);
        }
        check_rules(&promotion)?;
        promotion.updated_at = Utc::now();

        Ok(self.promotion_repo.update(&promotion).await?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), PromotionError> {
        self.find(id).await?;
        self.promotion_repo.delete(id).await?;
        info!(promotion_id = %id, "Promotion deleted");
        Ok(())
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Promotion, PromotionError> {
        let mut promotion = self.find(id).await?;
        promotion.is_active = !promotion.is_active;
        promotion.updated_at = Utc::now();
        Ok(self.promotion_repo.update(&promotion).await?)
    }

    async fn duplicate(&self, id: Uuid) -> Result<Promotion, PromotionError> {
        let source = self.find(id).await?;

        let mut code = None;
        for n in 1..=MAX_COPY_ATTEMPTS {
            let candidate = format!("{}_COPY_{}", source.code, n);
            if !self.promotion_repo.code_exists(&candidate).await? {
                code = Some(candidate);
                break;
            }
        }
        let code = code.ok_or(PromotionError::CopyCodeExhausted)?;

        let now = Utc::now();
        let copy = Promotion {
            id: Uuid::now_v7(),
            code,
            name: format!("{} (copy)", source.name),
            usage_count: 0,
            is_active: false,
            created_at: now,
            updated_at: now,
            ..source
        };

        let created = self.promotion_repo.create(&copy).await?;
        info!(source_id = %id, code = %created.code, "Promotion duplicated");
        Ok(created)
    }

    async fn stats(&self) -> Result<PromotionStats, PromotionError> {
        Ok(self.promotion_repo.stats(Utc::now()).await?)
    }
}
