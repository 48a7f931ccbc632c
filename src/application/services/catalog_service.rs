//! Catalog Service
//!
//! Products and categories. Listings are cached; every write bumps the
//! product version key so stale pages are never served.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::request::{
    CreateCategoryRequest, CreateProductRequest, UpdateCategoryRequest, UpdateProductRequest,
};
use crate::domain::{
    Category, CategoryRepository, InventoryRepository, Product, ProductFilter, ProductRepository,
};
use crate::infrastructure::cache::{keys, Cache};
use crate::shared::error::AppError;
use crate::shared::pagination::Paginated;
use crate::shared::slug::{sku_base, sku_candidate, slugify, with_suffix};

const MAX_SKU_ATTEMPTS: u32 = 999;
const MAX_SLUG_ATTEMPTS: u32 = 100;

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Paginated<Product>, CatalogError>;

    async fn get_product(&self, id: Uuid) -> Result<ProductDetail, CatalogError>;

    async fn get_product_by_slug(&self, slug: &str) -> Result<ProductDetail, CatalogError>;

    async fn create_product(&self, input: CreateProductRequest) -> Result<Product, CatalogError>;

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductRequest,
    ) -> Result<Product, CatalogError>;

    async fn delete_product(&self, id: Uuid) -> Result<(), CatalogError>;

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError>;

    async fn create_category(&self, input: CreateCategoryRequest)
        -> Result<Category, CatalogError>;

    async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategoryRequest,
    ) -> Result<Category, CatalogError>;

    async fn delete_category(&self, id: Uuid) -> Result<(), CatalogError>;
}

/// Product with its current availability.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub available_stock: i32,
    pub in_stock: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Parent category not found")]
    ParentNotFound,

    #[error("A category cannot be its own parent")]
    SelfParent,

    #[error("Slug '{0}' is already in use")]
    SlugTaken(String),

    #[error("SKU '{0}' is already in use")]
    SkuTaken(String),

    #[error("Could not derive a slug from '{0}'")]
    InvalidSlug(String),

    #[error("Product is referenced by existing orders")]
    ProductInUse,

    #[error("Category still has products or subcategories")]
    CategoryInUse,

    #[error("Could not generate a unique {0}")]
    Exhausted(&'static str),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound
            | CatalogError::CategoryNotFound
            | CatalogError::ParentNotFound => AppError::NotFound(err.to_string()),
            CatalogError::SlugTaken(_) | CatalogError::SkuTaken(_) => {
                AppError::Conflict(err.to_string())
            }
            CatalogError::SelfParent
            | CatalogError::InvalidSlug(_)
            | CatalogError::ProductInUse
            | CatalogError::CategoryInUse => AppError::BadRequest(err.to_string()),
            CatalogError::Exhausted(_) => AppError::Internal(err.to_string()),
            CatalogError::Repository(e) => e,
        }
    }
}

pub struct CatalogServiceImpl<P, G, I, C>
where
    P: ProductRepository,
    G: CategoryRepository,
    I: InventoryRepository,
    C: Cache,
{
    product_repo: Arc<P>,
    category_repo: Arc<G>,
    inventory_repo: Arc<I>,
    cache: Arc<C>,
}

impl<P, G, I, C> CatalogServiceImpl<P, G, I, C>
where
    P: ProductRepository,
    G: CategoryRepository,
    I: InventoryRepository,
    C: Cache,
{
    pub fn new(
        product_repo: Arc<P>,
        category_repo: Arc<G>,
        inventory_repo: Arc<I>,
        cache: Arc<C>,
    ) -> Self {
        Self {
            product_repo,
            category_repo,
            inventory_repo,
            cache,
        }
    }

    async fn products_version(&self) -> i64 {
        match self.cache.get::<i64>(keys::PRODUCTS_VERSION).await {
            Ok(version) => version.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "Failed to read product cache version");
                0
            }
        }
    }

    async fn invalidate_products(&self) {
        if let Err(e) = self.cache.incr(keys::PRODUCTS_VERSION).await {
            warn!(error = %e, "Failed to bump product cache version");
        }
    }

    async fn invalidate_categories(&self) {
        if let Err(e) = self.cache.delete(keys::CATEGORIES).await {
            warn!(error = %e, "Failed to drop cached categories");
        }
    }

    async fn detail(&self, product: Product) -> Result<ProductDetail, CatalogError> {
        let available = self
            .inventory_repo
            .find(product.id)
            .await?
            .map(|level| level.available())
            .unwrap_or(0);

        Ok(ProductDetail {
            in_stock: available > 0,
            available_stock: available,
            product,
        })
    }

    async fn product_slug(
        &self,
        requested: Option<&str>,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<String, CatalogError> {
        if let Some(requested) = requested {
            let slug = slugify(requested);
            if slug.is_empty() {
                return Err(CatalogError::InvalidSlug(requested.to_string()));
            }
            if self.product_repo.slug_exists(&slug, exclude).await? {
                return Err(CatalogError::SlugTaken(slug));
            }
            return Ok(slug);
        }

        let base = slugify(name);
        if base.is_empty() {
            return Err(CatalogError::InvalidSlug(name.to_string()));
        }
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.product_repo.slug_exists(&candidate, exclude).await? {
                return Ok(candidate);
            }
        }
        Err(CatalogError::Exhausted("slug"))
    }

    async fn product_sku(
        &self,
        requested: Option<&str>,
        name: &str,
    ) -> Result<String, CatalogError> {
        if let Some(requested) = requested {
            let sku = requested.trim().to_uppercase();
            if self.product_repo.sku_exists(&sku).await? {
                return Err(CatalogError::SkuTaken(sku));
            }
            return Ok(sku);
        }

        let base = sku_base(name);
        for counter in 1..=MAX_SKU_ATTEMPTS {
            let candidate = sku_candidate(&base, counter);
            if !self.product_repo.sku_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(CatalogError::Exhausted("SKU"))
    }

    async fn ensure_category(&self, id: Option<Uuid>) -> Result<(), CatalogError> {
        if let Some(id) = id {
            self.category_repo
                .find_by_id(id)
                .await?
                .ok_or(CatalogError::CategoryNotFound)?;
        }
        Ok(())
    }

    async fn category_slug(
        &self,
        requested: Option<&str>,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<String, CatalogError> {
        let source = requested.unwrap_or(name);
        let slug = slugify(source);
        if slug.is_empty() {
            return Err(CatalogError::InvalidSlug(source.to_string()));
        }
        if self.category_repo.slug_exists(&slug, exclude).await? {
            return Err(CatalogError::SlugTaken(slug));
        }
        Ok(slug)
    }
}

#[async_trait]
impl<P, G, I, C> CatalogService for CatalogServiceImpl<P, G, I, C>
where
    P: ProductRepository + 'static,
    G: CategoryRepository + 'static,
    I: InventoryRepository + 'static,
    C: Cache + 'static,
{
    #[instrument(skip(self))]
    async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Paginated<Product>, CatalogError> {
        let key = keys::product_list(self.products_version().await, filter.cache_fragment());

        match self.cache.get::<Paginated<Product>>(&key).await {
            Ok(Some(page)) => {
                debug!(key = %key, "Product list cache hit");
                return Ok(page);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Product list cache read failed"),
        }

        let (products, total) = self.product_repo.list(&filter).await?;
        let page = Paginated::new(products, filter.page, total);

        if let Err(e) = self.cache.set_ex(&key, &page, keys::PRODUCT_LIST_TTL).await {
            warn!(error = %e, "Product list cache write failed");
        }
        Ok(page)
    }

    async fn get_product(&self, id: Uuid) -> Result<ProductDetail, CatalogError> {
        let product = self
            .product_repo
            .find_by_id(id)
            .await?
            .filter(Product::is_available)
            .ok_or(CatalogError::ProductNotFound)?;
        self.detail(product).await
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<ProductDetail, CatalogError> {
        let product = self
            .product_repo
            .find_by_slug(slug)
            .await?
            .filter(Product::is_available)
            .ok_or(CatalogError::ProductNotFound)?;
        self.detail(product).await
    }

    async fn create_product(&self, input: CreateProductRequest) -> Result<Product, CatalogError> {
        let name = input.name.trim().to_string();
        self.ensure_category(input.category_id).await?;

        let slug = self.product_slug(input.slug.as_deref(), &name, None).await?;
        let sku = self.product_sku(input.sku.as_deref(), &name).await?;

        let short_description = input.short_description.or_else(|| {
            input
                .description
                .as_deref()
                .map(Product::derive_short_description)
        });

        let now = Utc::now();
        let product = Product {
            id: Uuid::now_v7(),
            category_id: input.category_id,
            meta_title: input.meta_title.or_else(|| Some(name.clone())),
            name,
            slug,
            sku,
            description: input.description,
            short_description,
            price: input.price,
            original_price: input.original_price,
            images: input.images,
            is_active: input.is_active.unwrap_or(true),
            is_featured: input.is_featured.unwrap_or(false),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .product_repo
            .create(&product, input.initial_stock.unwrap_or(0))
            .await?;
        self.invalidate_products().await;

        info!(product_id = %created.id, sku = %created.sku, "Product created");
        Ok(created)
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductRequest,
    ) -> Result<Product, CatalogError> {
        let mut product = self
            .product_repo
            .find_by_id(id)
            .await?
            .filter(|p| p.deleted_at.is_none())
            .ok_or(CatalogError::ProductNotFound)?;

        if let Some(slug) = input.slug.as_deref() {
            product.slug = self.product_slug(Some(slug), &product.name, Some(id)).await?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(Some(category_id)).await?;
            product.category_id = Some(category_id);
        }
        if let Some(name) = input.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            if input.short_description.is_none() && product.short_description.is_none() {
                product.short_description = Some(Product::derive_short_description(&description));
            }
            product.description = Some(description);
        }
        if let Some(short) = input.short_description {
            product.short_description = Some(short);
        }
        if let Some(price) = input.price {
            product.price = price;
        }
        if let Some(original_price) = input.original_price {
            product.original_price = Some(original_price);
        }
        if let Some(images) = input.images {
            product.images = images;
        }
        if let Some(active) = input.is_active {
            product.is_active = active;
        }
        if let Some(featured) = input.is_featured {
            product.is_featured = featured;
        }
        if let Some(meta_title) = input.meta_title {
            product.meta_title = Some(meta_title);
        }
        product.updated_at = Utc::now();

        let updated = self.product_repo.update(&product).await?;
        self.invalidate_products().await;

        info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), CatalogError> {
        self.product_repo
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        if self.product_repo.count_order_items(id).await? > 0 {
            return Err(CatalogError::ProductInUse);
        }

        self.product_repo.delete(id).await?;
        self.invalidate_products().await;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        match self.cache.get::<Vec<Category>>(keys::CATEGORIES).await {
            Ok(Some(categories)) => return Ok(categories),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Category cache read failed"),
        }

        let categories = self.category_repo.list().await?;
        if let Err(e) = self
            .cache
            .set_ex(keys::CATEGORIES, &categories, keys::CATEGORIES_TTL)
            .await
        {
            warn!(error = %e, "Category cache write failed");
        }
        Ok(categories)
    }

    async fn create_category(
        &self,
        input: CreateCategoryRequest,
    ) -> Result<Category, CatalogError> {
        if let Some(parent_id) = input.parent_id {
            self.category_repo
                .find_by_id(parent_id)
                .await?
                .ok_or(CatalogError::ParentNotFound)?;
        }

        let name = input.name.trim().to_string();
        let slug = self.category_slug(input.slug.as_deref(), &name, None).await?;
        let category = Category::new(name, slug, input.description, input.parent_id);

        let created = self.category_repo.create(&category).await?;
        self.invalidate_categories().await;

        info!(category_id = %created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategoryRequest,
    ) -> Result<Category, CatalogError> {
        let mut category = self
            .category_repo
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound)?;

        if let Some(parent_id) = input.parent_id {
            if parent_id == id {
                return Err(CatalogError::SelfParent);
            }
            self.category_repo
                .find_by_id(parent_id)
                .await?
                .ok_or(CatalogError::ParentNotFound)?;
            category.parent_id = Some(parent_id);
        }
        if let Some(slug) = input.slug.as_deref() {
            category.slug = self.category_slug(Some(slug), &category.name, Some(id)).await?;
        }
        if let Some(name) = input.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            category.description = Some(description);
        }
        if let Some(active) = input.is_active {
            category.is_active = active;
        }
        category.updated_at = Utc::now();

        let updated = self.category_repo.update(&category).await?;
        self.invalidate_categories().await;
        Ok(updated)
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), CatalogError> {
        self.category_repo
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound)?;

        if self.category_repo.count_products(id).await? > 0
            || self.category_repo.count_children(id).await? > 0
        {
            return Err(CatalogError::CategoryInUse);
        }

        self.category_repo.delete(id).await?;
        self.invalidate_categories().await;

        info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InventoryLevel, MockCategoryRepository, MockInventoryRepository, MockProductRepository,
    };
    use crate::infrastructure::cache::MemoryCache;
    use pretty_assertions::assert_eq;

    type Svc = CatalogServiceImpl<
        MockProductRepository,
        MockCategoryRepository,
        MockInventoryRepository,
        MemoryCache,
    >;

    fn service(
        products: MockProductRepository,
        categories: MockCategoryRepository,
        inventory: MockInventoryRepository,
        cache: Arc<MemoryCache>,
    ) -> Svc {
        CatalogServiceImpl::new(
            Arc::new(products),
            Arc::new(categories),
            Arc::new(inventory),
            cache,
        )
    }

    fn product(name: &str) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::now_v7(),
            category_id: None,
            name: name.into(),
            slug: slugify(name),
            sku: sku_candidate(&sku_base(name), 1),
            description: None,
            short_description: None,
            price: 1_000_000,
            original_price: None,
            images: vec![],
            is_active: true,
            is_featured: false,
            meta_title: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_request(name: &str) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            slug: None,
            sku: None,
            category_id: None,
            description: Some("d".repeat(300)),
            short_description: None,
            price: 2_500_000,
            original_price: None,
            images: vec![],
            is_active: None,
            is_featured: None,
            meta_title: None,
            initial_stock: Some(5),
        }
    }

    #[tokio::test]
    async fn product_list_is_served_from_cache_until_a_write() {
        let mut products = MockProductRepository::new();
        products
            .expect_list()
            .times(2)
            .returning(|_| Ok((vec![product("Loa JBL")], 1)));
        products
            .expect_find_by_id()
            .returning(|_| Ok(Some(product("Loa JBL"))));
        products.expect_count_order_items().returning(|_| Ok(0));
        products.expect_delete().returning(|_| Ok(()));

        let svc = service(
            products,
            MockCategoryRepository::new(),
            MockInventoryRepository::new(),
            Arc::new(MemoryCache::default()),
        );

        svc.list_products(ProductFilter::default()).await.unwrap();
        svc.list_products(ProductFilter::default()).await.unwrap();

        svc.delete_product(Uuid::now_v7()).await.unwrap();
        let page = svc.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn create_generates_slug_sku_and_defaults() {
        let mut products = MockProductRepository::new();
        products
            .expect_slug_exists()
            .returning(|slug, _| Ok(slug == "loa-keo-sony"));
        products
            .expect_sku_exists()
            .returning(|sku| Ok(sku == "LOAKEOSO-001"));
        products
            .expect_create()
            .withf(|_, stock| *stock == 5)
            .returning(|p, _| Ok(p.clone()));

        let cache = Arc::new(MemoryCache::default());
        let svc = service(
            products,
            MockCategoryRepository::new(),
            MockInventoryRepository::new(),
            cache.clone(),
        );

        let created = svc.create_product(create_request("Loa kéo Sony")).await.unwrap();
        assert_eq!(created.slug, "loa-keo-sony-1");
        assert_eq!(created.sku, "LOAKEOSO-002");
        assert_eq!(created.short_description.unwrap().chars().count(), 200);
        assert_eq!(created.meta_title.as_deref(), Some("Loa kéo Sony"));
        assert!(cache.contains(keys::PRODUCTS_VERSION));
    }

    #[tokio::test]
    async fn create_rejects_taken_explicit_slug() {
        let mut products = MockProductRepository::new();
        products.expect_slug_exists().returning(|_, _| Ok(true));

        let svc = service(
            products,
            MockCategoryRepository::new(),
            MockInventoryRepository::new(),
            Arc::new(MemoryCache::default()),
        );

        let mut req = create_request("Loa");
        req.slug = Some("loa".into());
        let err = svc.create_product(req).await.unwrap_err();
        assert!(matches!(err, CatalogError::SlugTaken(s) if s == "loa"));
    }

    #[tokio::test]
    async fn delete_refuses_ordered_products() {
        let mut products = MockProductRepository::new();
        products
            .expect_find_by_id()
            .returning(|_| Ok(Some(product("Amply"))));
        products.expect_count_order_items().returning(|_| Ok(2));
        products.expect_delete().never();

        let svc = service(
            products,
            MockCategoryRepository::new(),
            MockInventoryRepository::new(),
            Arc::new(MemoryCache::default()),
        );

        let err = svc.delete_product(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductInUse));
    }

    #[tokio::test]
    async fn product_detail_reports_availability_and_hides_inactive() {
        let active = product("Micro");
        let active_id = active.id;
        let mut inactive = product("Cũ");
        inactive.is_active = false;

        let mut products = MockProductRepository::new();
        products.expect_find_by_id().returning(move |id| {
            Ok(Some(if id == active_id { active.clone() } else { inactive.clone() }))
        });

        let mut inventory = MockInventoryRepository::new();
        inventory.expect_find().returning(|pid| {
            let mut level = InventoryLevel::empty(pid);
            level.stock = 10;
            level.reserved = 4;
            Ok(Some(level))
        });

        let svc = service(
            products,
            MockCategoryRepository::new(),
            inventory,
            Arc::new(MemoryCache::default()),
        );

        let detail = svc.get_product(active_id).await.unwrap();
        assert_eq!(detail.available_stock, 6);
        assert!(detail.in_stock);

        let err = svc.get_product(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound));
    }

    #[tokio::test]
    async fn delete_category_refuses_when_children_exist() {
        let mut categories = MockCategoryRepository::new();
        categories
            .expect_find_by_id()
            .returning(|_| Ok(Some(Category::new("Loa", "loa", None, None))));
        categories.expect_count_products().returning(|_| Ok(0));
        categories.expect_count_children().returning(|_| Ok(1));

        let svc = service(
            MockProductRepository::new(),
            categories,
            MockInventoryRepository::new(),
            Arc::new(MemoryCache::default()),
        );

        let err = svc.delete_category(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CatalogError::CategoryInUse));
    }

    #[tokio::test]
    async fn categories_are_cached() {
        let mut categories = MockCategoryRepository::new();
        categories
            .expect_list()
            .times(1)
            .returning(|| Ok(vec![Category::new("Loa", "loa", None, None)]));

        let svc = service(
            MockProductRepository::new(),
            categories,
            MockInventoryRepository::new(),
            Arc::new(MemoryCache::default()),
        );

        assert_eq!(svc.list_categories().await.unwrap().len(), 1);
        assert_eq!(svc.list_categories().await.unwrap().len(), 1);
    }
}
