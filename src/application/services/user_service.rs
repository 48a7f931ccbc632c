//! User Administration Service
//!
//! Staff-facing account management: listing, profile and role edits,
//! deletion and signup statistics. Password changes live in `AuthService`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::application::dto::request::UpdateUserRequest;
use crate::domain::{User, UserFilter, UserRepository, UserRole, UserStats, UserSummary};
use crate::shared::error::AppError;
use crate::shared::pagination::Paginated;

#[async_trait]
pub trait UserService: Send + Sync {
    async fn list(&self, filter: UserFilter) -> Result<Paginated<UserSummary>, UserError>;

    async fn get(&self, id: Uuid) -> Result<User, UserError>;

    /// `acting_admin` may not take away their own admin role.
    async fn update(
        &self,
        id: Uuid,
        input: UpdateUserRequest,
        acting_admin: Uuid,
    ) -> Result<User, UserError>;

    /// Admin accounts, including the caller's, cannot be deleted.
    async fn delete(&self, id: Uuid, acting_admin: Uuid) -> Result<(), UserError>;

    async fn stats(&self) -> Result<UserStats, UserError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Admin accounts cannot be deleted")]
    AdminDeletion,

    #[error("You cannot remove your own admin role")]
    SelfDemotion,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::AdminDeletion | UserError::SelfDemotion => {
                AppError::Forbidden(err.to_string())
            }
            UserError::Repository(e) => e,
        }
    }
}

pub struct UserServiceImpl<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> UserServiceImpl<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    async fn find(&self, id: Uuid) -> Result<User, UserError> {
        self.user_repo.find_by_id(id).await?.ok_or(UserError::NotFound)
    }
}

#[async_trait]
impl<U> UserService for UserServiceImpl<U>
where
    U: UserRepository + 'static,
{
    async fn list(&self, filter: UserFilter) -> Result<Paginated<UserSummary>, UserError> {
        let (items, total) = self.user_repo.list(&filter).await?;
        Ok(Paginated::new(items, filter.page, total))
    }

    async fn get(&self, id: Uuid) -> Result<User, UserError> {
        self.find(id).await
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateUserRequest,
        acting_admin: Uuid,
    ) -> Result<User, UserError> {
        let mut user = self.find(id).await?;

        if let Some(role) = input.role {
            if id == acting_admin && role != UserRole::Admin {
                return Err(UserError::SelfDemotion);
            }
            if role != user.role {
                info!(user_id = %id, from = %user.role, to = %role, "User role changed");
            }
            user.role = role;
        }
        if let Some(full_name) = input.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(phone) = input.phone {
            user.phone = Some(phone);
        }
        user.updated_at = Utc::now();

        Ok(self.user_repo.update(&user).await?)
    }

    async fn delete(&self, id: Uuid, acting_admin: Uuid) -> Result<(), UserError> {
        let user = self.find(id).await?;
        if user.is_admin() || id == acting_admin {
            return Err(UserError::AdminDeletion);
        }

        self.user_repo.delete(id).await?;
        info!(user_id = %id, deleted_by = %acting_admin, "User deleted");
        Ok(())
    }

    async fn stats(&self) -> Result<UserStats, UserError> {
        Ok(self.user_repo.stats(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockUserRepository;
    use crate::shared::pagination::PageRequest;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn customer() -> User {
        User::new_customer("an@example.com", "h".into(), "Nguyễn An", None)
    }

    fn admin() -> User {
        User {
            role: UserRole::Admin,
            ..User::new_customer("staff@audiotailoc.vn", "h".into(), "Staff", None)
        }
    }

    fn no_changes() -> UpdateUserRequest {
        UpdateUserRequest {
            full_name: None,
            phone: None,
            role: None,
        }
    }

    fn service(users: MockUserRepository) -> UserServiceImpl<MockUserRepository> {
        UserServiceImpl::new(Arc::new(users))
    }

    #[tokio::test]
    async fn list_wraps_the_page() {
        let mut users = MockUserRepository::new();
        users.expect_list().returning(|_| {
            Ok((
                vec![UserSummary {
                    user: customer(),
                    order_count: 3,
                }],
                41,
            ))
        });

        let filter = UserFilter {
            page: PageRequest::new(Some(2), Some(20)),
            ..Default::default()
        };
        let page = service(users).list(filter).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pagination.total, 41);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn update_changes_profile_and_role() {
        let user = customer();
        let id = user.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(id))
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| u.role == UserRole::Admin && u.full_name == "Trần Bình")
            .returning(|u| Ok(u.clone()));

        let input = UpdateUserRequest {
            full_name: Some("  Trần Bình ".into()),
            role: Some(UserRole::Admin),
            ..no_changes()
        };
        let updated = service(users).update(id, input, Uuid::now_v7()).await.unwrap();

        assert_eq!(updated.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn admin_cannot_demote_themselves() {
        let me = admin();
        let my_id = me.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(me.clone())));
        users.expect_update().never();

        let input = UpdateUserRequest {
            role: Some(UserRole::User),
            ..no_changes()
        };
        let err = service(users).update(my_id, input, my_id).await.unwrap_err();

        assert!(matches!(err, UserError::SelfDemotion));
    }

    #[tokio::test]
    async fn admin_accounts_are_not_deleted() {
        let staff = admin();
        let id = staff.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(staff.clone())));
        users.expect_delete().never();

        let err = service(users).delete(id, Uuid::now_v7()).await.unwrap_err();

        assert!(matches!(err, UserError::AdminDeletion));
        assert!(matches!(AppError::from(err), AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn customers_are_deleted_through_the_repository() {
        let user = customer();
        let id = user.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_delete().with(eq(id)).times(1).returning(|_| Ok(()));

        service(users).delete(id, Uuid::now_v7()).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_a_user_with_orders_surfaces_the_conflict() {
        let user = customer();
        let id = user.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_delete().returning(|_| {
            Err(AppError::Conflict("User has 2 orders and cannot be deleted".into()))
        });

        let err = service(users).delete(id, Uuid::now_v7()).await.unwrap_err();

        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let err = service(users).get(Uuid::now_v7()).await.unwrap_err();

        assert!(matches!(err, UserError::NotFound));
    }
}
