use std::sync::Arc;

use academy_core::model::{Role, User, UserId};
use storage::repository::{NewUserRecord, UserRepository};
use tracing::info;

use crate::error::{Entity, UserServiceError};

/// Registers and looks up people known to the academy.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Validate and persist a new user.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::User` for a blank username.
    /// Returns `UserServiceError::Storage` if the username is taken or persistence fails.
    pub async fn register(
        &self,
        username: &str,
        full_name: &str,
        email: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        let draft = User::new(UserId::new(0), username, full_name, email, role)?;
        let id = self
            .users
            .insert_user(NewUserRecord::from_user(&draft))
            .await?;
        info!(user_id = %id, role = %role, "registered user");
        Ok(User::new(id, draft.username(), draft.full_name(), draft.email(), role)?)
    }

    /// Fetch a user, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` for unknown ids.
    pub async fn get(&self, id: UserId) -> Result<User, UserServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(Entity::User, id.to_string()))
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn with_role(&self, role: Role) -> Result<Vec<User>, UserServiceError> {
        Ok(self.users.users_with_role(role).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{Storage, StorageError};

    #[tokio::test]
    async fn register_then_get() {
        let service = UserService::new(Storage::in_memory().users);
        let user = service
            .register(" ann ", "Ann Smith", "ann@example.com", Role::Student)
            .await
            .unwrap();
        assert_eq!(user.username(), "ann");
        assert_eq!(service.get(user.id()).await.unwrap(), user);
        assert_eq!(service.with_role(Role::Student).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let service = UserService::new(Storage::in_memory().users);
        service.register("ann", "", "", Role::Student).await.unwrap();
        let err = service
            .register("ann", "", "", Role::Instructor)
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Storage(StorageError::Conflict)));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let service = UserService::new(Storage::in_memory().users);
        assert!(matches!(
            service.get(UserId::new(99)).await,
            Err(UserServiceError::NotFound(Entity::User, _))
        ));
    }
}
