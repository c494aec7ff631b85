use async_trait::async_trait;

use crate::{auth::repo_types::User, store::StoreError};

/// Access to the user collection.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Find a user by (normalized) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Persist a new user. Fails with `Duplicate("email")` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
}
