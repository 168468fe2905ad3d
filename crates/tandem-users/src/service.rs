//! The users service: writes go to the primary store and are projected into
//! the secondary store, reads are served from the cached secondary store.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tandem_cache::CacheAside;
use tandem_core::OperationOverride;
use tandem_storage::{CachedRecordStore, DualStoreSynchronizer, RecordStore, SyncOutcome};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, instrument};

use crate::error::{UserError, UserResult};
use crate::model::{NewUser, User, UserPatch, validate_password_strength};
use crate::operations::{
    EMAIL_VERIFICATION_TOKEN_FIELD, PASSWORD_RESET_TOKEN_FIELD, UserScopes, primary_table,
    secondary_table,
};
use crate::password::{PasswordHasher, is_hashed};

type UserStore = Arc<dyn RecordStore<User>>;

/// Raw store handles the service is assembled from.
#[derive(Clone)]
pub struct UserStores {
    pub primary: UserStore,
    pub secondary: UserStore,
}

pub struct UsersService {
    primary: CachedRecordStore<User, UserStore>,
    secondary: CachedRecordStore<User, UserStore>,
    sync: DualStoreSynchronizer<User>,
    hasher: PasswordHasher,
}

impl UsersService {
    /// Wraps both stores with the users operation tables, adjusted by `overrides`.
    pub fn new(
        stores: UserStores,
        cache: Arc<CacheAside>,
        scopes: &UserScopes,
        overrides: &[OperationOverride],
        hasher: PasswordHasher,
    ) -> UserResult<Self> {
        let mut primary_ops = primary_table(Arc::clone(&scopes.primary))?;
        let mut secondary_ops = secondary_table(Arc::clone(&scopes.secondary))?;
        let applied =
            primary_ops.apply_overrides(overrides)? + secondary_ops.apply_overrides(overrides)?;
        if applied > 0 {
            debug!(applied, "users operation overrides applied");
        }

        let sync = DualStoreSynchronizer::new(
            Arc::clone(&stores.secondary),
            Arc::clone(&cache),
            Arc::clone(&scopes.primary),
            Arc::clone(&scopes.secondary),
        );

        Ok(Self {
            primary: CachedRecordStore::new(stores.primary, Arc::clone(&cache), primary_ops),
            secondary: CachedRecordStore::new(stores.secondary, cache, secondary_ops),
            sync,
            hasher,
        })
    }

    pub fn cache(&self) -> &Arc<CacheAside> {
        self.secondary.cache()
    }

    /// The cached view of the secondary store.
    pub fn secondary(&self) -> &CachedRecordStore<User, UserStore> {
        &self.secondary
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub async fn create(&self, new_user: NewUser) -> UserResult<User> {
        new_user.validate()?;
        const TAKEN: &str = "User with this email or username already exists";
        self.ensure_available("email", &new_user.email, None, TAKEN).await?;
        self.ensure_available("username", &new_user.username, None, TAKEN).await?;

        let hash = self.hasher.hash(&new_user.password)?;
        let created = self.primary.create(new_user.into_user(hash)).await?;
        let outcome = self.sync.project(&created).await;
        info!(user_id = ?created.id, sync = %outcome, "user created");
        Ok(created.without_password())
    }

    pub async fn find_all(&self) -> UserResult<Vec<User>> {
        let users = self.secondary.find_all().await?;
        Ok(users.into_iter().map(User::without_password).collect())
    }

    pub async fn find_by_id(&self, id: &str) -> UserResult<Option<User>> {
        Ok(self.secondary.find_by_id(id).await?.map(User::without_password))
    }

    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        self.find_by("email", email).await
    }

    pub async fn find_by_email_verification_token(&self, token: &str) -> UserResult<Option<User>> {
        self.find_by(EMAIL_VERIFICATION_TOKEN_FIELD, token).await
    }

    pub async fn find_by_password_reset_token(&self, token: &str) -> UserResult<Option<User>> {
        self.find_by(PASSWORD_RESET_TOKEN_FIELD, token).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, mut patch: UserPatch) -> UserResult<User> {
        patch.validate()?;
        const TAKEN: &str = "Username or email already in use";
        if let Some(email) = &patch.email {
            self.ensure_available("email", email, Some(id), TAKEN).await?;
        }
        if let Some(username) = &patch.username {
            self.ensure_available("username", username, Some(id), TAKEN).await?;
        }
        if let Some(password) = patch.password.take() {
            patch.password = Some(self.hasher.hash_if_plain(&password)?);
        }

        let updated = self.apply(id, &patch.to_merge_patch()).await?;
        Ok(updated.without_password())
    }

    /// Deletes from the primary store and retracts the secondary row.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> UserResult<User> {
        let existing = self
            .primary
            .find_by_id(id)
            .await?
            .ok_or_else(|| UserError::not_found(id))?;
        if !self.primary.delete(id).await? {
            return Err(UserError::not_found(id));
        }
        let outcome = self.sync.retract(id).await;
        info!(user_id = %id, sync = %outcome, "user removed");
        Ok(existing.without_password())
    }

    /// Sets or clears the password reset token and its expiry.
    pub async fn update_reset_token(
        &self,
        id: &str,
        token: Option<&str>,
        expires: Option<OffsetDateTime>,
    ) -> UserResult<()> {
        let patch = token_patch(PASSWORD_RESET_TOKEN_FIELD, "passwordResetExpires", token, expires)?;
        self.apply(id, &patch).await?;
        Ok(())
    }

    /// Sets or clears the email verification token and its expiry.
    pub async fn update_email_verification_token(
        &self,
        id: &str,
        token: Option<&str>,
        expires: Option<OffsetDateTime>,
    ) -> UserResult<()> {
        let patch = token_patch(
            EMAIL_VERIFICATION_TOKEN_FIELD,
            "emailVerificationExpires",
            token,
            expires,
        )?;
        self.apply(id, &patch).await?;
        Ok(())
    }

    /// Replaces the password and clears any pending reset token.
    pub async fn update_password(&self, id: &str, password: &str) -> UserResult<()> {
        if !is_hashed(password) {
            validate_password_strength(password)?;
        }
        let hash = self.hasher.hash_if_plain(password)?;
        let patch = json!({
            "password": hash,
            "passwordResetToken": null,
            "passwordResetExpires": null,
        });
        self.apply(id, &patch).await?;
        Ok(())
    }

    /// Re-projects the primary record into the secondary store.
    ///
    /// Returns `None` when the primary store has no such user.
    pub async fn sync_user(&self, id: &str) -> UserResult<Option<SyncOutcome>> {
        match self.primary.find_by_id(id).await? {
            Some(user) => Ok(Some(self.sync.project(&user).await)),
            None => Ok(None),
        }
    }

    async fn apply(&self, id: &str, patch: &Value) -> UserResult<User> {
        let updated = self.primary.update(id, patch).await?;
        let outcome = self.sync.project(&updated).await;
        debug!(user_id = %id, sync = %outcome, "user updated");
        Ok(updated)
    }

    async fn find_by(&self, field: &str, value: &str) -> UserResult<Option<User>> {
        Ok(self
            .secondary
            .find_by_field(field, value)
            .await?
            .map(User::without_password))
    }

    async fn ensure_available(
        &self,
        field: &str,
        value: &str,
        owner: Option<&str>,
        message: &str,
    ) -> UserResult<()> {
        match self.primary.find_by_field(field, value).await? {
            Some(existing) if existing.id.as_deref() != owner => Err(UserError::conflict(message)),
            _ => Ok(()),
        }
    }
}

/// Merge patch setting a token and its expiry. `None` clears the field.
fn token_patch(
    token_field: &str,
    expires_field: &str,
    token: Option<&str>,
    expires: Option<OffsetDateTime>,
) -> UserResult<Value> {
    let expires = expires
        .map(|at| at.format(&Rfc3339))
        .transpose()
        .map_err(|e| UserError::validation(expires_field, e.to_string()))?;
    let mut patch = Map::new();
    patch.insert(token_field.to_string(), json!(token));
    patch.insert(expires_field.to_string(), json!(expires));
    Ok(Value::Object(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_token_patch_sets_and_clears() {
        let patch = token_patch(
            "passwordResetToken",
            "passwordResetExpires",
            Some("t1"),
            Some(datetime!(2026-10-17 12:00 UTC)),
        )
        .unwrap();
        assert_eq!(
            patch,
            json!({"passwordResetToken": "t1", "passwordResetExpires": "2026-10-17T12:00:00Z"})
        );

        let cleared = token_patch("passwordResetToken", "passwordResetExpires", None, None).unwrap();
        assert_eq!(
            cleared,
            json!({"passwordResetToken": null, "passwordResetExpires": null})
        );
    }
}
