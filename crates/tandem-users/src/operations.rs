//! Scopes and cache operation tables of the users stores.

use std::sync::Arc;
use std::time::Duration;

use tandem_core::{EntityScope, OperationSpec, OperationTable, ScopeRegistry};
use tandem_storage::ops;

use crate::config::UserStoreLabels;
use crate::error::UserResult;

pub const USER_ENTITY: &str = "user";

/// Registry component names the users scopes are bound under.
pub const PRIMARY_COMPONENT: &str = "users.primary";
pub const SECONDARY_COMPONENT: &str = "users.secondary";

pub const EMAIL_VERIFICATION_TOKEN_FIELD: &str = "emailVerificationToken";
pub const PASSWORD_RESET_TOKEN_FIELD: &str = "passwordResetToken";

const LIST_TTL: Duration = Duration::from_secs(3600);
const BY_ID_TTL: Duration = Duration::from_secs(3600);
const BY_EMAIL_TTL: Duration = Duration::from_secs(1800);

/// The primary and secondary scopes of the users stores.
#[derive(Debug, Clone)]
pub struct UserScopes {
    pub primary: Arc<EntityScope>,
    pub secondary: Arc<EntityScope>,
}

impl UserScopes {
    pub fn bind(registry: &ScopeRegistry, labels: &UserStoreLabels) -> UserResult<Self> {
        let primary = registry.bind(
            PRIMARY_COMPONENT,
            EntityScope::new(&labels.primary, &labels.namespace, USER_ENTITY)?,
        )?;
        let secondary = registry.bind(
            SECONDARY_COMPONENT,
            EntityScope::new(&labels.secondary, &labels.namespace, USER_ENTITY)?,
        )?;
        Ok(Self { primary, secondary })
    }
}

fn writes(mut table: OperationTable) -> UserResult<OperationTable> {
    let scope = Arc::clone(table.scope());
    for name in [ops::CREATE, ops::UPDATE, ops::DELETE, ops::SAVE] {
        table.insert(OperationSpec::write(Arc::clone(&scope), name)?)?;
    }
    Ok(table)
}

/// Secondary (read side): list and id lookups cached for an hour, email
/// lookups for half an hour, token lookups never cached.
pub fn secondary_table(scope: Arc<EntityScope>) -> UserResult<OperationTable> {
    let table = OperationTable::new(Arc::clone(&scope))
        .with(
            OperationSpec::read(Arc::clone(&scope), ops::FIND_ALL)?
                .cacheable()
                .with_ttl(LIST_TTL),
        )?
        .with(
            OperationSpec::read(Arc::clone(&scope), ops::FIND_BY_ID)?
                .cacheable()
                .with_ttl(BY_ID_TTL),
        )?
        .with(
            OperationSpec::read(Arc::clone(&scope), &ops::find_by_field("email"))?
                .cacheable()
                .with_ttl(BY_EMAIL_TTL),
        )?
        .with(
            OperationSpec::read(
                Arc::clone(&scope),
                &ops::find_by_field(EMAIL_VERIFICATION_TOKEN_FIELD),
            )?
            .no_cache(),
        )?
        .with(
            OperationSpec::read(
                Arc::clone(&scope),
                &ops::find_by_field(PASSWORD_RESET_TOKEN_FIELD),
            )?
            .no_cache(),
        )?;
    writes(table)
}

/// Primary (write side): reads feed conflict checks and are never cached.
pub fn primary_table(scope: Arc<EntityScope>) -> UserResult<OperationTable> {
    let mut table = OperationTable::new(Arc::clone(&scope));
    for name in [
        ops::FIND_ALL.to_string(),
        ops::FIND_BY_ID.to_string(),
        ops::find_by_field("email"),
        ops::find_by_field("username"),
    ] {
        table.insert(OperationSpec::read(Arc::clone(&scope), &name)?.no_cache())?;
    }
    writes(table)
}
