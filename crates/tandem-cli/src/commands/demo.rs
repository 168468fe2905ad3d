//! Runs the users flow end to end and reports what the cache did.

use std::sync::Arc;

use anyhow::{Context, Result};
use tandem_cache::{CacheAside, connect_cache_store};
use tandem_core::{ScopeRegistry, call_args};
use tandem_db_memory::InMemoryRecordStore;
use tandem_db_postgres::PostgresRecordStore;
use tandem_storage::{RecordStore, ops};
use tandem_users::operations::{primary_table, secondary_table};
use tandem_users::{NewUser, PasswordHasher, User, UserPatch, UserScopes, UserStores, UsersService};
use time::{Duration, OffsetDateTime};

use crate::cli::DemoArgs;
use crate::config::{AppConfig, SecondaryBackend};
use crate::output::{print_field, print_json, print_step, print_success};

const DEMO_PASSWORD: &str = "Tand3m!Dem0";
const RESET_PASSWORD: &str = "N3w!Secretz";

async fn secondary_store(config: &AppConfig) -> Result<Arc<dyn RecordStore<User>>> {
    Ok(match config.stores.secondary_backend {
        SecondaryBackend::Memory => Arc::new(InMemoryRecordStore::<User>::new()),
        SecondaryBackend::Postgres => Arc::new(
            PostgresRecordStore::<User>::connect(&config.postgres)
                .await
                .context("connecting the postgres secondary store")?,
        ),
    })
}

pub async fn build_service(config: &AppConfig) -> Result<UsersService> {
    let cache_store = connect_cache_store(&config.redis).await;
    print_field("cache backend", cache_store.backend_name());
    let cache = Arc::new(CacheAside::from_config(cache_store, &config.cache)?);

    let registry = ScopeRegistry::new();
    let scopes = UserScopes::bind(&registry, &config.stores.labels())?;
    for table in [
        primary_table(Arc::clone(&scopes.primary))?,
        secondary_table(Arc::clone(&scopes.secondary))?,
    ] {
        table.validate(&registry)?;
    }

    let secondary = secondary_store(config).await?;
    print_field("secondary backend", secondary.backend_name());
    let stores = UserStores {
        primary: Arc::new(InMemoryRecordStore::<User>::new()),
        secondary,
    };

    Ok(UsersService::new(
        stores,
        cache,
        &scopes,
        &config.cache.overrides,
        PasswordHasher::from_config(&config.security)?,
    )?)
}

pub async fn run(config: &AppConfig, args: &DemoArgs) -> Result<()> {
    let service = build_service(config).await?;
    let email = args
        .email
        .clone()
        .unwrap_or_else(|| format!("demo-{}@example.com", uuid::Uuid::new_v4().simple()));
    let username = email.split('@').next().unwrap_or("demo").to_string();

    print_step("create user");
    let user = service
        .create(NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            username,
            email: email.clone(),
            password: DEMO_PASSWORD.into(),
            is_active: None,
            roles: None,
        })
        .await?;
    let id = user.id.clone().context("created user has no id")?;
    print_field("id", &id);

    print_step("read twice by id (miss, then hit)");
    service.find_by_id(&id).await?;
    service.find_by_id(&id).await?;
    let find_by_id = service.secondary().table().resolve(ops::FIND_BY_ID)?;
    let key = service.cache().key_for(&find_by_id, &call_args![id.as_str()]);
    print_field("cached under", key);

    print_step("read by email");
    service.find_by_email(&email).await?;

    print_step("update name (invalidates both scopes)");
    service
        .update(
            &id,
            UserPatch {
                first_name: Some("Augusta".into()),
                ..Default::default()
            },
        )
        .await?;
    let fresh = service
        .find_by_id(&id)
        .await?
        .context("updated user not readable")?;
    print_field("first name after update", &fresh.first_name);

    print_step("password reset round trip");
    let token = uuid::Uuid::new_v4().to_string();
    service
        .update_reset_token(
            &id,
            Some(&token),
            Some(OffsetDateTime::now_utc() + Duration::hours(1)),
        )
        .await?;
    let by_token = service.find_by_password_reset_token(&token).await?;
    print_field("found by reset token", by_token.is_some());
    service.update_password(&id, RESET_PASSWORD).await?;

    if args.keep {
        print_success(&format!("kept demo user {id}"));
    } else {
        print_step("remove user");
        service.remove(&id).await?;
        print_field("readable after remove", service.find_by_id(&id).await?.is_some());
    }

    let stats = service.cache().stats();
    if args.json {
        print_json(&stats)?;
    } else {
        print_field("hits", stats.hits);
        print_field("misses", stats.misses);
        print_field("sets", stats.sets);
        print_field("skipped sets", stats.skipped_sets);
        print_field("invalidated keys", stats.invalidated_keys);
        print_field("failures", stats.failures);
    }
    print_success("demo finished");
    Ok(())
}
