//! Composition root: turns a `Config` into a container of ready bindings.
//!
//! Bindings
//! - `Configuration`: value, built from the environment config.
//! - `dyn UserRepository`: singleton, backend chosen by `STORAGE_PROVIDER`.
//! - `UserService`: singleton, depends on `dyn UserRepository`.

use std::sync::Arc;

use binder::{BoxError, Container, ContainerBuilder, ResolveError};
use domain::adapters::memory_repo::InMemoryUserRepo;
use domain::service::UserService;
use domain::{Configuration, CoreError, UserRepository};
use tracing::info;

use crate::config::{Config, StorageProvider};

pub fn build_container(cfg: &Config) -> Result<Container, ResolveError> {
    let settings = cfg.clone();
    Container::builder()
        .bind_value(cfg.to_configuration())?
        .bind_singleton::<dyn UserRepository, _, _>(
            move |c: &Container| -> Result<Arc<dyn UserRepository>, BoxError> {
                let configuration = c.get::<Configuration>()?;
                Ok(open_repository(&settings, &configuration)?)
            },
        )?
        .bind_singleton(|c: &Container| {
            let repo = c.get::<dyn UserRepository>()?;
            Ok::<_, ResolveError>(Arc::new(UserService::new(repo)))
        })
        .map(ContainerBuilder::build)
}

#[cfg_attr(
    not(all(feature = "sqlite", feature = "redis")),
    allow(unused_variables)
)]
fn open_repository(
    cfg: &Config,
    configuration: &Configuration,
) -> Result<Arc<dyn UserRepository>, CoreError> {
    let provider = cfg.storage_provider;
    info!(?provider, "opening user repository");
    match provider {
        StorageProvider::Memory => Ok(Arc::new(InMemoryUserRepo::new())),
        #[cfg(feature = "sqlite")]
        StorageProvider::Sqlite => Ok(Arc::new(sqlite_adapter::SqliteUserRepo::from_config(
            configuration,
        )?)),
        #[cfg(feature = "redis")]
        StorageProvider::Redis => {
            let repo = redis_adapter::RedisUserRepo::from_config(configuration)?;
            if cfg.redis_flush_on_start {
                repo.flush()?;
            }
            Ok(Arc::new(repo))
        }
        #[allow(unreachable_patterns)]
        other => Err(CoreError::BackendUnavailable(format!(
            "{:?} support was not compiled in",
            other
        ))),
    }
}
