//! Lifecycle capability и оркестратор hooks.
//!
//! Каждая регистрируемая реализация умеет `on_boot` и `on_shutdown`.
//! `on_boot` вызывается сразу после фабрики, до кэширования экземпляра;
//! `on_shutdown` - только для singleton-ов, успешно прошедших boot, в
//! строго обратном порядке ordinal-ов.

use tracing::{debug, error};

use crate::{
    context::ContainerContext,
    errors::{take_circular, DIError, DIResult, ShutdownFailure},
    instances::InstanceRecord,
    key::ServiceKey,
    resolver::Resolver,
};

/// Lifecycle hooks сервиса
///
/// Абстрактный интерфейс сервиса объявляется как `trait Database: Lifecycle`,
/// после чего `dyn Database` можно регистрировать в контейнере.
pub trait Lifecycle: Send + Sync + 'static {
    /// Вызывается один раз на новый экземпляр. Через `resolver` доступны
    /// контекст запроса и разрешение вложенных зависимостей.
    fn on_boot(&mut self, _resolver: &Resolver<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Вызывается при shutdown контейнера, не более одного раза
    fn on_shutdown(&self, _ctx: &ContainerContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Оркестратор lifecycle hooks
pub struct LifecycleOrchestrator;

impl LifecycleOrchestrator {
    /// Запустить `on_boot`. Ошибка hook-а становится `BootFailed`,
    /// кроме ошибки цикла - она пробрасывается без изменений.
    pub fn boot<I>(instance: &mut I, resolver: &Resolver<'_>, key: &ServiceKey) -> DIResult<()>
    where
        I: Lifecycle + ?Sized,
    {
        match instance.on_boot(resolver) {
            Ok(()) => {
                debug!(service = %key, depth = resolver.depth(), "OnBoot completed");
                Ok(())
            }
            Err(err) => match take_circular(err) {
                Ok(cycle) => Err(cycle),
                Err(cause) => Err(DIError::BootFailed {
                    key: key.to_string(),
                    cause,
                }),
            },
        }
    }

    /// Best-effort teardown: все hooks вызываются даже после ошибок,
    /// ошибки возвращаются одним `ShutdownAggregate`.
    ///
    /// `records` должны быть отсортированы по убыванию ordinal.
    pub fn shutdown_all(records: Vec<InstanceRecord>, ctx: &ContainerContext) -> DIResult<usize> {
        let mut failures = Vec::new();
        let total = records.len();

        for record in records {
            match record.shutdown(ctx) {
                Ok(()) => {
                    debug!(service = %record.key, ordinal = record.ordinal, "OnShutdown completed");
                }
                Err(cause) => {
                    error!(
                        service = %record.key,
                        ordinal = record.ordinal,
                        error = %cause,
                        "OnShutdown failed"
                    );
                    failures.push(ShutdownFailure {
                        key: record.key.to_string(),
                        cause,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(total)
        } else {
            Err(DIError::ShutdownAggregate { failures })
        }
    }
}
