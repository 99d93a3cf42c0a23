//! Container - публичный фасад DI контейнера.
//!
//! Склеивает registry, resolution engine и lifecycle orchestrator.
//! Клонирование дешёвое: все клоны делят одно состояние.

use std::{
    fmt,
    sync::{Arc, Weak},
};
use tracing::{debug, info, warn};

use common::OperationTimer;

use crate::{
    config::{ConfigLoader, ContainerConfig},
    context::ContainerContext,
    errors::DIResult,
    key::ServiceKey,
    lifecycle::{Lifecycle, LifecycleOrchestrator},
    lifetime::Lifetime,
    registry::Binding,
    resolver::{ResolutionEngine, Resolver},
    stats::ContainerStats,
};

struct ContainerInner {
    config: ContainerConfig,
    engine: ResolutionEngine,
}

/// DI контейнер
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Невладеющая ссылка на контейнер.
///
/// Для сервисов, которым нужен lookup через контейнер (обратные ссылки
/// между соседями): не держит контейнер живым и не образует Arc-цикл
/// container -> binding -> фабрика -> container.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        let engine = ResolutionEngine::new(config.lock_wait_timeout(), config.verbose_logging);
        info!(
            container = %config.name,
            lock_wait_timeout_ms = ?config.lock_wait_timeout_ms,
            "🚀 DI container created"
        );
        Self {
            inner: Arc::new(ContainerInner { config, engine }),
        }
    }

    /// Конфигурация из переменных окружения `IOC_*`
    pub fn from_env() -> DIResult<Self> {
        ConfigLoader::new().load().map(Self::with_config)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Зарегистрировать фабрику под типом интерфейса `I` (обычно `dyn Trait`).
    ///
    /// Повторная регистрация заменяет binding; закэшированный singleton
    /// старого binding-а выбрасывается.
    pub fn register<I, F>(&self, lifetime: Lifetime, factory: F)
    where
        I: Lifecycle + ?Sized,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Box<I>> + Send + Sync + 'static,
    {
        self.install(Binding::new::<I, F>(ServiceKey::of::<I>(), lifetime, factory));
    }

    pub fn register_singleton<I, F>(&self, factory: F)
    where
        I: Lifecycle + ?Sized,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Box<I>> + Send + Sync + 'static,
    {
        self.register::<I, F>(Lifetime::Singleton, factory);
    }

    pub fn register_transient<I, F>(&self, factory: F)
    where
        I: Lifecycle + ?Sized,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Box<I>> + Send + Sync + 'static,
    {
        self.register::<I, F>(Lifetime::Transient, factory);
    }

    /// Регистрация под явным именем, например несколько `dyn Database`
    pub fn register_named<I, F>(&self, name: impl Into<String>, lifetime: Lifetime, factory: F)
    where
        I: Lifecycle + ?Sized,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Box<I>> + Send + Sync + 'static,
    {
        let name: String = name.into();
        let key = ServiceKey::named(name);
        self.install(Binding::new::<I, F>(key, lifetime, factory));
    }

    fn install(&self, binding: Binding) {
        let key = binding.key.clone();
        let engine = &self.inner.engine;

        if engine.registry.register(binding).is_none() {
            return;
        }

        // Binding подменён: старый singleton больше не должен выдаваться
        if let Some(record) = engine.instances.remove(&key) {
            debug!(service = %key, "Evicting cached singleton of overridden binding");
            if self.inner.config.shutdown_on_override {
                if let Err(err) = record.shutdown(&ContainerContext::background()) {
                    warn!(service = %key, error = %err, "OnShutdown of overridden singleton failed");
                }
            }
        }
    }

    pub fn resolve<I>(&self) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        self.resolve_with::<I>(&ContainerContext::background())
    }

    /// Разрешить с контекстом запроса; контекст виден всем фабрикам и `on_boot` дерева
    pub fn resolve_with<I>(&self, ctx: &ContainerContext) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        Resolver::root(&self.inner.engine, ctx.clone()).resolve::<I>()
    }

    pub fn resolve_named<I>(&self, name: &str) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        self.resolve_named_with::<I>(name, &ContainerContext::background())
    }

    pub fn resolve_named_with<I>(&self, name: &str, ctx: &ContainerContext) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        Resolver::root(&self.inner.engine, ctx.clone()).resolve_named::<I>(name)
    }

    pub fn try_resolve<I>(&self) -> Option<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        Resolver::root(&self.inner.engine, ContainerContext::background()).try_resolve::<I>()
    }

    pub fn is_registered<I: ?Sized + 'static>(&self) -> bool {
        self.inner.engine.registry.contains(&ServiceKey::of::<I>())
    }

    pub fn is_registered_named(&self, name: &str) -> bool {
        self.inner
            .engine
            .registry
            .contains(&ServiceKey::named(name.to_string()))
    }

    pub fn shutdown(&self) -> DIResult<()> {
        self.shutdown_with(&ContainerContext::background())
    }

    /// Остановить все singleton-ы в обратном порядке создания.
    ///
    /// Hooks вызываются все, даже после ошибок; ошибки собираются в
    /// `ShutdownAggregate`. Кэш очищается в любом случае, binding-и остаются,
    /// поэтому после shutdown контейнер можно использовать снова.
    pub fn shutdown_with(&self, ctx: &ContainerContext) -> DIResult<()> {
        let records = self.inner.engine.instances.drain_for_shutdown();

        let mut timer = OperationTimer::new("container_shutdown");
        timer.add_field("container", &self.inner.config.name);
        timer.add_field("instances", records.len());

        info!(
            container = %self.inner.config.name,
            instances = records.len(),
            "🛑 Shutting down DI container"
        );

        let result = LifecycleOrchestrator::shutdown_all(records, ctx).map(|_| ());
        timer.finish_with_result(&result);
        result
    }

    pub fn stats(&self) -> ContainerStats {
        let engine = &self.inner.engine;
        engine
            .stats
            .snapshot(engine.registry.len(), engine.instances.len())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.inner.config.name)
            .field("registered", &self.inner.engine.registry.len())
            .field("cached_singletons", &self.inner.engine.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DIError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Clock: Lifecycle {
        fn now(&self) -> u64;
    }

    struct FixedClock(u64);
    impl Lifecycle for FixedClock {}
    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_override_evicts_cached_singleton() {
        let container = Container::new();
        container.register_singleton::<dyn Clock, _>(|_| Ok(Box::new(FixedClock(1))));
        assert_eq!(container.resolve::<dyn Clock>().expect("resolve").now(), 1);

        container.register_singleton::<dyn Clock, _>(|_| Ok(Box::new(FixedClock(2))));
        assert_eq!(container.resolve::<dyn Clock>().expect("resolve").now(), 2);
        assert_eq!(container.stats().registered_bindings, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let container = Container::new();
        container.register_singleton::<dyn Clock, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedClock(7)))
        });

        let clone = container.clone();
        let a = container.resolve::<dyn Clock>().expect("resolve");
        let b = clone.resolve::<dyn Clock>().expect("resolve");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_weak_handle_does_not_keep_container_alive() {
        let container = Container::new();
        container.register_singleton::<dyn Clock, _>(|_| Ok(Box::new(FixedClock(3))));

        let weak = container.downgrade();
        let upgraded = weak.upgrade().expect("container is alive");
        assert_eq!(upgraded.resolve::<dyn Clock>().expect("resolve").now(), 3);

        drop(upgraded);
        drop(container);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_unregistered_and_try_resolve() {
        let container = Container::with_config(ContainerConfig::minimal());
        assert!(!container.is_registered::<dyn Clock>());
        assert!(container.try_resolve::<dyn Clock>().is_none());

        match container.resolve::<dyn Clock>() {
            Err(DIError::NotRegistered { key }) => assert!(key.contains("Clock")),
            other => panic!("Expected NotRegistered, got {:?}", other.map(|c| c.now())),
        }
    }
}
