//! Binding Registry - регистрация фабрик в DI контейнере.
//!
//! Отвечает ТОЛЬКО за хранение binding-ов: ключ -> (фабрика, lifetime).
//! Повторная регистрация перезаписывает binding (last write wins) - это
//! штатная точка подмены реализаций на test doubles.

use parking_lot::RwLock;
use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
    time::Instant,
};
use tracing::{debug, warn};

use crate::{
    context::ContainerContext,
    errors::{take_circular, DIError, DIResult},
    instances::{ErasedInstance, ShutdownHook},
    key::ServiceKey,
    lifecycle::{Lifecycle, LifecycleOrchestrator},
    lifetime::Lifetime,
    resolver::Resolver,
};

/// Результат фабрики после успешного boot
pub struct Built {
    pub instance: ErasedInstance,
    pub shutdown: ShutdownHook,
}

type ErasedFactory = Arc<dyn Fn(&Resolver<'_>) -> DIResult<Built> + Send + Sync>;

/// Интерфейс, под который зарегистрирована фабрика
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl InterfaceInfo {
    pub fn of<I: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<I>(),
            type_name: type_name::<I>(),
        }
    }
}

/// Binding: ключ, фабрика и lifetime. Неизменяем после создания
pub struct Binding {
    pub key: ServiceKey,
    pub interface: InterfaceInfo,
    pub lifetime: Lifetime,
    pub registered_at: Instant,
    factory: ErasedFactory,
}

impl Binding {
    /// Обернуть типизированную фабрику: factory -> OnBoot -> type-erased экземпляр
    pub fn new<I, F>(key: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        I: Lifecycle + ?Sized,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Box<I>> + Send + Sync + 'static,
    {
        let factory_key = key.clone();
        let erased: ErasedFactory = Arc::new(move |resolver: &Resolver<'_>| -> DIResult<Built> {
            let mut instance = factory(resolver).map_err(|err| match take_circular(err) {
                Ok(cycle) => cycle,
                Err(cause) => DIError::FactoryFailed {
                    key: factory_key.to_string(),
                    cause,
                },
            })?;

            LifecycleOrchestrator::boot(&mut *instance, resolver, &factory_key)?;

            let shared: Arc<I> = Arc::from(instance);
            let hook_target = shared.clone();
            let shutdown: ShutdownHook =
                Arc::new(move |ctx: &ContainerContext| hook_target.on_shutdown(ctx));

            Ok(Built {
                instance: Arc::new(shared) as ErasedInstance,
                shutdown,
            })
        });

        Self {
            key,
            interface: InterfaceInfo::of::<I>(),
            lifetime,
            registered_at: Instant::now(),
            factory: erased,
        }
    }

    /// Вызвать фабрику и OnBoot
    pub(crate) fn build(&self, resolver: &Resolver<'_>) -> DIResult<Built> {
        (self.factory)(resolver)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("interface", &self.interface.type_name)
            .field("lifetime", &self.lifetime)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

#[derive(Default)]
pub struct BindingRegistry {
    bindings: RwLock<HashMap<ServiceKey, Arc<Binding>>>,
    verbose_logging: bool,
}

impl BindingRegistry {
    pub fn new(verbose_logging: bool) -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            verbose_logging,
        }
    }

    /// Сохранить binding, вернуть предыдущий если был
    pub fn register(&self, binding: Binding) -> Option<Arc<Binding>> {
        let key = binding.key.clone();
        let lifetime = binding.lifetime;
        let previous = self.bindings.write().insert(key.clone(), Arc::new(binding));

        if previous.is_some() {
            warn!("⚠️ Service {} is already registered, overwriting", key);
        } else if self.verbose_logging {
            debug!("📝 Registered {} with {} lifetime", key, lifetime);
        }

        previous
    }

    pub fn lookup(&self, key: &ServiceKey) -> DIResult<Arc<Binding>> {
        self.bindings
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| DIError::NotRegistered {
                key: key.to_string(),
            })
    }

    /// `binding` всё ещё зарегистрирован под своим ключом (не подменён)
    pub fn is_current(&self, binding: &Arc<Binding>) -> bool {
        self.bindings
            .read()
            .get(&binding.key)
            .is_some_and(|current| Arc::ptr_eq(current, binding))
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.bindings.read().contains_key(key)
    }

    pub fn unregister(&self, key: &ServiceKey) -> Option<Arc<Binding>> {
        let removed = self.bindings.write().remove(key);
        if removed.is_some() && self.verbose_logging {
            debug!("🗑️ Service {} removed from registry", key);
        }
        removed
    }

    pub fn keys(&self) -> Vec<ServiceKey> {
        self.bindings.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut bindings = self.bindings.write();
        let count = bindings.len();
        bindings.clear();
        debug!("🧹 Cleared {} bindings", count);
    }
}
