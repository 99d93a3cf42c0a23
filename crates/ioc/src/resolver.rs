//! Resolution Engine - разрешение зависимостей в DI контейнере.
//!
//! Алгоритм для ключа K и стека S:
//! 1. singleton уже в кэше -> вернуть сразу, стек не трогаем
//! 2. K уже есть в S -> `CircularDependency { path: S + K }`
//! 3. иначе S + K передаётся в фабрику (копией, не общей ссылкой)
//! 4. фабрика -> OnBoot; ошибка boot не кэшируется
//! 5. singleton сохраняется под per-key lock (first writer wins)
//!
//! Стек принадлежит одному вызову верхнего уровня. Соседние ветки графа
//! получают свои копии, поэтому ромбовидные графы не дают ложных циклов.
//!
//! Цикл, который собирают два вызова с разных концов (поток 1 строит A и
//! ждёт B, поток 2 строит B и ждёт A), стек не видит. Его ловит граф
//! ожиданий в `InstanceStore` до того, как поток заблокируется на lock.

use parking_lot::Mutex;
use std::{
    any::{Any, TypeId},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    context::ContainerContext,
    errors::{DIError, DIResult},
    instances::{CallId, ErasedInstance, Insertion, InstanceRecord, InstanceStore},
    key::ServiceKey,
    lifecycle::Lifecycle,
    registry::{Binding, BindingRegistry, Built},
    stats::ResolutionStats,
};

/// Движок разрешения: registry + кэш singleton-ов + метрики
pub(crate) struct ResolutionEngine {
    pub(crate) registry: BindingRegistry,
    pub(crate) instances: InstanceStore,
    pub(crate) stats: ResolutionStats,
    lock_wait_timeout: Option<Duration>,
    verbose_logging: bool,
    next_call: AtomicU64,
}

impl ResolutionEngine {
    pub(crate) fn new(lock_wait_timeout: Option<Duration>, verbose_logging: bool) -> Self {
        Self {
            registry: BindingRegistry::new(verbose_logging),
            instances: InstanceStore::new(),
            stats: ResolutionStats::default(),
            lock_wait_timeout,
            verbose_logging,
            next_call: AtomicU64::new(1),
        }
    }

    fn begin_call(&self) -> CallId {
        self.next_call.fetch_add(1, Ordering::Relaxed)
    }

    /// Разрешить ключ и привести экземпляр к `Arc<I>`
    pub(crate) fn resolve_typed<I>(
        &self,
        key: ServiceKey,
        call: CallId,
        stack: &[ServiceKey],
        context: &ContainerContext,
    ) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        self.stats.record_attempt();

        let result = self.registry.lookup(&key).and_then(|binding| {
            if binding.interface.type_id != TypeId::of::<I>() {
                return Err(type_mismatch::<I>(&key, binding.interface.type_name));
            }
            let instance = self.instance_for(&binding, call, stack, context)?;
            downcast::<I>(&key, &binding, instance)
        });

        match &result {
            Ok(_) => {
                self.stats.record_success();
                if self.verbose_logging {
                    debug!(service = %key, depth = stack.len(), "✅ Resolved");
                }
            }
            Err(err) => {
                self.stats.record_failure();
                debug!(service = %key, category = err.category(), error = %err, "❌ Resolution failed");
            }
        }

        result
    }

    fn instance_for(
        &self,
        binding: &Arc<Binding>,
        call: CallId,
        stack: &[ServiceKey],
        context: &ContainerContext,
    ) -> DIResult<ErasedInstance> {
        let key = &binding.key;

        if binding.lifetime.is_singleton() {
            if let Some(cached) = self.instances.get(key) {
                self.stats.record_cache_hit();
                return Ok(cached);
            }
        }

        // Проверка цикла идёт ДО per-key lock: иначе цикл в одном потоке
        // повис бы на собственном lock
        if stack.contains(key) {
            return Err(self.cycle(stack, std::slice::from_ref(key)));
        }

        if binding.lifetime.is_singleton() {
            self.construct_singleton(binding, call, stack, context)
        } else {
            self.construct(binding, call, stack, context)
                .map(|built| built.instance)
        }
    }

    fn cycle(&self, stack: &[ServiceKey], tail: &[ServiceKey]) -> DIError {
        self.stats.record_cycle();
        let path: Vec<String> = stack.iter().chain(tail).map(ToString::to_string).collect();
        warn!("🔄 Circular dependency: {}", path.join(" -> "));
        DIError::CircularDependency { path }
    }

    fn construct_singleton(
        &self,
        binding: &Arc<Binding>,
        call: CallId,
        stack: &[ServiceKey],
        context: &ContainerContext,
    ) -> DIResult<ErasedInstance> {
        let key = &binding.key;
        let lock = self.instances.construction_lock(key);
        let _guard = self.acquire(&lock, key, call, stack)?;
        // Объявлен после guard: отметка снимается раньше, чем отпускается lock
        let _in_flight = self.instances.claim(call, key);

        // Пока ждали lock, другой поток мог построить экземпляр
        if let Some(cached) = self.instances.get(key) {
            self.stats.record_cache_hit();
            return Ok(cached);
        }

        let mut binding = binding.clone();
        loop {
            let ordinal = self.instances.reserve_ordinal();
            let built = self.construct(&binding, call, stack, context)?;
            let record = InstanceRecord {
                key: key.clone(),
                instance: built.instance,
                shutdown: built.shutdown,
                ordinal,
                created_at: Instant::now(),
            };

            match self
                .instances
                .insert_if_current(record, || self.registry.is_current(&binding))
            {
                Insertion::Inserted(instance) => return Ok(instance),
                Insertion::Lost { winner, discarded } => {
                    // Проигравший экземпляр уже прошёл boot: освобождаем его ресурсы
                    warn!(service = %key, "Singleton already cached, discarding fresh instance");
                    self.discard(&discarded, context);
                    return Ok(winner);
                }
                Insertion::Stale(stale) => {
                    // Binding подменили, пока фабрика работала: строим по новому
                    warn!(service = %key, "Binding overridden during construction, rebuilding");
                    self.discard(&stale, context);
                    binding = self.registry.lookup(key)?;
                    if !binding.lifetime.is_singleton() {
                        return self
                            .construct(&binding, call, stack, context)
                            .map(|built| built.instance);
                    }
                }
            }
        }
    }

    fn discard(&self, record: &InstanceRecord, context: &ContainerContext) {
        if let Err(err) = record.shutdown(context) {
            warn!(service = %record.key, error = %err, "OnShutdown of discarded instance failed");
        }
    }

    /// Взять construction lock, не уходя в ожидание, замыкающее цикл
    fn acquire<'l>(
        &self,
        lock: &'l Mutex<()>,
        key: &ServiceKey,
        call: CallId,
        stack: &[ServiceKey],
    ) -> DIResult<parking_lot::MutexGuard<'l, ()>> {
        if let Some(guard) = lock.try_lock() {
            return Ok(guard);
        }

        if let Err(chain) = self.instances.begin_wait(call, key) {
            return Err(self.cycle(stack, &chain));
        }

        let acquired = match self.lock_wait_timeout {
            None => Ok(lock.lock()),
            Some(timeout) => lock
                .try_lock_for(timeout)
                .ok_or_else(|| DIError::ConstructionTimeout {
                    key: key.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                }),
        };
        self.instances.end_wait(call);
        acquired
    }

    fn construct(
        &self,
        binding: &Arc<Binding>,
        call: CallId,
        stack: &[ServiceKey],
        context: &ContainerContext,
    ) -> DIResult<Built> {
        let mut path = Vec::with_capacity(stack.len() + 1);
        path.extend_from_slice(stack);
        path.push(binding.key.clone());

        let resolver = Resolver {
            engine: self,
            call,
            stack: path,
            context: context.clone(),
        };

        self.stats.record_factory_invocation();
        if self.verbose_logging {
            debug!(
                service = %binding.key,
                lifetime = %binding.lifetime,
                depth = resolver.depth(),
                "🏭 Invoking factory"
            );
        }

        let built = binding.build(&resolver);
        if let Err(DIError::BootFailed { .. }) = &built {
            self.stats.record_boot_failure();
        }
        built
    }
}

fn type_mismatch<I: ?Sized>(key: &ServiceKey, registered: &str) -> DIError {
    DIError::TypeMismatch {
        key: key.to_string(),
        wanted: std::any::type_name::<I>().to_string(),
        got: registered.to_string(),
    }
}

fn downcast<I>(key: &ServiceKey, binding: &Binding, instance: ErasedInstance) -> DIResult<Arc<I>>
where
    I: Lifecycle + ?Sized,
{
    instance
        .downcast_ref::<Arc<I>>()
        .cloned()
        .ok_or_else(|| type_mismatch::<I>(key, binding.interface.type_name))
}

/// Handle одного дерева разрешения.
///
/// Передаётся в фабрику и в `on_boot`. Хранит собственную копию стека
/// разрешения и контекст, общий для всего дерева.
pub struct Resolver<'c> {
    engine: &'c ResolutionEngine,
    call: CallId,
    stack: Vec<ServiceKey>,
    context: ContainerContext,
}

impl<'c> Resolver<'c> {
    pub(crate) fn root(engine: &'c ResolutionEngine, context: ContainerContext) -> Self {
        Self {
            engine,
            call: engine.begin_call(),
            stack: Vec::new(),
            context,
        }
    }

    /// Разрешить зависимость по типу интерфейса
    pub fn resolve<I>(&self) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        self.engine
            .resolve_typed::<I>(ServiceKey::of::<I>(), self.call, &self.stack, &self.context)
    }

    /// Разрешить зависимость по явному имени
    pub fn resolve_named<I>(&self, name: &str) -> DIResult<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        self.engine.resolve_typed::<I>(
            ServiceKey::named(name.to_string()),
            self.call,
            &self.stack,
            &self.context,
        )
    }

    /// Попытаться разрешить зависимость (None при любой ошибке)
    pub fn try_resolve<I>(&self) -> Option<Arc<I>>
    where
        I: Lifecycle + ?Sized,
    {
        match self.resolve::<I>() {
            Ok(instance) => Some(instance),
            Err(e) => {
                debug!("Failed to resolve {}: {}", std::any::type_name::<I>(), e);
                None
            }
        }
    }

    /// Тот же стек, но другой контекст для поддерева
    pub fn scoped(&self, context: ContainerContext) -> Resolver<'c> {
        Resolver {
            engine: self.engine,
            call: self.call,
            stack: self.stack.clone(),
            context,
        }
    }

    pub fn context(&self) -> &ContainerContext {
        &self.context
    }

    pub fn value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.context.value(key)
    }

    /// Типы, которые сейчас строятся в этом дереве (внешний первым)
    pub fn path(&self) -> &[ServiceKey] {
        &self.stack
    }

    /// Ключ, для которого вызвана фабрика
    pub fn current(&self) -> Option<&ServiceKey> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
