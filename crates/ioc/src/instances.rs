//! Хранилище singleton экземпляров (Instance Records).
//!
//! Запись создаётся при первом успешном разрешении и удаляется при
//! shutdown. Ordinal резервируется в момент вызова фабрики, поэтому в
//! цепочке A -> B -> C у A наименьший ordinal, и teardown идёт C, B, A.
//!
//! Кроме кэша здесь живёт граф ожиданий (waits-for): какой вызов строит
//! ключ и какого ключа ждёт каждый вызов. По нему ловится цикл, который
//! два потока собирают с разных концов.

use parking_lot::{Mutex, RwLock};
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::debug;

use crate::{context::ContainerContext, key::ServiceKey};

/// Идентификатор вызова верхнего уровня (одно дерево разрешения)
pub type CallId = u64;

/// Type-erased экземпляр: внутри лежит `Arc<I>` запрошенного интерфейса
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// Вызов `on_shutdown` у конкретного экземпляра
pub type ShutdownHook = Arc<dyn Fn(&ContainerContext) -> anyhow::Result<()> + Send + Sync>;

/// Instance Record singleton-а
pub struct InstanceRecord {
    pub key: ServiceKey,
    pub instance: ErasedInstance,
    pub(crate) shutdown: ShutdownHook,
    pub ordinal: u64,
    pub created_at: Instant,
}

impl InstanceRecord {
    pub fn shutdown(&self, ctx: &ContainerContext) -> anyhow::Result<()> {
        (self.shutdown)(ctx)
    }
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("key", &self.key)
            .field("ordinal", &self.ordinal)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Результат `insert_if_absent`
pub enum Insertion {
    Inserted(ErasedInstance),
    /// Запись уже была; `discarded` - проигравший экземпляр
    Lost {
        winner: ErasedInstance,
        discarded: InstanceRecord,
    },
    /// Binding подменён во время построения, запись не сохранена
    Stale(InstanceRecord),
}

/// Граф ожиданий между вызовами
#[derive(Default)]
struct WaitGraph {
    /// ключ -> вызов, который сейчас его строит
    owners: HashMap<ServiceKey, CallId>,
    /// вызов -> ключ, lock которого он ждёт
    waiting: HashMap<CallId, ServiceKey>,
}

impl WaitGraph {
    /// Цепочка ключей от `key` до ключа, который строит сам `call`
    fn cycle_from(&self, call: CallId, key: &ServiceKey) -> Option<Vec<ServiceKey>> {
        let mut chain = vec![key.clone()];
        let mut current = key;

        // Каждый вызов ждёт не больше одного ключа, поэтому длина цепочки
        // ограничена числом ожидающих
        for _ in 0..=self.waiting.len() {
            let owner = *self.owners.get(current)?;
            if owner == call {
                return Some(chain);
            }
            current = self.waiting.get(&owner)?;
            chain.push(current.clone());
        }
        None
    }
}

#[derive(Default)]
pub struct InstanceStore {
    records: RwLock<HashMap<ServiceKey, InstanceRecord>>,
    construction_locks: Mutex<HashMap<ServiceKey, Arc<Mutex<()>>>>,
    next_ordinal: AtomicU64,
    waits: Mutex<WaitGraph>,
}

/// Отметка "ключ строится вызовом"; снимается при drop, в том числе на ошибке
pub struct InFlight<'s> {
    store: &'s InstanceStore,
    key: ServiceKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.waits.lock().owners.remove(&self.key);
    }
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ServiceKey) -> Option<ErasedInstance> {
        self.records.read().get(key).map(|record| record.instance.clone())
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn reserve_ordinal(&self) -> u64 {
        self.next_ordinal.fetch_add(1, Ordering::SeqCst)
    }

    /// Lock, сериализующий построение singleton-а для одного ключа
    pub fn construction_lock(&self, key: &ServiceKey) -> Arc<Mutex<()>> {
        self.construction_locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Зарегистрировать ожидание `key` вызовом `call`.
    ///
    /// Если владелец `key` (транзитивно) ждёт ключ, который строит `call`,
    /// ожидание не регистрируется и возвращается цепочка ключей цикла.
    pub fn begin_wait(&self, call: CallId, key: &ServiceKey) -> Result<(), Vec<ServiceKey>> {
        let mut waits = self.waits.lock();
        if let Some(chain) = waits.cycle_from(call, key) {
            return Err(chain);
        }
        waits.waiting.insert(call, key.clone());
        Ok(())
    }

    pub fn end_wait(&self, call: CallId) {
        self.waits.lock().waiting.remove(&call);
    }

    /// Отметить, что `call` взял construction lock ключа
    pub fn claim(&self, call: CallId, key: &ServiceKey) -> InFlight<'_> {
        self.waits.lock().owners.insert(key.clone(), call);
        InFlight {
            store: self,
            key: key.clone(),
        }
    }

    /// First writer wins
    pub fn insert_if_absent(&self, record: InstanceRecord) -> Insertion {
        self.insert_if_current(record, || true)
    }

    /// Как `insert_if_absent`, но `is_current` проверяется под тем же write
    /// lock, под которым `remove` выселяет запись при подмене binding-а
    pub fn insert_if_current(
        &self,
        record: InstanceRecord,
        is_current: impl FnOnce() -> bool,
    ) -> Insertion {
        let mut records = self.records.write();
        if !is_current() {
            return Insertion::Stale(record);
        }
        if let Some(existing) = records.get(&record.key) {
            return Insertion::Lost {
                winner: existing.instance.clone(),
                discarded: record,
            };
        }

        let instance = record.instance.clone();
        debug!(service = %record.key, ordinal = record.ordinal, "Singleton cached");
        records.insert(record.key.clone(), record);
        Insertion::Inserted(instance)
    }

    pub fn remove(&self, key: &ServiceKey) -> Option<InstanceRecord> {
        self.records.write().remove(key)
    }

    /// Забрать все записи, отсортированные по убыванию ordinal
    pub fn drain_for_shutdown(&self) -> Vec<InstanceRecord> {
        let mut drained: Vec<InstanceRecord> = {
            let mut records = self.records.write();
            records.drain().map(|(_, record)| record).collect()
        };
        drained.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
        drained
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
