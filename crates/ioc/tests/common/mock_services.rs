//! Mock сервисы для integration тестов контейнера

use anyhow::{bail, Result};
use ioc::{ContainerContext, Lifecycle, Resolver, WeakContainer};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

/// Журнал событий lifecycle (boot/shutdown) в порядке вызова
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// События с префиксом (например "shutdown:") без префикса
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

// === Database ===

pub trait Database: Lifecycle {
    fn query(&self, sql: &str) -> Result<String>;
    fn is_connected(&self) -> bool;
}

pub struct MockDatabase {
    connected: AtomicBool,
    log: EventLog,
}

impl MockDatabase {
    pub fn new(log: EventLog) -> Self {
        Self {
            connected: AtomicBool::new(false),
            log,
        }
    }
}

impl Lifecycle for MockDatabase {
    fn on_boot(&mut self, resolver: &Resolver<'_>) -> Result<()> {
        if let Some(request_id) = resolver.context().request_id() {
            self.log.push(format!("request:{}", request_id));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.log.push("boot:Database");
        Ok(())
    }

    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.log.push("shutdown:Database");
        Ok(())
    }
}

impl Database for MockDatabase {
    fn query(&self, sql: &str) -> Result<String> {
        if !self.is_connected() {
            bail!("database is not connected");
        }
        Ok(format!("result of {}", sql))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Обёртка над MockDatabase, у которой boot падает пока `fail` выставлен
pub struct FailingDatabase {
    inner: MockDatabase,
    fail: Arc<AtomicBool>,
}

impl FailingDatabase {
    pub fn new(log: EventLog, fail: Arc<AtomicBool>) -> Self {
        Self {
            inner: MockDatabase::new(log),
            fail,
        }
    }
}

impl Lifecycle for FailingDatabase {
    fn on_boot(&mut self, resolver: &Resolver<'_>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("simulated boot failure");
        }
        self.inner.on_boot(resolver)
    }

    fn on_shutdown(&self, ctx: &ContainerContext) -> Result<()> {
        self.inner.on_shutdown(ctx)
    }
}

impl Database for FailingDatabase {
    fn query(&self, sql: &str) -> Result<String> {
        self.inner.query(sql)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

// === Cache (зависит от Database) ===

pub trait Cache: Lifecycle {
    fn get(&self, key: &str) -> Option<String>;
    fn database(&self) -> Option<Arc<dyn Database>>;
}

/// Кэш берёт Database в on_boot, а не в фабрике
pub struct MockCache {
    db: Option<Arc<dyn Database>>,
    log: EventLog,
    fail_shutdown: bool,
}

impl MockCache {
    pub fn new(log: EventLog) -> Self {
        Self {
            db: None,
            log,
            fail_shutdown: false,
        }
    }

    pub fn failing_shutdown(log: EventLog) -> Self {
        Self {
            fail_shutdown: true,
            ..Self::new(log)
        }
    }
}

impl Lifecycle for MockCache {
    fn on_boot(&mut self, resolver: &Resolver<'_>) -> Result<()> {
        self.db = Some(resolver.resolve::<dyn Database>()?);
        self.log.push("boot:Cache");
        Ok(())
    }

    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.log.push("shutdown:Cache");
        if self.fail_shutdown {
            bail!("cache flush failed");
        }
        Ok(())
    }
}

impl Cache for MockCache {
    fn get(&self, key: &str) -> Option<String> {
        let db = self.db.as_ref()?;
        db.query(&format!("SELECT value FROM cache WHERE key = '{}'", key))
            .ok()
    }

    fn database(&self) -> Option<Arc<dyn Database>> {
        self.db.clone()
    }
}

// === ComplexService (Database + Cache) ===

pub trait Complex: Lifecycle {
    fn database(&self) -> &Arc<dyn Database>;
    fn cache(&self) -> &Arc<dyn Cache>;
}

pub struct ComplexService {
    pub db: Arc<dyn Database>,
    pub cache: Arc<dyn Cache>,
}

impl ComplexService {
    pub fn from_resolver(resolver: &Resolver<'_>) -> Result<Self> {
        Ok(Self {
            db: resolver.resolve::<dyn Database>()?,
            cache: resolver.resolve::<dyn Cache>()?,
        })
    }
}

impl Lifecycle for ComplexService {}

impl Complex for ComplexService {
    fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }
}

// === Циклическая пара ===

pub trait ServiceA: Lifecycle {}
pub trait ServiceB: Lifecycle {}

/// Соседи ссылаются друг на друга через контейнер, а не через `Arc`
pub struct CircularA {
    container: WeakContainer,
}

impl CircularA {
    pub fn new(container: WeakContainer) -> Self {
        Self { container }
    }

    pub fn peer(&self) -> Option<Arc<dyn ServiceB>> {
        self.container.upgrade()?.try_resolve::<dyn ServiceB>()
    }
}

pub struct CircularB {
    container: WeakContainer,
}

impl CircularB {
    pub fn new(container: WeakContainer) -> Self {
        Self { container }
    }

    pub fn peer(&self) -> Option<Arc<dyn ServiceA>> {
        self.container.upgrade()?.try_resolve::<dyn ServiceA>()
    }
}

impl Lifecycle for CircularA {}
impl ServiceA for CircularA {}
impl Lifecycle for CircularB {}
impl ServiceB for CircularB {}

// === Цепочка Level1 -> Level2 -> Level3 ===

pub trait Level1: Lifecycle {
    fn describe(&self) -> String;
}
pub trait Level2: Lifecycle {
    fn describe(&self) -> String;
}
pub trait Level3: Lifecycle {
    fn describe(&self) -> String;
}

pub struct Level1Service {
    next: Arc<dyn Level2>,
    log: EventLog,
}

pub struct Level2Service {
    next: Arc<dyn Level3>,
    log: EventLog,
}

pub struct Level3Service {
    log: EventLog,
}

impl Level1Service {
    pub fn new(resolver: &Resolver<'_>, log: EventLog) -> Result<Self> {
        Ok(Self {
            next: resolver.resolve::<dyn Level2>()?,
            log,
        })
    }
}

impl Level2Service {
    pub fn new(resolver: &Resolver<'_>, log: EventLog) -> Result<Self> {
        Ok(Self {
            next: resolver.resolve::<dyn Level3>()?,
            log,
        })
    }
}

impl Level3Service {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Lifecycle for Level1Service {
    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.log.push("shutdown:Level1");
        Ok(())
    }
}

impl Lifecycle for Level2Service {
    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.log.push("shutdown:Level2");
        Ok(())
    }
}

impl Lifecycle for Level3Service {
    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.log.push("shutdown:Level3");
        Ok(())
    }
}

impl Level1 for Level1Service {
    fn describe(&self) -> String {
        format!("Level1 -> {}", self.next.describe())
    }
}

impl Level2 for Level2Service {
    fn describe(&self) -> String {
        format!("Level2 -> {}", self.next.describe())
    }
}

impl Level3 for Level3Service {
    fn describe(&self) -> String {
        "Level3".to_string()
    }
}

// === Счётчик конструирования ===

pub trait Counter: Lifecycle {
    fn id(&self) -> usize;
}

/// Каждый экземпляр получает порядковый номер из общего счётчика
pub struct SingletonTestService {
    id: usize,
}

impl SingletonTestService {
    pub fn new(constructions: &AtomicUsize) -> Self {
        Self {
            id: constructions.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

impl Lifecycle for SingletonTestService {}

impl Counter for SingletonTestService {
    fn id(&self) -> usize {
        self.id
    }
}

// === Versioned: отличает реализации при подмене binding-а ===

pub trait Versioned: Lifecycle {
    fn version(&self) -> u32;
}

pub struct VersionedService {
    version: u32,
    log: EventLog,
}

impl VersionedService {
    pub fn new(version: u32, log: &EventLog) -> Self {
        Self {
            version,
            log: log.clone(),
        }
    }
}

impl Lifecycle for VersionedService {
    fn on_shutdown(&self, _ctx: &ContainerContext) -> Result<()> {
        self.log.push(format!("shutdown:v{}", self.version));
        Ok(())
    }
}

impl Versioned for VersionedService {
    fn version(&self) -> u32 {
        self.version
    }
}
