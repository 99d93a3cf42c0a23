//! Container Context - цепочка key/value, которая проходит через одно дерево разрешения.
//!
//! Контекст неизменяем: `with_value` создаёт дочерний узел, родитель
//! никогда не модифицируется. Дочерний узел держит разделяемую ссылку на
//! родителя и ищет значения сначала у себя, затем вверх по цепочке.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::Arc,
    time::Instant,
};

/// Значение в контексте
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Ключ идентификатора запроса
pub const REQUEST_ID_KEY: &str = "request_id";
/// Ключ deadline (`Instant`). Движок его не проверяет
pub const DEADLINE_KEY: &str = "deadline";

struct ContextNode {
    parent: Option<ContainerContext>,
    values: HashMap<String, ContextValue>,
}

/// Read-only контекст контейнера
#[derive(Clone)]
pub struct ContainerContext {
    node: Arc<ContextNode>,
}

impl ContainerContext {
    /// Пустой корневой контекст
    pub fn background() -> Self {
        Self {
            node: Arc::new(ContextNode {
                parent: None,
                values: HashMap::new(),
            }),
        }
    }

    /// Создать дочерний контекст с одним значением
    pub fn with_value<V>(&self, key: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        let mut values = HashMap::with_capacity(1);
        values.insert(key.into(), Arc::new(value) as ContextValue);
        self.child(values)
    }

    /// Создать дочерний контекст с набором значений
    pub fn with_values<I, K>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, ContextValue)>,
        K: Into<String>,
    {
        self.child(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn child(&self, values: HashMap<String, ContextValue>) -> Self {
        Self {
            node: Arc::new(ContextNode {
                parent: Some(self.clone()),
                values,
            }),
        }
    }

    /// Найти значение: локальная карта, затем цепочка родителей
    pub fn value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(value) = ctx.node.values.get(key) {
                return Some(value.as_ref());
            }
            current = ctx.node.parent.as_ref();
        }
        None
    }

    /// Типизированный поиск. Ближайшее значение другого типа даёт `None`
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.value(key)?.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        self.with_value(REQUEST_ID_KEY, request_id.into())
    }

    /// Дочерний контекст с новым uuid v4 в качестве request_id
    pub fn with_new_request_id(&self) -> Self {
        self.with_request_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get::<String>(REQUEST_ID_KEY).map(String::as_str)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.with_value(DEADLINE_KEY, deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.get::<Instant>(DEADLINE_KEY).copied()
    }

    /// true если deadline задан и уже прошёл
    pub fn is_expired(&self) -> bool {
        self.deadline()
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Количество узлов в цепочке (корень = 1)
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.node.parent.as_ref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.node.parent.as_ref();
        }
        depth
    }
}

impl Default for ContainerContext {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for ContainerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.node.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ContainerContext")
            .field("keys", &keys)
            .field("depth", &self.depth())
            .finish()
    }
}
