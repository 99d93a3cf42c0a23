//! 🚫 DI ERROR HANDLING
//!
//! Единый error type для всех операций контейнера. Ошибки построения
//! детерминированы: движок их не повторяет и не проглатывает, за
//! исключением best-effort shutdown, где сбои собираются в агрегат.
//!
//! Hooks и фабрики возвращают `anyhow::Result`, поэтому причины
//! (`cause`) хранятся как `anyhow::Error`.

use anyhow::Context;
use std::fmt::Write as _;
use thiserror::Error;

/// Основной error type контейнера
#[derive(Debug, Error)]
pub enum DIError {
    /// Для ключа нет binding
    #[error("Service {key} is not registered")]
    NotRegistered { key: String },

    /// Тип транзитивно зависит сам от себя; path содержит полный цикл
    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// Фабрика вернула ошибку до вызова OnBoot
    #[error("Factory for {key} failed: {cause}")]
    FactoryFailed {
        key: String,
        #[source]
        cause: anyhow::Error,
    },

    /// Фабрика отработала, но OnBoot вернул ошибку; экземпляр отброшен
    #[error("Boot of {key} failed: {cause}")]
    BootFailed {
        key: String,
        #[source]
        cause: anyhow::Error,
    },

    /// Зарегистрированная реализация не удовлетворяет запрошенному интерфейсу
    #[error("Type mismatch for {key}: wanted {wanted}, registered {got}")]
    TypeMismatch {
        key: String,
        wanted: String,
        got: String,
    },

    /// Один или несколько OnShutdown завершились с ошибкой
    #[error("{} shutdown hook(s) failed: {}", .failures.len(), format_failures(.failures))]
    ShutdownAggregate { failures: Vec<ShutdownFailure> },

    /// Ожидание lock построения singleton превысило настроенный лимит
    #[error("Timed out after {waited_ms}ms waiting for construction of {key}")]
    ConstructionTimeout { key: String, waited_ms: u64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Сбой одного OnShutdown hook
#[derive(Debug)]
pub struct ShutdownFailure {
    pub key: String,
    pub cause: anyhow::Error,
}

fn format_failures(failures: &[ShutdownFailure]) -> String {
    let mut out = String::new();
    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{}: {}", failure.key, failure.cause);
    }
    out
}

pub type DIResult<T> = Result<T, DIError>;

impl DIError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DIError::Configuration {
            message: message.into(),
        }
    }

    /// Можно ли повторить операцию без изменения графа или binding-ов
    pub fn is_recoverable(&self) -> bool {
        match self {
            DIError::NotRegistered { .. } => false, // нужна регистрация
            DIError::CircularDependency { .. } => false, // повтор не меняет граф
            DIError::FactoryFailed { .. } => false,
            DIError::BootFailed { .. } => false,
            DIError::TypeMismatch { .. } => false, // ошибка конфигурации
            DIError::ShutdownAggregate { .. } => true,
            DIError::ConstructionTimeout { .. } => true,
            DIError::Configuration { .. } => false,
        }
    }

    /// Категория ошибки для логов и мониторинга
    pub fn category(&self) -> &'static str {
        match self {
            DIError::NotRegistered { .. } => "registration",
            DIError::CircularDependency { .. } => "cycle",
            DIError::FactoryFailed { .. } => "factory",
            DIError::BootFailed { .. } => "boot",
            DIError::TypeMismatch { .. } => "type_mismatch",
            DIError::ShutdownAggregate { .. } => "shutdown",
            DIError::ConstructionTimeout { .. } => "timeout",
            DIError::Configuration { .. } => "configuration",
        }
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, DIError::CircularDependency { .. })
    }
}

/// Вынимает ошибку цикла из `anyhow::Error`, если hook просто пробросил её через `?`.
///
/// Цикл должен доходить до вызывающего кода неизменным, а не завёрнутым
/// в BootFailed каждого промежуточного уровня.
pub(crate) fn take_circular(err: anyhow::Error) -> Result<DIError, anyhow::Error> {
    let is_cycle = err
        .downcast_ref::<DIError>()
        .map(DIError::is_circular)
        .unwrap_or(false);
    if is_cycle {
        err.downcast::<DIError>()
    } else {
        Err(err)
    }
}

/// Helper trait для добавления DI context к anyhow errors
pub trait DIContextExt<T> {
    fn di_context(self, message: &str) -> anyhow::Result<T>;
    fn di_with_context<F>(self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> DIContextExt<T> for Result<T, DIError> {
    fn di_context(self, message: &str) -> anyhow::Result<T> {
        self.map_err(anyhow::Error::from)
            .with_context(|| message.to_string())
    }

    fn di_with_context<F>(self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(anyhow::Error::from).with_context(f)
    }
}
