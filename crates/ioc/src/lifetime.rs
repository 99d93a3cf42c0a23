use serde::{Deserialize, Serialize};
use std::fmt;

/// Жизненный цикл компонента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// Singleton - один экземпляр на весь контейнер
    #[default]
    Singleton,
    /// Transient - новый экземпляр при каждом разрешении
    Transient,
}

impl Lifetime {
    pub fn is_singleton(self) -> bool {
        self == Lifetime::Singleton
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("singleton"),
            Lifetime::Transient => f.write_str("transient"),
        }
    }
}
