//! Dependency injection container.
//!
//! Сервисы регистрируются под абстрактным интерфейсом (`dyn Trait`, где
//! `Trait: Lifecycle`) вместе с фабрикой и lifetime. При разрешении
//! контейнер строит граф зависимостей, обнаруживает циклы, кэширует
//! singleton-ы (фабрика вызывается не более одного раза даже при
//! конкурентных запросах) и вызывает `on_boot` / `on_shutdown`.
//!
//! ```ignore
//! trait Database: Lifecycle {}
//!
//! let container = Container::new();
//! container.register_singleton::<dyn Database, _>(|_| Ok(Box::new(Postgres::default())));
//! let db = container.resolve::<dyn Database>()?;
//! container.shutdown()?;
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod errors;
pub mod instances;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod registry;
pub mod resolver;
pub mod stats;

pub use config::{ConfigLoader, ContainerConfig};
pub use container::{Container, WeakContainer};
pub use context::{ContainerContext, ContextValue};
pub use errors::{DIContextExt, DIError, DIResult, ShutdownFailure};
pub use key::ServiceKey;
pub use lifecycle::Lifecycle;
pub use lifetime::Lifetime;
pub use resolver::Resolver;
pub use stats::ContainerStats;
