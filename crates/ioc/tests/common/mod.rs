//! Общие helpers для integration тестов
#![allow(dead_code)]

pub mod mock_services;

use ioc::{Container, ContainerConfig, Lifetime};
use mock_services::*;

pub use ::common::test_utils::init_test_logging;

/// Контейнер для тестов: подробные логи, без ограничения ожидания lock
pub fn test_container() -> Container {
    init_test_logging();
    Container::with_config(ContainerConfig::development().with_name("test"))
}

/// Database + Cache singleton-ы, пишущие в общий журнал
pub fn container_with_db_and_cache(log: &EventLog) -> Container {
    let container = test_container();

    let db_log = log.clone();
    container.register_singleton::<dyn Database, _>(move |_| {
        Ok(Box::new(MockDatabase::new(db_log.clone())))
    });

    let cache_log = log.clone();
    container.register_singleton::<dyn Cache, _>(move |_| {
        Ok(Box::new(MockCache::new(cache_log.clone())))
    });

    container
}

/// Цепочка Level1 -> Level2 -> Level3 с заданным lifetime
pub fn register_chain(container: &Container, lifetime: Lifetime, log: &EventLog) {
    let l1 = log.clone();
    container.register::<dyn Level1, _>(lifetime, move |r| {
        Ok(Box::new(Level1Service::new(r, l1.clone())?))
    });

    let l2 = log.clone();
    container.register::<dyn Level2, _>(lifetime, move |r| {
        Ok(Box::new(Level2Service::new(r, l2.clone())?))
    });

    let l3 = log.clone();
    container.register::<dyn Level3, _>(lifetime, move |_| {
        Ok(Box::new(Level3Service::new(l3.clone())))
    });
}
