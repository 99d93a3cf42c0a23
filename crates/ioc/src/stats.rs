use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики разрешения зависимостей
#[derive(Debug, Default)]
pub struct ResolutionStats {
    total_resolutions: AtomicU64,
    successful_resolutions: AtomicU64,
    failed_resolutions: AtomicU64,
    cache_hits: AtomicU64,
    factory_invocations: AtomicU64,
    boot_failures: AtomicU64,
    cycles_detected: AtomicU64,
}

impl ResolutionStats {
    pub fn record_attempt(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_factory_invocation(&self) {
        self.factory_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_boot_failure(&self) {
        self.boot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self) {
        self.cycles_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, registered_bindings: usize, cached_singletons: usize) -> ContainerStats {
        ContainerStats {
            registered_bindings,
            cached_singletons,
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            successful_resolutions: self.successful_resolutions.load(Ordering::Relaxed),
            failed_resolutions: self.failed_resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            factory_invocations: self.factory_invocations.load(Ordering::Relaxed),
            boot_failures: self.boot_failures.load(Ordering::Relaxed),
            cycles_detected: self.cycles_detected.load(Ordering::Relaxed),
        }
    }
}

/// Статистика контейнера для диагностики
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub registered_bindings: usize,
    pub cached_singletons: usize,
    pub total_resolutions: u64,
    pub successful_resolutions: u64,
    pub failed_resolutions: u64,
    pub cache_hits: u64,
    pub factory_invocations: u64,
    pub boot_failures: u64,
    pub cycles_detected: u64,
}

impl ContainerStats {
    /// Процент попаданий в кэш singleton-ов
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_resolutions > 0 {
            (self.cache_hits as f64 / self.total_resolutions as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_resolutions > 0 {
            (self.successful_resolutions as f64 / self.total_resolutions as f64) * 100.0
        } else {
            0.0
        }
    }
}
