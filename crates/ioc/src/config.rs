//! Конфигурация контейнера.
//!
//! Источники по приоритету (последний выигрывает):
//! 1. preset / `Default`
//! 2. файл конфигурации (TOML, JSON, YAML по расширению)
//! 3. переменные окружения с префиксом `IOC_`

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

use crate::errors::{DIError, DIResult};

/// Настройки контейнера
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Имя контейнера в логах
    pub name: String,
    /// Подробные debug логи регистрации и разрешения
    pub verbose_logging: bool,
    /// Лимит ожидания per-key lock построения singleton-а.
    /// `None` - ждать без ограничения
    pub lock_wait_timeout_ms: Option<u64>,
    /// Вызывать `on_shutdown` у закэшированного singleton-а при перерегистрации ключа
    pub shutdown_on_override: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            verbose_logging: false,
            lock_wait_timeout_ms: None,
            shutdown_on_override: true,
        }
    }
}

impl ContainerConfig {
    /// Production: тихие логи, ожидание lock ограничено
    pub fn production() -> Self {
        Self {
            name: "production".to_string(),
            verbose_logging: false,
            lock_wait_timeout_ms: Some(30_000),
            shutdown_on_override: true,
        }
    }

    pub fn development() -> Self {
        Self {
            name: "development".to_string(),
            verbose_logging: true,
            lock_wait_timeout_ms: None,
            shutdown_on_override: true,
        }
    }

    /// Минимальная конфигурация для тестов
    pub fn minimal() -> Self {
        Self {
            name: "minimal".to_string(),
            verbose_logging: false,
            lock_wait_timeout_ms: Some(5_000),
            shutdown_on_override: false,
        }
    }

    pub fn from_preset_name(preset: &str) -> DIResult<Self> {
        match preset.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::production()),
            "development" | "dev" => Ok(Self::development()),
            "minimal" | "test" => Ok(Self::minimal()),
            "default" => Ok(Self::default()),
            other => Err(DIError::configuration(format!("Unknown preset: {}", other))),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> DIResult<()> {
        if self.name.trim().is_empty() {
            return Err(DIError::configuration("Container name must not be empty"));
        }
        if self.lock_wait_timeout_ms == Some(0) {
            return Err(DIError::configuration(
                "lock_wait_timeout_ms must be positive (omit it to wait indefinitely)",
            ));
        }
        Ok(())
    }
}

/// Загрузчик конфигурации из файлов и окружения
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env_prefix: "IOC".to_string(),
        }
    }

    /// Префикс переменных окружения (по умолчанию "IOC")
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Default + окружение
    pub fn load(&self) -> DIResult<ContainerConfig> {
        let mut config = ContainerConfig::default();
        self.apply_environment(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Файл + окружение
    pub fn load_with_file<P: AsRef<Path>>(&self, path: P) -> DIResult<ContainerConfig> {
        let mut config = self.load_from_file(path)?;
        self.apply_environment(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> DIResult<ContainerConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DIError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => self.load_from_toml(&content),
            Some("json") => self.load_from_json(&content),
            Some("yaml") | Some("yml") => self.load_from_yaml(&content),
            _ => Err(DIError::configuration(format!(
                "Unsupported configuration file format: {:?}",
                path.extension()
            ))),
        }
    }

    pub fn load_from_toml(&self, content: &str) -> DIResult<ContainerConfig> {
        toml::from_str(content).map_err(|e| DIError::configuration(format!("Invalid TOML: {}", e)))
    }

    pub fn load_from_json(&self, content: &str) -> DIResult<ContainerConfig> {
        serde_json::from_str(content)
            .map_err(|e| DIError::configuration(format!("Invalid JSON: {}", e)))
    }

    pub fn load_from_yaml(&self, content: &str) -> DIResult<ContainerConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| DIError::configuration(format!("Invalid YAML: {}", e)))
    }

    /// Применить переменные окружения `<PREFIX>_*`
    pub fn apply_environment(&self, config: &mut ContainerConfig) -> DIResult<()> {
        let prefix = format!("{}_", self.env_prefix);

        for (key, value) in env::vars() {
            if let Some(config_key) = key.strip_prefix(&prefix) {
                apply_env_var(config, config_key, &value)?;
            }
        }

        Ok(())
    }
}

fn apply_env_var(config: &mut ContainerConfig, key: &str, value: &str) -> DIResult<()> {
    match key.to_uppercase().as_str() {
        "NAME" => config.name = value.to_string(),
        "VERBOSE_LOGGING" => config.verbose_logging = parse_bool(key, value)?,
        "LOCK_WAIT_TIMEOUT_MS" => {
            config.lock_wait_timeout_ms = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(value.parse().map_err(|e| {
                    DIError::configuration(format!("Invalid {} value '{}': {}", key, value, e))
                })?)
            };
        }
        "SHUTDOWN_ON_OVERRIDE" => config.shutdown_on_override = parse_bool(key, value)?,
        // Чужие переменные с тем же префиксом игнорируем
        _ => {}
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> DIResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DIError::configuration(format!(
            "Invalid {} value '{}': expected a boolean",
            key, value
        ))),
    }
}
