//! Идентификатор сервиса в контейнере.
//!
//! Ключ бывает двух видов: type token (`TypeId` запрошенного интерфейса,
//! обычно `dyn Trait`) и явное строковое имя. Имя для отображения в
//! сравнении не участвует.

use std::{
    any::{type_name, TypeId},
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyId {
    Type(TypeId),
    Named(Cow<'static, str>),
}

/// Стабильный, сравнимый ключ абстрактного сервиса
#[derive(Clone)]
pub struct ServiceKey {
    id: KeyId,
    display: Cow<'static, str>,
}

impl ServiceKey {
    /// Ключ по типу интерфейса
    pub fn of<I: ?Sized + 'static>() -> Self {
        Self {
            id: KeyId::Type(TypeId::of::<I>()),
            display: Cow::Borrowed(type_name::<I>()),
        }
    }

    /// Явный строковый ключ (например "primary_db")
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        Self {
            id: KeyId::Named(name.clone()),
            display: name,
        }
    }

    pub fn name(&self) -> &str {
        &self.display
    }

    pub fn is_named(&self) -> bool {
        matches!(self.id, KeyId::Named(_))
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            KeyId::Type(_) => write!(f, "ServiceKey::Type({})", self.display),
            KeyId::Named(name) => write!(f, "ServiceKey::Named({})", name),
        }
    }
}
