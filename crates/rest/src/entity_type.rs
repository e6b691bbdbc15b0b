//! Runtime descriptors for the types that flow through converters and route arguments.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a raw Rust type. Equality and hashing only use the [`TypeId`]; the name is
/// kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: short_name(type_name::<T>()) }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A raw type together with its ordered type arguments, e.g. `Tuple3<i64, String, bool>`.
///
/// Converters are keyed by the raw type only; the arguments are handed to the converter so
/// that it can resolve converters for nested components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityType {
    raw: TypeKey,
    arguments: Vec<EntityType>,
}

impl EntityType {
    /// A non-generic entity type.
    pub fn of<T: 'static>() -> Self {
        Self { raw: TypeKey::of::<T>(), arguments: Vec::new() }
    }

    pub fn generic<T: 'static>(arguments: impl IntoIterator<Item = EntityType>) -> Self {
        Self { raw: TypeKey::of::<T>(), arguments: arguments.into_iter().collect() }
    }

    #[inline]
    pub fn raw(&self) -> TypeKey {
        self.raw
    }

    #[inline]
    pub fn arguments(&self) -> &[EntityType] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&EntityType> {
        self.arguments.get(index)
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        !self.arguments.is_empty()
    }
}

impl From<TypeKey> for EntityType {
    fn from(raw: TypeKey) -> Self {
        Self { raw, arguments: Vec::new() }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)?;
        if let Some((first, rest)) = self.arguments.split_first() {
            write!(f, "<{first}")?;
            for argument in rest {
                write!(f, ", {argument}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Strips the module path of non-generic names: `alloc::string::String` becomes `String`.
fn short_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Tuple<A, B>(A, B);

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<&'static str>());
        assert_eq!(TypeKey::of::<String>().name(), "String");
        assert_eq!(TypeKey::of::<i64>().to_string(), "i64");
    }

    #[test]
    fn test_generic_display() {
        let entity = EntityType::generic::<Tuple<(), ()>>([EntityType::of::<i64>(), EntityType::of::<String>()]);
        assert!(entity.is_generic());
        assert_eq!(entity.argument(1), Some(&EntityType::of::<String>()));
        assert!(entity.argument(2).is_none());
        assert!(entity.to_string().ends_with("<i64, String>"));
    }

    #[test]
    fn test_entity_type_as_map_key() {
        let mut map = HashMap::new();
        map.insert(EntityType::of::<u32>(), "u32");
        map.insert(EntityType::generic::<Vec<u8>>([EntityType::of::<u8>()]), "bytes");

        assert_eq!(map.get(&EntityType::of::<u32>()), Some(&"u32"));
        assert_eq!(map.get(&EntityType::generic::<Vec<u8>>([EntityType::of::<u8>()])), Some(&"bytes"));
        assert!(!map.contains_key(&EntityType::of::<Vec<u8>>()));
    }
}
