use crate::converter::{ConverterRegistry, Entity};
use crate::error::{ArgumentBindingError, ConversionError};
use crate::router::Route;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::collections::hash_map::Iter;

static EMPTY: Lazy<Arguments> = Lazy::new(Arguments::new);

/// Raw argument values extracted from a request or supplied for URI generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: HashMap<String, String>,
}

impl Arguments {
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    /// A shared empty instance.
    pub fn empty() -> &'static Arguments {
        &EMPTY
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.values.iter()
    }

    /// Coerces every bound value to the value type its route element declares, using the
    /// registry's text converters.
    ///
    /// # Errors
    ///
    /// [`ArgumentBindingError::NoConverter`] when a declared value type has no text
    /// converter and [`ArgumentBindingError::Coercion`] when a value does not parse.
    pub fn bind<H>(&self, route: &Route<H>, registry: &ConverterRegistry) -> Result<BoundArguments, ArgumentBindingError> {
        let mut values = HashMap::with_capacity(self.values.len());
        for (_, parameter) in route.signature().parameters() {
            let Some(raw) = self.get(parameter.name()) else {
                continue;
            };

            let entity = registry.parse_text(parameter.value_type(), raw).map_err(|source| match source {
                ConversionError::Lookup { .. } => ArgumentBindingError::NoConverter {
                    name: parameter.name().to_string(),
                    expected: parameter.value_type().to_string(),
                },
                source => ArgumentBindingError::Coercion {
                    name: parameter.name().to_string(),
                    value: raw.to_string(),
                    expected: parameter.value_type().to_string(),
                    source,
                },
            })?;
            values.insert(parameter.name().to_string(), entity);
        }
        Ok(BoundArguments { values })
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Arguments coerced to their declared value types.
#[derive(Debug, Default)]
pub struct BoundArguments {
    values: HashMap<String, Entity>,
}

impl BoundArguments {
    /// The value bound to `name`, if present and of type `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(|entity| entity.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
