use crate::converter::{Accepts, ConversionContext, Converter, Entity, FormatId, Representation, downcast_entity};
use crate::entity_type::{EntityType, TypeKey};
use crate::error::ConversionError;
use crate::media_type::MediaType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;

/// Converts a serde type to and from a JSON object tree.
pub struct JsonConverter<T> {
    accepts: Accepts,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T> {
    /// Accepts `application/json`.
    pub fn new() -> Self {
        Self::with_accepts(Accepts::single(MediaType::new(mime::APPLICATION_JSON)))
    }

    pub fn with_accepts(accepts: Accepts) -> Self {
        Self { accepts, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for JsonConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonConverter").field("entity_type", &type_name::<T>()).field("accepts", &self.accepts).finish()
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for JsonConverter<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn format(&self) -> FormatId {
        FormatId::OBJECT
    }

    fn accepts(&self) -> &Accepts {
        &self.accepts
    }

    fn to_representation(
        &self,
        entity: &dyn Any,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Representation, ConversionError> {
        let entity = downcast_entity::<T>(entity)?;
        let value = serde_json::to_value(entity).map_err(|e| ConversionError::malformed(type_name::<T>(), e))?;
        Ok(Representation::Object(value))
    }

    fn from_representation(
        &self,
        representation: Representation,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        let value = representation.into_object()?;
        let entity = serde_json::from_value::<T>(value).map_err(|e| ConversionError::malformed(type_name::<T>(), e))?;
        Ok(Box::new(entity))
    }
}

/// Converts a flat serde type to and from `application/x-www-form-urlencoded` pairs.
pub struct FormConverter<T> {
    accepts: Accepts,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FormConverter<T> {
    /// Accepts `application/x-www-form-urlencoded`.
    pub fn new() -> Self {
        Self::with_accepts(Accepts::single(MediaType::new(mime::APPLICATION_WWW_FORM_URLENCODED)))
    }

    pub fn with_accepts(accepts: Accepts) -> Self {
        Self { accepts, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for FormConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConverter").field("entity_type", &type_name::<T>()).field("accepts", &self.accepts).finish()
    }
}

impl<T> Default for FormConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for FormConverter<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn format(&self) -> FormatId {
        FormatId::FORM
    }

    fn accepts(&self) -> &Accepts {
        &self.accepts
    }

    fn to_representation(
        &self,
        entity: &dyn Any,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Representation, ConversionError> {
        let entity = downcast_entity::<T>(entity)?;
        to_pairs(entity).map(Representation::Form)
    }

    fn from_representation(
        &self,
        representation: Representation,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        let entity = from_pairs::<T>(&representation.into_form()?)?;
        Ok(Box::new(entity))
    }
}

/// Flattens a serde struct into name/value pairs the way a urlencoded form carries them.
pub(crate) fn to_pairs<T: Serialize>(entity: &T) -> Result<Vec<(String, String)>, ConversionError> {
    let encoded = serde_urlencoded::to_string(entity).map_err(|e| ConversionError::malformed(type_name::<T>(), e))?;
    serde_urlencoded::from_str::<Vec<(String, String)>>(&encoded).map_err(|e| ConversionError::malformed(type_name::<T>(), e))
}

pub(crate) fn from_pairs<T: DeserializeOwned>(pairs: &[(String, String)]) -> Result<T, ConversionError> {
    let encoded = serde_urlencoded::to_string(pairs).map_err(|e| ConversionError::malformed("form pairs", e))?;
    serde_urlencoded::from_str::<T>(&encoded).map_err(|e| ConversionError::malformed(type_name::<T>(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterRegistry;
    use crate::router::Arguments;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    fn jane() -> User {
        User { name: "jane".into(), age: 42 }
    }

    #[test]
    fn test_json_converter() {
        let registry = ConverterRegistry::builder().with_default_formats().unwrap().build();
        let media_type = MediaType::new(mime::APPLICATION_JSON);
        let context = ConversionContext::new(&registry, &media_type, FormatId::OBJECT, Arguments::empty());
        let converter = JsonConverter::<User>::new();

        let representation = converter.to_representation(&jane(), &context, &[]).unwrap();
        assert_eq!(representation, Representation::Object(json!({"name": "jane", "age": 42})));

        let entity = converter.from_representation(representation, &context, &[]).unwrap();
        assert_eq!(entity.downcast_ref::<User>(), Some(&jane()));

        let error = converter.from_representation(Representation::Object(json!({"name": 1})), &context, &[]);
        assert!(matches!(error, Err(ConversionError::Malformed { .. })));
    }

    #[test]
    fn test_form_converter() {
        let registry = ConverterRegistry::builder().with_default_formats().unwrap().build();
        let media_type = MediaType::new(mime::APPLICATION_WWW_FORM_URLENCODED);
        let context = ConversionContext::new(&registry, &media_type, FormatId::FORM, Arguments::empty());
        let converter = FormConverter::<User>::new();

        let representation = converter.to_representation(&jane(), &context, &[]).unwrap();
        assert_eq!(representation, Representation::Form(vec![("name".into(), "jane".into()), ("age".into(), "42".into())]));

        let entity = converter.from_representation(representation, &context, &[]).unwrap();
        assert_eq!(entity.downcast_ref::<User>(), Some(&jane()));

        let error = converter.from_representation(Representation::Form(vec![("name".into(), "x".into())]), &context, &[]);
        assert!(matches!(error, Err(ConversionError::Malformed { .. })));
    }
}
