use crate::converter::{Accepts, ConversionContext, Converter, Entity, FormatId, Representation, downcast_entity};
use crate::entity_type::{EntityType, TypeKey};
use crate::error::ConversionError;
use crate::media_type::MediaType;
use std::any::{Any, type_name};
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

/// A text converter for any type that round-trips through [`FromStr`] and [`Display`].
pub struct FromStrConverter<T> {
    accepts: Accepts,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FromStrConverter<T> {
    /// Accepts `text/plain`.
    pub fn new() -> Self {
        Self::with_accepts(Accepts::single(MediaType::new(mime::TEXT_PLAIN)))
    }

    pub fn with_accepts(accepts: Accepts) -> Self {
        Self { accepts, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for FromStrConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromStrConverter").field("entity_type", &type_name::<T>()).field("accepts", &self.accepts).finish()
    }
}

impl<T> Default for FromStrConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for FromStrConverter<T>
where
    T: FromStr + Display + Send + Sync + 'static,
    T::Err: Display,
{
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn format(&self) -> FormatId {
        FormatId::TEXT
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
        Ok(Representation::Text(downcast_entity::<T>(entity)?.to_string()))
    }

    fn from_representation(
        &self,
        representation: Representation,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        let text = representation.into_text()?;
        let value = text.parse::<T>().map_err(|e| ConversionError::malformed(type_name::<T>(), e))?;
        Ok(Box::new(value))
    }
}
