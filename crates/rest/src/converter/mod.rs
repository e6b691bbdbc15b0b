//! Entity converters and the registry that selects them.
//!
//! A [`Converter`] turns one raw entity type into the intermediate [`Representation`] of
//! one format family and back. The [`FormatCodec`] of that family turns the
//! representation into bytes. Converters of generic entities receive the entity's type
//! arguments and recurse into their components through the [`ConversionContext`], which
//! resolves nested converters in the same family for the negotiated media type.

mod format;
mod multipart;
mod registry;
mod scalar;
mod structured;
mod tuple;

pub use format::{FormCodec, FormatCodec, FormatId, ObjectCodec, TextCodec};
pub use multipart::{MultipartCodec, MultipartConverter, MultipartForm, MultipartFormConverter, Part};
pub use registry::{ConverterRegistry, Encoded, RegistryBuilder, Selection};
pub use scalar::FromStrConverter;
pub use structured::{FormConverter, JsonConverter};
pub use tuple::{Tuple3, Tuple3Converter};

#[cfg(test)]
pub(crate) use format::MockFormatCodec;

use crate::entity_type::{EntityType, TypeKey};
use crate::error::{ConversionError, MediaTypeError};
use crate::media_type::MediaType;
use crate::router::Arguments;
use std::any::{Any, type_name};
use std::slice;

/// A type-erased application entity.
pub type Entity = Box<dyn Any + Send + Sync>;

/// The format-neutral form of an entity, between converter and codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Representation {
    Text(String),
    Form(Vec<(String, String)>),
    Object(serde_json::Value),
    Multipart(Vec<Part>),
}

impl Representation {
    pub fn kind(&self) -> &'static str {
        match self {
            Representation::Text(_) => "text",
            Representation::Form(_) => "form",
            Representation::Object(_) => "object",
            Representation::Multipart(_) => "multipart",
        }
    }

    pub fn into_text(self) -> Result<String, ConversionError> {
        match self {
            Representation::Text(text) => Ok(text),
            other => Err(ConversionError::UnexpectedRepresentation { expected: "text", found: other.kind() }),
        }
    }

    pub fn into_form(self) -> Result<Vec<(String, String)>, ConversionError> {
        match self {
            Representation::Form(pairs) => Ok(pairs),
            other => Err(ConversionError::UnexpectedRepresentation { expected: "form", found: other.kind() }),
        }
    }

    pub fn into_object(self) -> Result<serde_json::Value, ConversionError> {
        match self {
            Representation::Object(value) => Ok(value),
            other => Err(ConversionError::UnexpectedRepresentation { expected: "object", found: other.kind() }),
        }
    }

    pub fn into_parts(self) -> Result<Vec<Part>, ConversionError> {
        match self {
            Representation::Multipart(parts) => Ok(parts),
            other => Err(ConversionError::UnexpectedRepresentation { expected: "multipart", found: other.kind() }),
        }
    }
}

/// The media types a converter can produce and consume, each with the server's quality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accepts {
    media_types: Vec<MediaType>,
}

impl Accepts {
    pub fn new(media_types: impl IntoIterator<Item = MediaType>) -> Self {
        Self { media_types: media_types.into_iter().collect() }
    }

    pub fn single(media_type: MediaType) -> Self {
        Self { media_types: vec![media_type] }
    }

    #[must_use]
    pub fn with(mut self, media_type: MediaType) -> Self {
        self.media_types.push(media_type);
        self
    }

    /// Parses declarations such as `["text/plain;q=0.8", "application/json"]`.
    pub fn parse<'a>(media_types: impl IntoIterator<Item = &'a str>) -> Result<Self, MediaTypeError> {
        media_types.into_iter().map(MediaType::parse).collect::<Result<Vec<_>, _>>().map(|media_types| Self { media_types })
    }

    pub fn iter(&self) -> slice::Iter<'_, MediaType> {
        self.media_types.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.media_types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.media_types.is_empty()
    }
}

impl<'a> IntoIterator for &'a Accepts {
    type Item = &'a MediaType;
    type IntoIter = slice::Iter<'a, MediaType>;

    fn into_iter(self) -> Self::IntoIter {
        self.media_types.iter()
    }
}

/// Converts one raw entity type to and from the representation of one format family.
///
/// `type_arguments` are the arguments of the [`EntityType`] being converted; they are
/// empty for non-generic entities.
pub trait Converter: Send + Sync + 'static {
    fn entity_type(&self) -> TypeKey;

    fn format(&self) -> FormatId;

    fn accepts(&self) -> &Accepts;

    fn to_representation(
        &self,
        entity: &dyn Any,
        context: &ConversionContext<'_>,
        type_arguments: &[EntityType],
    ) -> Result<Representation, ConversionError>;

    fn from_representation(
        &self,
        representation: Representation,
        context: &ConversionContext<'_>,
        type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError>;
}

/// What a converter sees of the exchange it takes part in.
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    registry: &'a ConverterRegistry,
    media_type: &'a MediaType,
    format: FormatId,
    attributes: &'a Arguments,
}

impl<'a> ConversionContext<'a> {
    pub fn new(registry: &'a ConverterRegistry, media_type: &'a MediaType, format: FormatId, attributes: &'a Arguments) -> Self {
        Self { registry, media_type, format, attributes }
    }

    #[inline]
    pub fn registry(&self) -> &'a ConverterRegistry {
        self.registry
    }

    /// The negotiated media type of the outermost entity.
    #[inline]
    pub fn media_type(&self) -> &'a MediaType {
        self.media_type
    }

    #[inline]
    pub fn format(&self) -> FormatId {
        self.format
    }

    /// Auxiliary named values, usually the raw arguments of the matched route.
    #[inline]
    pub fn attributes(&self) -> &'a Arguments {
        self.attributes
    }

    /// Converts a component of a generic entity with the converter the registry selects
    /// for `entity_type` and the negotiated media type.
    pub fn encode_nested(&self, entity: &dyn Any, entity_type: &EntityType) -> Result<Representation, ConversionError> {
        let selection = self.registry.lookup_for_encode(entity_type, slice::from_ref(self.media_type))?;
        let converter = selection.converter();
        self.check_format(entity_type, converter)?;
        converter.to_representation(entity, self, entity_type.arguments())
    }

    pub fn decode_nested(&self, representation: Representation, entity_type: &EntityType) -> Result<Entity, ConversionError> {
        let converter = self.registry.lookup_for_decode(entity_type, self.media_type)?;
        self.check_format(entity_type, converter)?;
        converter.from_representation(representation, self, entity_type.arguments())
    }

    fn check_format(&self, entity_type: &EntityType, converter: &dyn Converter) -> Result<(), ConversionError> {
        if converter.format() == self.format {
            Ok(())
        } else {
            Err(ConversionError::FormatMismatch {
                entity: entity_type.to_string(),
                expected: self.format,
                found: converter.format(),
            })
        }
    }
}

/// Borrows `entity` as a `T`, failing with [`ConversionError::UnexpectedEntity`].
pub fn downcast_entity<T: 'static>(entity: &dyn Any) -> Result<&T, ConversionError> {
    entity.downcast_ref::<T>().ok_or_else(|| ConversionError::unexpected_entity(type_name::<T>()))
}
