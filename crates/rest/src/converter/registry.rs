use crate::converter::{
    ConversionContext, Converter, Entity, FormCodec, FormatCodec, FormatId, FromStrConverter, MultipartCodec, ObjectCodec,
    Representation, TextCodec,
};
use crate::entity_type::{EntityType, TypeKey};
use crate::error::{ConversionError, NegotiationError, RegistryError, RestError};
use crate::media_type::{MediaType, Quality};
use crate::router::Arguments;
use bytes::Bytes;
use mime::Mime;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, trace};

/// Immutable `(entity type, format) -> converter` and `format -> codec` tables.
///
/// Lookups are deterministic: converters of one entity type are considered in
/// registration order, and ties are always resolved in favour of the first candidate.
pub struct ConverterRegistry {
    formats: HashMap<FormatId, Box<dyn FormatCodec>>,
    converters: HashMap<TypeKey, Vec<Box<dyn Converter>>>,
}

/// The converter chosen to encode an entity and the concrete media type it produces.
pub struct Selection<'r> {
    converter: &'r dyn Converter,
    media_type: MediaType,
}

impl<'r> Selection<'r> {
    #[inline]
    pub fn converter(&self) -> &'r dyn Converter {
        self.converter
    }

    /// The negotiated type; its quality is the product of client and server qualities.
    #[inline]
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    #[inline]
    pub fn into_media_type(self) -> MediaType {
        self.media_type
    }
}

impl fmt::Debug for Selection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("entity_type", &self.converter.entity_type())
            .field("format", &self.converter.format())
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// An encoded response entity.
#[derive(Debug, Clone)]
pub struct Encoded {
    media_type: MediaType,
    content_type: Mime,
    body: Bytes,
}

impl Encoded {
    /// The negotiated media type.
    #[inline]
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// The `Content-Type` the codec wrote the body as, with any parameters it needs to be
    /// read back (a multipart boundary, for one).
    #[inline]
    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (Mime, Bytes) {
        (self.content_type, self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    weight: u32,
    client_specificity: u8,
    declared_specificity: u8,
}

impl ConverterRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Selects the converter and concrete media type that best satisfy `accept`.
    ///
    /// Every client media type is paired with every compatible declaration of every
    /// converter of the raw entity type. Pairs are ranked by the product of client and
    /// declared quality, then by client specificity, then by declared specificity; the
    /// first pair found wins a full tie. Pairs with a zero quality on either side and
    /// pairs that cannot name a concrete media type never win.
    ///
    /// A concrete type takes its client quality from the most specific range covering it,
    /// so `text/plain;q=0, */*` never yields `text/plain`.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::NotAcceptable`] when no pair qualifies.
    pub fn lookup_for_encode(&self, entity_type: &EntityType, accept: &[MediaType]) -> Result<Selection<'_>, NegotiationError> {
        let mut best: Option<(Rank, &dyn Converter, Mime)> = None;

        for client in accept.iter().filter(|client| !client.quality().is_zero()) {
            for converter in self.converters_of(entity_type.raw()) {
                for declared in converter.accepts().iter().filter(|declared| !declared.quality().is_zero()) {
                    let Some(mime) = declared.intersect(client) else {
                        continue;
                    };
                    if let Some(range) = governing_range(accept, client, &mime) {
                        trace!(%entity_type, %client, %range, media_type = %mime, "candidate governed by another range");
                        continue;
                    }
                    let rank = Rank {
                        weight: client.quality().weight(declared.quality()),
                        client_specificity: client.specificity(),
                        declared_specificity: declared.specificity(),
                    };
                    trace!(%entity_type, %client, %declared, ?rank, "encode candidate");
                    if best.as_ref().is_none_or(|(best_rank, ..)| rank > *best_rank) {
                        best = Some((rank, converter, mime));
                    }
                }
            }
        }

        match best {
            Some((rank, converter, mime)) => {
                let media_type = MediaType::new(mime).with_quality(Quality::from_weight(rank.weight));
                Ok(Selection { converter, media_type })
            }
            None => {
                let error = NegotiationError::NotAcceptable {
                    entity: entity_type.to_string(),
                    requested: join(accept.iter()),
                    offered: self.offered(entity_type.raw()),
                };
                debug!(cause = %error, "encode lookup failed");
                Err(error)
            }
        }
    }

    /// Selects the converter that reads `content_type` into the entity type.
    ///
    /// A declaration with the same `type/subtype` wins; otherwise the compatible
    /// declaration with the highest declared quality, the first registered on ties.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::UnsupportedMediaType`] when no declaration is compatible.
    pub fn lookup_for_decode(&self, entity_type: &EntityType, content_type: &MediaType) -> Result<&dyn Converter, NegotiationError> {
        let exact = self.converters_of(entity_type.raw()).find(|converter| {
            converter.accepts().iter().any(|declared| !declared.quality().is_zero() && declared.essence() == content_type.essence())
        });
        if let Some(converter) = exact {
            return Ok(converter);
        }

        let mut best: Option<(Quality, &dyn Converter)> = None;
        for converter in self.converters_of(entity_type.raw()) {
            for declared in converter.accepts() {
                if declared.quality().is_zero() || !declared.is_compatible(content_type) {
                    continue;
                }
                if best.as_ref().is_none_or(|(quality, _)| declared.quality() > *quality) {
                    best = Some((declared.quality(), converter));
                }
            }
        }

        best.map(|(_, converter)| converter).ok_or_else(|| {
            let error = NegotiationError::UnsupportedMediaType {
                entity: entity_type.to_string(),
                content_type: content_type.essence().to_string(),
                supported: self.offered(entity_type.raw()),
            };
            debug!(cause = %error, "decode lookup failed");
            error
        })
    }

    pub fn converter_for(&self, entity_type: TypeKey, format: FormatId) -> Option<&dyn Converter> {
        self.converters_of(entity_type).find(|converter| converter.format() == format)
    }

    pub fn codec(&self, format: FormatId) -> Result<&dyn FormatCodec, ConversionError> {
        self.formats.get(&format).map(|codec| &**codec).ok_or(ConversionError::UnknownFormat { format })
    }

    /// Negotiates, converts and writes `entity`.
    ///
    /// # Errors
    ///
    /// [`RestError::Negotiation`] when nothing in `accept` can be produced and
    /// [`RestError::Encode`] when conversion or writing fails.
    pub fn encode(
        &self,
        entity: &dyn Any,
        entity_type: &EntityType,
        accept: &[MediaType],
        attributes: &Arguments,
    ) -> Result<Encoded, RestError> {
        let selection = self.lookup_for_encode(entity_type, accept)?;
        let converter = selection.converter();
        let codec = self.codec(converter.format()).map_err(RestError::encode)?;

        let context = ConversionContext::new(self, selection.media_type(), converter.format(), attributes);
        let representation =
            converter.to_representation(entity, &context, entity_type.arguments()).map_err(RestError::encode)?;
        let (body, content_type) = codec.write(representation, selection.media_type().mime()).map_err(RestError::encode)?;

        Ok(Encoded { media_type: selection.into_media_type(), content_type, body })
    }

    /// Reads `body` as `content_type` and converts it into the entity type.
    ///
    /// `content_type` is the full header value; its parameters reach the codec.
    ///
    /// # Errors
    ///
    /// [`RestError::Negotiation`] when the content type is not supported and
    /// [`RestError::Decode`] when reading or conversion fails.
    pub fn decode(
        &self,
        body: Bytes,
        entity_type: &EntityType,
        content_type: &Mime,
        attributes: &Arguments,
    ) -> Result<Entity, RestError> {
        let media_type = MediaType::new(content_type.clone());
        let converter = self.lookup_for_decode(entity_type, &media_type)?;
        let codec = self.codec(converter.format()).map_err(RestError::decode)?;
        let representation = codec.read(body, content_type).map_err(RestError::decode)?;

        let context = ConversionContext::new(self, &media_type, converter.format(), attributes);
        converter.from_representation(representation, &context, entity_type.arguments()).map_err(RestError::decode)
    }

    /// [`decode`](Self::decode) for a non-generic entity type.
    pub fn decode_as<T: 'static>(&self, body: Bytes, content_type: &Mime, attributes: &Arguments) -> Result<T, RestError> {
        let entity = self.decode(body, &EntityType::of::<T>(), content_type, attributes)?;
        entity
            .downcast::<T>()
            .map(|entity| *entity)
            .map_err(|_entity| RestError::decode(ConversionError::unexpected_entity(type_name::<T>())))
    }

    /// Converts a raw route argument with the text converter of `entity_type`.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Lookup`] when the type has no text converter, any other
    /// [`ConversionError`] when the value does not convert.
    pub fn parse_text(&self, entity_type: &EntityType, raw: &str) -> Result<Entity, ConversionError> {
        let converter = self.converter_for(entity_type.raw(), FormatId::TEXT).ok_or_else(|| {
            NegotiationError::UnsupportedMediaType {
                entity: entity_type.to_string(),
                content_type: mime::TEXT_PLAIN.to_string(),
                supported: self.offered(entity_type.raw()),
            }
        })?;

        let media_type = converter
            .accepts()
            .iter()
            .find(|declared| declared.is_concrete())
            .cloned()
            .unwrap_or_else(|| MediaType::new(mime::TEXT_PLAIN));
        let context = ConversionContext::new(self, &media_type, FormatId::TEXT, Arguments::empty());
        converter.from_representation(Representation::Text(raw.to_string()), &context, entity_type.arguments())
    }

    fn converters_of(&self, entity_type: TypeKey) -> impl Iterator<Item = &dyn Converter> {
        self.converters.get(&entity_type).into_iter().flatten().map(|converter| &**converter)
    }

    fn offered(&self, entity_type: TypeKey) -> String {
        join(self.converters_of(entity_type).flat_map(|converter| converter.accepts().iter()))
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats = self.formats.keys().map(FormatId::name).collect::<Vec<_>>();
        formats.sort_unstable();
        let mut converters = self
            .converters
            .values()
            .flatten()
            .map(|converter| format!("{}: {}", converter.entity_type(), converter.format()))
            .collect::<Vec<_>>();
        converters.sort_unstable();
        f.debug_struct("ConverterRegistry").field("formats", &formats).field("converters", &converters).finish()
    }
}

/// The client range that decides the quality of `mime` in place of `client`: a more
/// specific range covering it, or an equally specific one excluding it with `q=0`.
fn governing_range<'a>(accept: &'a [MediaType], client: &MediaType, mime: &Mime) -> Option<&'a MediaType> {
    let candidate = MediaType::new(mime.clone());
    accept.iter().find(|range| {
        range.is_compatible(&candidate)
            && (range.specificity() > client.specificity()
                || (range.specificity() == client.specificity() && range.quality().is_zero()))
    })
}

fn join<'a>(media_types: impl Iterator<Item = &'a MediaType>) -> String {
    media_types.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

macro_rules! register_scalars {
    ($builder:expr, $($ty:ty),+ $(,)?) => {{
        let builder = $builder;
        $(let builder = builder.register(FromStrConverter::<$ty>::new())?;)+
        builder
    }};
}

/// Collects formats and converters; [`build`](Self::build) freezes them.
///
/// Formats must be registered before the converters that use them.
#[derive(Default)]
pub struct RegistryBuilder {
    formats: HashMap<FormatId, Box<dyn FormatCodec>>,
    converters: HashMap<TypeKey, Vec<Box<dyn Converter>>>,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("formats", &self.formats.len())
            .field("converters", &self.converters.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`RegistryError::DuplicateFormat`] when `format` already has a codec.
    pub fn register_format(mut self, format: FormatId, codec: impl FormatCodec + 'static) -> Result<Self, RegistryError> {
        if self.formats.contains_key(&format) {
            return Err(RegistryError::DuplicateFormat { format });
        }
        self.formats.insert(format, Box::new(codec));
        Ok(self)
    }

    /// # Errors
    ///
    /// [`RegistryError::UnknownFormat`] when the converter's format has no codec and
    /// [`RegistryError::DuplicateConverter`] when the entity type already has a converter
    /// in that format.
    pub fn register(mut self, converter: impl Converter) -> Result<Self, RegistryError> {
        let entity_type = converter.entity_type();
        let format = converter.format();

        if !self.formats.contains_key(&format) {
            return Err(RegistryError::UnknownFormat { entity: entity_type.to_string(), format });
        }

        let converters = self.converters.entry(entity_type).or_default();
        if converters.iter().any(|existing| existing.format() == format) {
            return Err(RegistryError::DuplicateConverter { entity: entity_type.to_string(), format });
        }
        converters.push(Box::new(converter));
        Ok(self)
    }

    /// Registers [`TextCodec`], [`FormCodec`], [`ObjectCodec`] and a default
    /// [`MultipartCodec`] under their standard format ids.
    pub fn with_default_formats(self) -> Result<Self, RegistryError> {
        self.register_format(FormatId::TEXT, TextCodec)?
            .register_format(FormatId::FORM, FormCodec)?
            .register_format(FormatId::OBJECT, ObjectCodec)?
            .register_format(FormatId::MULTIPART, MultipartCodec::default())
    }

    /// Registers `text/plain` converters for `String`, `bool`, `char` and the primitive
    /// numeric types. Requires the text format.
    pub fn with_scalars(self) -> Result<Self, RegistryError> {
        Ok(register_scalars!(
            self, String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
        ))
    }

    pub fn build(self) -> ConverterRegistry {
        info!(
            formats = self.formats.len(),
            entity_types = self.converters.len(),
            converters = self.converters.values().map(Vec::len).sum::<usize>(),
            "converter registry built"
        );
        ConverterRegistry { formats: self.formats, converters: self.converters }
    }
}
