use crate::converter::{Accepts, ConversionContext, Converter, Entity, FormatId, Representation, downcast_entity};
use crate::entity_type::{EntityType, TypeKey};
use crate::error::ConversionError;
use crate::media_type::MediaType;
use std::any::Any;
use std::fmt;

/// A heterogeneous triple whose component types are only known at runtime, through the
/// type arguments of its [`EntityType`].
pub struct Tuple3 {
    slots: [Entity; 3],
}

impl Tuple3 {
    pub fn new<A, B, C>(a: A, b: B, c: C) -> Self
    where
        A: Send + Sync + 'static,
        B: Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        Self { slots: [Box::new(a), Box::new(b), Box::new(c)] }
    }

    pub fn from_entities(slots: [Entity; 3]) -> Self {
        Self { slots }
    }

    /// The component at `index`, if it exists and is a `T`.
    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.downcast_ref::<T>())
    }

    /// `Tuple3<A, B, C>`
    pub fn entity_type(a: EntityType, b: EntityType, c: EntityType) -> EntityType {
        EntityType::generic::<Tuple3>([a, b, c])
    }
}

impl fmt::Debug for Tuple3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tuple3").finish_non_exhaustive()
    }
}

/// Renders a [`Tuple3`] as its three components joined by a delimiter, each component
/// converted by the text converter of its type argument.
#[derive(Debug, Clone)]
pub struct Tuple3Converter {
    accepts: Accepts,
    delimiter: char,
}

impl Tuple3Converter {
    /// Accepts `text/plain`, components separated by `,`.
    pub fn new() -> Self {
        Self { accepts: Accepts::single(MediaType::new(mime::TEXT_PLAIN)), delimiter: ',' }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_accepts(mut self, accepts: Accepts) -> Self {
        self.accepts = accepts;
        self
    }
}

impl Default for Tuple3Converter {
    fn default() -> Self {
        Self::new()
    }
}

fn type_argument(type_arguments: &[EntityType], index: usize) -> Result<&EntityType, ConversionError> {
    type_arguments.get(index).ok_or_else(|| ConversionError::missing_type_argument("Tuple3", index))
}

impl Converter for Tuple3Converter {
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<Tuple3>()
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
        context: &ConversionContext<'_>,
        type_arguments: &[EntityType],
    ) -> Result<Representation, ConversionError> {
        let tuple = downcast_entity::<Tuple3>(entity)?;

        let mut parts = Vec::with_capacity(3);
        for (index, slot) in tuple.slots.iter().enumerate() {
            let entity_type = type_argument(type_arguments, index)?;
            let part = context.encode_nested(&**slot, entity_type)?.into_text()?;
            if part.contains(self.delimiter) {
                return Err(ConversionError::malformed(
                    format!("Tuple3 component #{index}"),
                    format!("'{part}' contains the delimiter '{}'", self.delimiter),
                ));
            }
            parts.push(part);
        }

        let mut delimiter = [0; 4];
        Ok(Representation::Text(parts.join(self.delimiter.encode_utf8(&mut delimiter))))
    }

    fn from_representation(
        &self,
        representation: Representation,
        context: &ConversionContext<'_>,
        type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        let text = representation.into_text()?;
        let parts = text.split(self.delimiter).collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(ConversionError::malformed(
                "Tuple3",
                format!("expected 3 components separated by '{}', found {}", self.delimiter, parts.len()),
            ));
        }

        let mut slots = Vec::with_capacity(3);
        for (index, part) in parts.into_iter().enumerate() {
            let entity_type = type_argument(type_arguments, index)?;
            slots.push(context.decode_nested(Representation::Text(part.to_string()), entity_type)?);
        }

        let slots: [Entity; 3] =
            slots.try_into().map_err(|slots: Vec<Entity>| {
                ConversionError::malformed("Tuple3", format!("expected 3 components, decoded {}", slots.len()))
            })?;
        Ok(Box::new(Tuple3::from_entities(slots)))
    }
}
