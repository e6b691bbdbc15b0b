use crate::converter::Representation;
use crate::error::ConversionError;
use bytes::Bytes;
use mime::Mime;
use std::fmt;

/// Names a wire-format family. Every converter belongs to exactly one family, and each
/// family has exactly one [`FormatCodec`] in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatId(&'static str);

impl FormatId {
    /// Plain UTF-8 text, also used to coerce route arguments.
    pub const TEXT: FormatId = FormatId("text");

    /// `application/x-www-form-urlencoded` name/value pairs.
    pub const FORM: FormatId = FormatId("form");

    /// A JSON object tree.
    pub const OBJECT: FormatId = FormatId("object");

    /// `multipart/form-data` parts, text fields and files.
    pub const MULTIPART: FormatId = FormatId("multipart");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Reads and writes the intermediate representation of one format family.
///
/// Both directions see the full media type, parameters included, so a family can carry
/// framing such as a multipart boundary in the `Content-Type`.
#[cfg_attr(test, mockall::automock)]
pub trait FormatCodec: Send + Sync {
    fn read(&self, body: Bytes, content_type: &Mime) -> Result<Representation, ConversionError>;

    /// Writes `representation` as `media_type`, returning the body and the exact
    /// `Content-Type` to send it with.
    fn write(&self, representation: Representation, media_type: &Mime) -> Result<(Bytes, Mime), ConversionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl FormatCodec for TextCodec {
    fn read(&self, body: Bytes, _content_type: &Mime) -> Result<Representation, ConversionError> {
        let text = String::from_utf8(body.to_vec()).map_err(|e| ConversionError::malformed("text body", e))?;
        Ok(Representation::Text(text))
    }

    fn write(&self, representation: Representation, media_type: &Mime) -> Result<(Bytes, Mime), ConversionError> {
        Ok((Bytes::from(representation.into_text()?), media_type.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl FormatCodec for FormCodec {
    fn read(&self, body: Bytes, _content_type: &Mime) -> Result<Representation, ConversionError> {
        let pairs = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body)
            .map_err(|e| ConversionError::malformed("form body", e))?;
        Ok(Representation::Form(pairs))
    }

    fn write(&self, representation: Representation, media_type: &Mime) -> Result<(Bytes, Mime), ConversionError> {
        let pairs = representation.into_form()?;
        let encoded = serde_urlencoded::to_string(&pairs).map_err(|e| ConversionError::malformed("form pairs", e))?;
        Ok((Bytes::from(encoded), media_type.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectCodec;

impl FormatCodec for ObjectCodec {
    fn read(&self, body: Bytes, _content_type: &Mime) -> Result<Representation, ConversionError> {
        let value = serde_json::from_slice(&body).map_err(|e| ConversionError::malformed("json body", e))?;
        Ok(Representation::Object(value))
    }

    fn write(&self, representation: Representation, media_type: &Mime) -> Result<(Bytes, Mime), ConversionError> {
        let value = representation.into_object()?;
        let encoded = serde_json::to_vec(&value).map_err(|e| ConversionError::malformed("json value", e))?;
        Ok((Bytes::from(encoded), media_type.clone()))
    }
}
