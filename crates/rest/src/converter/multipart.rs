//! The `multipart/form-data` format family.
//!
//! [`MultipartCodec`] reads and writes boundary-delimited bodies as a list of [`Part`]s.
//! The boundary travels in the `Content-Type` parameter, so reading needs the full header
//! value and writing returns it. [`MultipartFormConverter`] hands the parts to handlers as
//! a [`MultipartForm`]; [`MultipartConverter`] binds the text fields to a flat serde struct.

use crate::converter::structured::{from_pairs, to_pairs};
use crate::converter::{Accepts, ConversionContext, Converter, Entity, FormatCodec, FormatId, Representation, downcast_entity};
use crate::entity_type::{EntityType, TypeKey};
use crate::error::ConversionError;
use crate::media_type::MediaType;
use crate::utils::ensure;
use bytes::{Bytes, BytesMut};
use mime::Mime;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, type_name};
use std::fmt::{self, Write};
use std::marker::PhantomData;
use std::str;

const DEFAULT_MAX_PARTS: usize = 128;
const DEFAULT_MAX_SIZE: usize = 8 * 1024 * 1024;
const BOUNDARY_PREFIX: &str = "micro-rest-";
const CRLF: &[u8] = b"\r\n";

/// One field or file of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<Mime>,
    data: Bytes,
}

impl Part {
    /// A plain form field.
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), filename: None, content_type: None, data: Bytes::from(value.into()) }
    }

    /// An uploaded file.
    pub fn file(name: impl Into<String>, filename: impl Into<String>, content_type: Mime, data: impl Into<Bytes>) -> Self {
        Self { name: name.into(), filename: Some(filename.into()), content_type: Some(content_type), data: data.into() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[inline]
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// The part's data as UTF-8, if it is.
    pub fn text(&self) -> Option<&str> {
        str::from_utf8(&self.data).ok()
    }
}

/// The parts of a `multipart/form-data` body in the order they were sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    #[must_use]
    pub fn with(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The text of the first non-file part called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.parts.iter().find(|part| !part.is_file() && part.name == name).and_then(Part::text)
    }

    /// The first file part called `name`.
    pub fn file(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.is_file() && part.name == name)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

/// Reads and writes `multipart/form-data` bodies.
///
/// Bodies above `max_size` bytes or with more than `max_parts` parts are refused before
/// they are converted.
#[derive(Debug, Clone, Copy)]
pub struct MultipartCodec {
    max_parts: usize,
    max_size: usize,
}

impl Default for MultipartCodec {
    fn default() -> Self {
        Self { max_parts: DEFAULT_MAX_PARTS, max_size: DEFAULT_MAX_SIZE }
    }
}

impl MultipartCodec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = max_parts;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    fn parse(&self, body: &Bytes, boundary: &str) -> Result<Vec<Part>, ConversionError> {
        let delimiter = format!("--{boundary}");
        let delimiter = delimiter.as_bytes();
        let closing = [CRLF, delimiter].concat();

        let mut position = find(body, delimiter, 0).ok_or_else(|| malformed("no opening boundary"))?;
        let mut parts = Vec::new();

        loop {
            position += delimiter.len();
            let rest = &body[position..];
            if rest.starts_with(b"--") {
                return Ok(parts);
            }
            ensure!(rest.starts_with(CRLF), malformed("boundary not followed by CRLF"));
            position += CRLF.len();
            ensure!(parts.len() < self.max_parts, malformed(format!("more than {} parts", self.max_parts)));

            let (headers, content_start) = if body[position..].starts_with(CRLF) {
                ("", position + CRLF.len())
            } else {
                let end = find(body, b"\r\n\r\n", position).ok_or_else(|| malformed("unterminated part headers"))?;
                let headers = str::from_utf8(&body[position..end]).map_err(|e| malformed(format!("part headers: {e}")))?;
                (headers, end + 4)
            };

            let content_end = find(body, &closing, content_start).ok_or_else(|| malformed("no closing boundary"))?;
            parts.push(parse_part(headers, body.slice(content_start..content_end))?);
            position = content_end + CRLF.len();
        }
    }
}

impl FormatCodec for MultipartCodec {
    fn read(&self, body: Bytes, content_type: &Mime) -> Result<Representation, ConversionError> {
        let boundary = content_type
            .get_param(mime::BOUNDARY)
            .map(|boundary| boundary.as_str().trim_matches('"').to_string())
            .filter(|boundary| !boundary.is_empty())
            .ok_or_else(|| malformed(format!("no boundary in `{content_type}`")))?;
        ensure!(body.len() <= self.max_size, malformed(format!("body larger than {} bytes", self.max_size)));

        self.parse(&body, &boundary).map(Representation::Multipart)
    }

    fn write(&self, representation: Representation, media_type: &Mime) -> Result<(Bytes, Mime), ConversionError> {
        let parts = representation.into_parts()?;
        let boundary = choose_boundary(&parts);

        let mut body = BytesMut::new();
        for part in &parts {
            let _ = write!(body, "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"", escape(&part.name));
            if let Some(filename) = &part.filename {
                let _ = write!(body, "; filename=\"{}\"", escape(filename));
            }
            if let Some(content_type) = &part.content_type {
                let _ = write!(body, "\r\nContent-Type: {content_type}");
            }
            body.extend_from_slice(b"\r\n\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(CRLF);
        }
        let _ = write!(body, "--{boundary}--\r\n");

        let content_type = format!("{}; boundary={boundary}", media_type.essence_str())
            .parse::<Mime>()
            .map_err(|e| ConversionError::malformed("multipart content type", e))?;
        Ok((body.freeze(), content_type))
    }
}

fn parse_part(headers: &str, data: Bytes) -> Result<Part, ConversionError> {
    let mut disposition = None;
    let mut content_type = None;

    for line in headers.split("\r\n").filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| malformed(format!("part header `{line}`")))?;
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            disposition = Some(parse_disposition(value)?);
        } else if name.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.parse::<Mime>().map_err(|e| ConversionError::malformed(value, e))?);
        }
    }

    let (name, filename) = disposition.ok_or_else(|| malformed("part without Content-Disposition"))?;
    Ok(Part { name, filename, content_type, data })
}

/// `form-data; name="field"; filename="a.txt"` to its name and filename.
fn parse_disposition(value: &str) -> Result<(String, Option<String>), ConversionError> {
    let mut params = value.split(';').map(str::trim);
    let kind = params.next().unwrap_or_default();
    ensure!(kind.eq_ignore_ascii_case("form-data"), malformed(format!("disposition `{kind}`")));

    let mut name = None;
    let mut filename = None;
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());
        if key.trim().eq_ignore_ascii_case("name") {
            name = Some(value);
        } else if key.trim().eq_ignore_ascii_case("filename") {
            ensure!(is_plain_filename(&value), malformed(format!("filename `{value}`")));
            filename = Some(value);
        }
    }

    let name = name.ok_or_else(|| malformed("Content-Disposition without a name"))?;
    Ok((name, filename))
}

fn unquote(value: &str) -> String {
    let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
    value.replace("%22", "\"").replace("%0D", "\r").replace("%0A", "\n")
}

fn escape(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

/// Rejects filenames that would escape an upload directory.
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains(['/', '\\', '\0'])
        && filename != "."
        && filename != ".."
}

/// The first generated boundary that occurs in no part.
fn choose_boundary(parts: &[Part]) -> String {
    let mut counter = 0_u64;
    loop {
        let boundary = format!("{BOUNDARY_PREFIX}{counter:016x}");
        let collides = parts.iter().any(|part| {
            find(&part.data, boundary.as_bytes(), 0).is_some()
                || part.name.contains(&boundary)
                || part.filename.as_deref().is_some_and(|filename| filename.contains(&boundary))
        });
        if !collides {
            return boundary;
        }
        counter += 1;
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack.get(from..)?.windows(needle.len()).position(|window| window == needle).map(|index| from + index)
}

fn malformed<R: ToString>(reason: R) -> ConversionError {
    ConversionError::malformed("multipart body", reason)
}

/// Passes the parts through as a [`MultipartForm`].
#[derive(Debug)]
pub struct MultipartFormConverter {
    accepts: Accepts,
}

impl MultipartFormConverter {
    /// Accepts `multipart/form-data`.
    pub fn new() -> Self {
        Self { accepts: Accepts::single(MediaType::new(mime::MULTIPART_FORM_DATA)) }
    }
}

impl Default for MultipartFormConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for MultipartFormConverter {
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<MultipartForm>()
    }

    fn format(&self) -> FormatId {
        FormatId::MULTIPART
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
        let form = downcast_entity::<MultipartForm>(entity)?;
        Ok(Representation::Multipart(form.parts.clone()))
    }

    fn from_representation(
        &self,
        representation: Representation,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        Ok(Box::new(MultipartForm::from_parts(representation.into_parts()?)))
    }
}

/// Binds the fields of a multipart form to a flat serde type, the way
/// [`FormConverter`](crate::converter::FormConverter) binds a urlencoded one. File parts
/// do not bind.
pub struct MultipartConverter<T> {
    accepts: Accepts,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MultipartConverter<T> {
    /// Accepts `multipart/form-data`.
    pub fn new() -> Self {
        Self::with_accepts(Accepts::single(MediaType::new(mime::MULTIPART_FORM_DATA)))
    }

    pub fn with_accepts(accepts: Accepts) -> Self {
        Self { accepts, _marker: PhantomData }
    }
}

impl<T> fmt::Debug for MultipartConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartConverter").field("entity_type", &type_name::<T>()).field("accepts", &self.accepts).finish()
    }
}

impl<T> Default for MultipartConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for MultipartConverter<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn entity_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn format(&self) -> FormatId {
        FormatId::MULTIPART
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
        let parts = to_pairs(entity)?.into_iter().map(|(name, value)| Part::field(name, value)).collect();
        Ok(Representation::Multipart(parts))
    }

    fn from_representation(
        &self,
        representation: Representation,
        _context: &ConversionContext<'_>,
        _type_arguments: &[EntityType],
    ) -> Result<Entity, ConversionError> {
        let pairs = representation
            .into_parts()?
            .into_iter()
            .map(|part| -> Result<(String, String), ConversionError> {
                ensure!(
                    !part.is_file(),
                    ConversionError::malformed(type_name::<T>(), format!("file part `{}` does not bind", part.name))
                );
                let value = String::from_utf8(part.data.to_vec()).map_err(|e| ConversionError::malformed(&part.name, e))?;
                Ok((part.name, value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(from_pairs::<T>(&pairs)?))
    }
}
