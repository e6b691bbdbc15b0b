//! Content negotiation over request headers.
//!
//! [`Negotiator`] reads `Accept` and `Content-Type` from an [`http::HeaderMap`] and asks the
//! [`ConverterRegistry`] for the converter that serves a route's entity types.

use crate::converter::{Converter, ConverterRegistry, Selection};
use crate::entity_type::EntityType;
use crate::error::{MediaTypeError, NegotiationError};
use crate::media_type::{MediaType, parse_accept};
use http::HeaderMap;
use http::header::{ACCEPT, CONTENT_TYPE, ToStrError};
use mime::Mime;

/// The client's acceptable media types in preference order.
///
/// Several `Accept` lines are read as one comma-separated list. A missing or empty header
/// accepts anything (`*/*`).
///
/// # Errors
///
/// [`NegotiationError::MalformedHeader`] when a value is not visible ASCII or not a list of
/// media types.
pub fn acceptable_media_types(headers: &HeaderMap) -> Result<Vec<MediaType>, NegotiationError> {
    let mut joined = String::new();
    for value in headers.get_all(ACCEPT) {
        let value = value.to_str().map_err(|e| NegotiationError::malformed_header("Accept", malformed_value(e)))?;
        if !joined.is_empty() {
            joined.push(',');
        }
        joined.push_str(value);
    }

    let media_types = parse_accept(&joined).map_err(|e| NegotiationError::malformed_header("Accept", e))?;
    if media_types.is_empty() { Ok(vec![MediaType::any()]) } else { Ok(media_types) }
}

/// The request's `Content-Type`, if present, parameters included.
pub fn content_type(headers: &HeaderMap) -> Result<Option<Mime>, NegotiationError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|e| NegotiationError::malformed_header("Content-Type", malformed_value(e)))?;
    let mime = value
        .trim()
        .parse::<Mime>()
        .map_err(|e| NegotiationError::malformed_header("Content-Type", MediaTypeError::malformed(value, e)))?;
    Ok(Some(mime))
}

fn malformed_value(e: ToStrError) -> MediaTypeError {
    MediaTypeError::malformed("<opaque>", e)
}

#[derive(Debug, Clone, Copy)]
pub struct Negotiator<'r> {
    registry: &'r ConverterRegistry,
}

impl<'r> Negotiator<'r> {
    pub fn new(registry: &'r ConverterRegistry) -> Self {
        Self { registry }
    }

    /// Selects how to encode `entity_type` for the client that sent `headers`.
    pub fn select_response(&self, entity_type: &EntityType, headers: &HeaderMap) -> Result<Selection<'r>, NegotiationError> {
        let accept = acceptable_media_types(headers)?;
        self.registry.lookup_for_encode(entity_type, &accept)
    }

    /// Selects how to decode a request body of `entity_type`, returning the converter and
    /// the declared content type.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::MissingContentType`] when the request has no `Content-Type`.
    pub fn select_request(
        &self,
        entity_type: &EntityType,
        headers: &HeaderMap,
    ) -> Result<(&'r dyn Converter, Mime), NegotiationError> {
        let content_type =
            content_type(headers)?.ok_or_else(|| NegotiationError::MissingContentType { entity: entity_type.to_string() })?;
        let converter = self.registry.lookup_for_decode(entity_type, &MediaType::new(content_type.clone()))?;
        Ok((converter, content_type))
    }
}
