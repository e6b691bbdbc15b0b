//! Error types for route tables, converter registries and request processing.
//!
//! Errors fall in two groups:
//!
//! - build-time errors ([`MediaTypeError`], [`TemplateError`], [`RouteTableError`],
//!   [`RegistryError`]) abort the construction of a router or registry, so a broken
//!   table never becomes active;
//! - request-time errors are gathered in [`RestError`], which knows the status code each
//!   kind maps to and can render itself as a plain-text response.
//!
//! Request-time errors are deterministic for a given input and never mutate the router or
//! registry they came from, so they are reported and never retried.

use crate::converter::FormatId;
use bytes::Bytes;
use http::{HeaderValue, Method, Response, StatusCode, Version, header};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaTypeError {
    #[error("invalid media type '{value}': {reason}")]
    Malformed { value: String, reason: String },

    #[error("invalid quality value '{value}', expected 0..1 with at most 3 decimals")]
    InvalidQuality { value: String },
}

impl MediaTypeError {
    pub fn malformed<V: ToString, R: ToString>(value: V, reason: R) -> Self {
        Self::Malformed { value: value.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_quality<V: ToString>(value: V) -> Self {
        Self::InvalidQuality { value: value.to_string() }
    }
}

/// A route template that can never be matched consistently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("empty path segment in template")]
    EmptySegment,

    #[error("invalid path segment '{segment}': reserved character '{character}'")]
    InvalidSegment { segment: String, character: char },

    #[error("argument name must not be empty")]
    EmptyName,

    #[error("argument '{name}' is declared more than once")]
    DuplicateArgument { name: String },

    #[error("path variable '{name}' cannot be optional")]
    OptionalVariable { name: String },

    #[error("positional element '{element}' must precede matrix and query parameters")]
    PositionalAfterParameter { element: String },
}

impl TemplateError {
    pub fn duplicate_argument<S: ToString>(name: S) -> Self {
        Self::DuplicateArgument { name: name.to_string() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("ambiguous routes for {method} {shape}: '{first}' and '{second}'")]
    Ambiguous { method: Method, shape: String, first: String, second: String },

    #[error("route '{template}' conflicts with the route table: {reason}")]
    Conflict { template: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("format '{format}' is already registered")]
    DuplicateFormat { format: FormatId },

    #[error("converter for {entity} uses unregistered format '{format}'")]
    UnknownFormat { entity: String, format: FormatId },

    #[error("a converter for {entity} in format '{format}' is already registered")]
    DuplicateConverter { entity: String, format: FormatId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no route matches '{path}'{}", describe_unsatisfied(.unsatisfied))]
    RouteNotFound { path: String, unsatisfied: Vec<String> },

    #[error("method {method} is not allowed for '{path}', allowed: {}", join_methods(.allowed))]
    MethodNotAllowed { method: Method, path: String, allowed: Vec<Method> },

    #[error("path segment '{segment}' is not valid utf-8 once percent-decoded")]
    InvalidEncoding { segment: String },
}

impl RoutingError {
    pub fn not_found<S: ToString>(path: S, unsatisfied: Vec<String>) -> Self {
        Self::RouteNotFound { path: path.to_string(), unsatisfied }
    }

    pub fn method_not_allowed<S: ToString>(method: Method, path: S, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, path: path.to_string(), allowed }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentBindingError {
    #[error("argument '{name}' = '{value}' is not a valid {expected}: {source}")]
    Coercion {
        name: String,
        value: String,
        expected: String,
        #[source]
        source: ConversionError,
    },

    #[error("argument '{name}' has no text converter for {expected}")]
    NoConverter { name: String, expected: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("no acceptable representation of {entity} for [{requested}], available: [{offered}]")]
    NotAcceptable { entity: String, requested: String, offered: String },

    #[error("content type '{content_type}' is not supported for {entity}, supported: [{supported}]")]
    UnsupportedMediaType { entity: String, content_type: String, supported: String },

    #[error("request entity {entity} requires a Content-Type header")]
    MissingContentType { entity: String },

    #[error("invalid {header} header: {source}")]
    MalformedHeader {
        header: &'static str,
        #[source]
        source: MediaTypeError,
    },
}

impl NegotiationError {
    pub fn malformed_header(header: &'static str, source: MediaTypeError) -> Self {
        Self::MalformedHeader { header, source }
    }
}

/// A converter or format primitive failed while transforming an entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("malformed {subject}: {reason}")]
    Malformed { subject: String, reason: String },

    #[error("expected a {expected} representation, found {found}")]
    UnexpectedRepresentation { expected: &'static str, found: &'static str },

    #[error("expected an entity of type {expected}")]
    UnexpectedEntity { expected: String },

    #[error("{entity} requires type argument #{index}")]
    MissingTypeArgument { entity: String, index: usize },

    #[error("nested lookup failed: {source}")]
    Lookup {
        #[from]
        source: NegotiationError,
    },

    #[error("nested converter for {entity} uses format '{found}', expected '{expected}'")]
    FormatMismatch { entity: String, expected: FormatId, found: FormatId },

    #[error("format '{format}' has no registered codec")]
    UnknownFormat { format: FormatId },

    #[error("failed to read body: {reason}")]
    Body { reason: String },
}

impl ConversionError {
    pub fn malformed<S: ToString, R: ToString>(subject: S, reason: R) -> Self {
        Self::Malformed { subject: subject.to_string(), reason: reason.to_string() }
    }

    pub fn unexpected_entity<S: ToString>(expected: S) -> Self {
        Self::UnexpectedEntity { expected: expected.to_string() }
    }

    pub fn missing_type_argument<S: ToString>(entity: S, index: usize) -> Self {
        Self::MissingTypeArgument { entity: entity.to_string(), index }
    }

    pub fn body<S: ToString>(reason: S) -> Self {
        Self::Body { reason: reason.to_string() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("required argument '{name}' is missing")]
    MissingArgument { name: String },

    #[error("path variable '{name}' must not be empty")]
    EmptyVariable { name: String },
}

/// Every way a single request can fail between routing and response encoding.
#[derive(Error, Debug)]
pub enum RestError {
    #[error("routing error: {source}")]
    Routing {
        #[from]
        source: RoutingError,
    },

    #[error("argument error: {source}")]
    Binding {
        #[from]
        source: ArgumentBindingError,
    },

    #[error("negotiation error: {source}")]
    Negotiation {
        #[from]
        source: NegotiationError,
    },

    #[error("failed to decode request entity: {source}")]
    Decode { source: ConversionError },

    #[error("failed to encode response entity: {source}")]
    Encode { source: ConversionError },
}

impl RestError {
    pub fn decode(source: ConversionError) -> Self {
        Self::Decode { source }
    }

    pub fn encode(source: ConversionError) -> Self {
        Self::Encode { source }
    }

    /// The status code reported to a client speaking `version`.
    ///
    /// HTTP/1.0 and HTTP/0.9 clients predate `405 Method Not Allowed` handling in many
    /// user agents, so they receive `400 Bad Request` instead.
    pub fn status(&self, version: Version) -> StatusCode {
        match self {
            RestError::Routing { source: RoutingError::RouteNotFound { .. } } => StatusCode::NOT_FOUND,
            RestError::Routing { source: RoutingError::MethodNotAllowed { .. } } => {
                if version == Version::HTTP_09 || version == Version::HTTP_10 {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::METHOD_NOT_ALLOWED
                }
            }
            RestError::Routing { source: RoutingError::InvalidEncoding { .. } } => StatusCode::BAD_REQUEST,
            RestError::Binding { .. } => StatusCode::BAD_REQUEST,
            RestError::Negotiation { source } => match source {
                NegotiationError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
                NegotiationError::UnsupportedMediaType { .. } | NegotiationError::MissingContentType { .. } => {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                }
                NegotiationError::MalformedHeader { .. } => StatusCode::BAD_REQUEST,
            },
            RestError::Decode { .. } => StatusCode::BAD_REQUEST,
            RestError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as a plain-text diagnostic response.
    pub fn into_response(self, version: Version) -> Response<Bytes> {
        let status = self.status(version);
        let allow = match &self {
            RestError::Routing { source: RoutingError::MethodNotAllowed { allowed, .. } } => {
                HeaderValue::from_str(&join_methods(allowed)).ok()
            }
            _ => None,
        };

        let mut response = Response::new(Bytes::from(self.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        if let Some(allow) = allow {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}

fn join_methods(methods: &[Method]) -> String {
    methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ")
}

fn describe_unsatisfied(unsatisfied: &[String]) -> String {
    if unsatisfied.is_empty() {
        String::new()
    } else {
        format!(", missing required arguments: {}", unsatisfied.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_depends_on_version() {
        let error = RestError::from(RoutingError::method_not_allowed(Method::POST, "/users/42", vec![Method::GET]));

        assert_eq!(error.status(Version::HTTP_11), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.status(Version::HTTP_2), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.status(Version::HTTP_10), StatusCode::BAD_REQUEST);
        assert_eq!(error.status(Version::HTTP_09), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RestError::from(RoutingError::not_found("/x", vec![])), StatusCode::NOT_FOUND),
            (
                RestError::from(RoutingError::InvalidEncoding { segment: "%FF".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (
                RestError::from(ArgumentBindingError::NoConverter { name: "id".into(), expected: "u8".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (
                RestError::from(NegotiationError::NotAcceptable {
                    entity: "String".into(),
                    requested: "application/xml".into(),
                    offered: "text/plain".into(),
                }),
                StatusCode::NOT_ACCEPTABLE,
            ),
            (
                RestError::from(NegotiationError::MissingContentType { entity: "String".into() }),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (RestError::decode(ConversionError::body("reset")), StatusCode::BAD_REQUEST),
            (RestError::encode(ConversionError::unexpected_entity("i64")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(Version::HTTP_11), status, "{error}");
        }
    }

    #[test]
    fn test_into_response_sets_allow_header() {
        let error =
            RestError::from(RoutingError::method_not_allowed(Method::POST, "/users/42", vec![Method::GET, Method::PUT]));
        let response = error.into_response(Version::HTTP_11);

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, PUT");
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
        let body = std::str::from_utf8(response.body()).unwrap();
        assert!(body.contains("POST"));
        assert!(body.contains("/users/42"));
    }

    #[test]
    fn test_not_found_lists_unsatisfied_arguments() {
        let error = RoutingError::not_found("/search", vec!["q".to_string()]);
        assert_eq!(error.to_string(), "no route matches '/search', missing required arguments: q");
    }
}
