use crate::error::UriError;
use crate::router::{Arguments, Parameter, PathElement, Route};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, PercentEncode, utf8_percent_encode};
use std::fmt::Write;

/// Characters escaped in generated path segments and parameter values: everything except
/// the RFC 3986 unreserved set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Percent-encodes everything outside the unreserved set. Literal segments are matched in
/// this form.
pub(crate) fn encode_component(value: &str) -> PercentEncode<'_> {
    utf8_percent_encode(value, COMPONENT)
}

/// Builds the request target that resolves to `route` with `arguments`.
///
/// Literal segments, path variables and parameter values are percent-encoded. Matrix
/// parameters follow the path, query parameters come last, both in signature order.
/// Optional parameters without a value are left out.
///
/// # Errors
///
/// [`UriError::MissingArgument`] when a required argument has no value and
/// [`UriError::EmptyVariable`] when a path variable is bound to an empty string.
pub fn create_uri<H>(route: &Route<H>, arguments: &Arguments) -> Result<String, UriError> {
    let elements = route.signature().elements();
    let mut uri = String::new();

    for element in elements.iter().filter(|e| e.is_positional()) {
        uri.push('/');
        match element {
            PathElement::Path(literal) => {
                let _ = write!(uri, "{}", encode_component(literal));
            }
            PathElement::Variable(p) => {
                let value = arguments.get(p.name()).ok_or_else(|| missing(p.name()))?;
                if value.is_empty() {
                    return Err(UriError::EmptyVariable { name: p.name().to_string() });
                }
                let _ = write!(uri, "{}", encode_component(value));
            }
            PathElement::Matrix(_) | PathElement::Query(_) => {}
        }
    }
    if uri.is_empty() {
        uri.push('/');
    }

    for p in elements.iter().filter_map(matrix) {
        if let Some(value) = value_of(arguments, p.name(), p.is_optional())? {
            let _ = write!(uri, ";{}={}", encode_component(p.name()), encode_component(value));
        }
    }

    let mut separator = '?';
    for p in elements.iter().filter_map(query) {
        if let Some(value) = value_of(arguments, p.name(), p.is_optional())? {
            let _ = write!(
                uri,
                "{separator}{}={}",
                encode_component(p.name()),
                encode_component(value)
            );
            separator = '&';
        }
    }

    Ok(uri)
}

fn value_of<'a>(arguments: &'a Arguments, name: &str, optional: bool) -> Result<Option<&'a str>, UriError> {
    match arguments.get(name) {
        Some(value) => Ok(Some(value)),
        None if optional => Ok(None),
        None => Err(missing(name)),
    }
}

fn matrix(element: &PathElement) -> Option<&Parameter> {
    match element {
        PathElement::Matrix(p) => Some(p),
        _ => None,
    }
}

fn query(element: &PathElement) -> Option<&Parameter> {
    match element {
        PathElement::Query(p) => Some(p),
        _ => None,
    }
}

fn missing(name: &str) -> UriError {
    UriError::MissingArgument { name: name.to_string() }
}
