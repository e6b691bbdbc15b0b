//! Route tables and request resolution.
//!
//! Routes are grouped by their *shape*, the positional part of the template with variable
//! names erased (`/users/{p0}`), and each shape is indexed once in a [`matchit::Router`].
//! Resolution tries the shape matchit prefers first, then every other shape that fits the
//! path, checking the routes of each against the request method and the matrix and query
//! parameters.
//!
//! ```
//! use http::Method;
//! use micro_rest::router::{self, Router, Signature};
//!
//! let router = Router::builder()
//!     .route(router::get(Signature::builder().path("/users").variable::<u64>("id").build().unwrap(), "show"))
//!     .build()
//!     .unwrap();
//!
//! let matched = router.resolve(&Method::GET, "/users/42").unwrap();
//! assert_eq!(*matched.target(), "show");
//! assert_eq!(matched.arguments().get("id"), Some("42"));
//! ```

mod arguments;
mod route;
mod signature;
mod uri;

pub use arguments::{Arguments, BoundArguments};
pub use route::{Route, delete, get, head, options, patch, post, put, trace};
pub use signature::{ElementKind, Parameter, PathElement, Signature, SignatureBuilder};
pub use uri::create_uri;

use crate::error::{RouteTableError, RoutingError};
use http::Method;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};
use uri::encode_component;

type InnerRouter = matchit::Router<usize>;

/// An immutable, compiled route table.
pub struct Router<H> {
    inner_router: InnerRouter,
    groups: Vec<ShapeGroup<H>>,
    routes: Vec<Arc<Route<H>>>,
}

/// Routes sharing one shape.
struct ShapeGroup<H> {
    /// Encoded literals, `None` for variables.
    segments: Vec<Option<String>>,
    routes: Vec<Arc<Route<H>>>,
}

impl<H> ShapeGroup<H> {
    fn fits(&self, path: &[Segment]) -> bool {
        self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(expected, actual)| match expected {
                Some(literal) => *literal == actual.encoded,
                None => !actual.decoded.is_empty(),
            })
    }
}

impl<H> Router<H> {
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::new()
    }

    /// Compiles `routes` into a router.
    ///
    /// # Errors
    ///
    /// See [`RouterBuilder::build`].
    pub fn load(routes: impl IntoIterator<Item = Route<H>>) -> Result<Self, RouteTableError> {
        Self::builder().routes(routes).build()
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter().map(Arc::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolves `method` and a request target (`path[?query]`) to a single route.
    ///
    /// Every shape whose literals and variables fit the path is a candidate, shapes with
    /// literals at earlier positions first. The first route of the request method whose
    /// required arguments are all bound wins.
    ///
    /// # Errors
    ///
    /// - [`RoutingError::RouteNotFound`] when no route of this method matches the path and
    ///   its parameters, and no route of another method does either;
    /// - [`RoutingError::MethodNotAllowed`] when only routes of other methods match;
    /// - [`RoutingError::InvalidEncoding`] when a path segment is not valid percent-encoded
    ///   UTF-8.
    pub fn resolve(&self, method: &Method, target: &str) -> Result<RouteMatch<H>, RoutingError> {
        let target = RequestTarget::parse(target);
        let segments = parse_segments(target.path)?;

        let preferred = match self.inner_router.at(&encoded_path(&segments)) {
            Ok(matched) => Some(*matched.value),
            Err(e) => {
                trace!(path = target.path, cause = %e, "no preferred route shape");
                None
            }
        };

        let matrix = parse_pairs(target.matrix.replace(';', "&").as_str())?;
        let query = parse_pairs(target.query)?;

        let mut allowed = Vec::new();
        let mut unsatisfied = Vec::new();
        let others = (0..self.groups.len()).filter(|&index| Some(index) != preferred);
        for group in preferred.into_iter().chain(others).map(|index| &self.groups[index]) {
            if !group.fits(&segments) {
                continue;
            }

            for route in &group.routes {
                let (arguments, missing) = collect_arguments(route, &segments, &matrix, &query);
                let same_method = route.method() == method;

                if missing.is_empty() {
                    if same_method {
                        trace!(route = %route, "route matched");
                        return Ok(RouteMatch { route: Arc::clone(route), arguments });
                    }
                    if !allowed.contains(route.method()) {
                        allowed.push(route.method().clone());
                    }
                } else if same_method {
                    trace!(route = %route, ?missing, "route skipped, required arguments missing");
                    unsatisfied.extend(missing);
                }
            }
        }

        debug!(%method, path = target.path, ?allowed, ?unsatisfied, "no route matches request");
        if allowed.is_empty() {
            Err(RoutingError::not_found(target.path, unsatisfied))
        } else {
            Err(RoutingError::method_not_allowed(method.clone(), target.path, allowed))
        }
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes.iter().map(ToString::to_string).collect::<Vec<_>>()).finish()
    }
}

/// A resolved route with the raw arguments extracted from the request.
#[derive(Debug)]
pub struct RouteMatch<H> {
    route: Arc<Route<H>>,
    arguments: Arguments,
}

impl<H> RouteMatch<H> {
    #[inline]
    pub fn route(&self) -> &Route<H> {
        &self.route
    }

    #[inline]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    #[inline]
    pub fn target(&self) -> &H {
        self.route.target()
    }

    pub fn into_parts(self) -> (Arc<Route<H>>, Arguments) {
        (self.route, self.arguments)
    }
}

pub struct RouterBuilder<H> {
    routes: Vec<Route<H>>,
    shapes: HashMap<String, usize>,
    groups: Vec<(String, Vec<usize>)>,
}

impl<H> fmt::Debug for RouterBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("shapes", &self.groups.iter().map(|(shape, _)| shape).collect::<Vec<_>>()).finish()
    }
}

impl<H> RouterBuilder<H> {
    fn new() -> Self {
        Self { routes: Vec::new(), shapes: HashMap::new(), groups: Vec::new() }
    }

    pub fn route(mut self, route: Route<H>) -> Self {
        let shape = route.signature().shape();
        let index = self.routes.len();
        match self.shapes.get(&shape) {
            Some(&group) => self.groups[group].1.push(index),
            None => {
                self.shapes.insert(shape.clone(), self.groups.len());
                self.groups.push((shape, vec![index]));
            }
        }
        self.routes.push(route);
        self
    }

    pub fn routes(self, routes: impl IntoIterator<Item = Route<H>>) -> Self {
        routes.into_iter().fold(self, RouterBuilder::route)
    }

    /// Compiles the accumulated routes.
    ///
    /// # Errors
    ///
    /// [`RouteTableError::Ambiguous`] when two routes share a shape and a method, and
    /// [`RouteTableError::Conflict`] when a shape cannot be indexed next to the others.
    pub fn build(self) -> Result<Router<H>, RouteTableError> {
        let routes = self.routes.into_iter().map(Arc::new).collect::<Vec<_>>();

        let mut groups = Vec::with_capacity(self.groups.len());
        for (shape, members) in self.groups {
            let group = members.iter().map(|&index| Arc::clone(&routes[index])).collect::<Vec<_>>();
            for (i, route) in group.iter().enumerate() {
                if let Some(other) = group[..i].iter().find(|other| other.method() == route.method()) {
                    return Err(RouteTableError::Ambiguous {
                        method: route.method().clone(),
                        shape,
                        first: other.signature().to_string(),
                        second: route.signature().to_string(),
                    });
                }
            }
            groups.push((shape, group));
        }

        // literal segments before variables, position by position
        groups.sort_by_cached_key(|(_, group)| {
            group.first().map(|route| route.signature().shape_segments().iter().map(Option::is_none).collect::<Vec<_>>())
        });

        let mut inner_router = InnerRouter::new();
        let mut shape_groups = Vec::with_capacity(groups.len());
        for (index, (shape, group)) in groups.into_iter().enumerate() {
            let template = group.first().map(|route| route.signature().to_string()).unwrap_or_default();
            inner_router.insert(shape, index).map_err(|e| RouteTableError::Conflict { template, reason: e.to_string() })?;

            let segments = group.first().map(|route| route.signature().shape_segments()).unwrap_or_default();
            shape_groups.push(ShapeGroup { segments, routes: group });
        }

        info!(routes = routes.len(), shapes = shape_groups.len(), "route table built");
        Ok(Router { inner_router, groups: shape_groups, routes })
    }
}

/// A request target split into its path, matrix and query parts.
struct RequestTarget<'a> {
    path: &'a str,
    matrix: &'a str,
    query: &'a str,
}

impl<'a> RequestTarget<'a> {
    fn parse(target: &'a str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = match path {
            "" | "/" => "/",
            p => p.strip_suffix('/').unwrap_or(p),
        };

        let last_segment = path.rfind('/').map_or(0, |i| i + 1);
        let (path, matrix) = match path[last_segment..].find(';') {
            Some(i) => (&path[..last_segment + i], &path[last_segment + i + 1..]),
            None => (path, ""),
        };
        Self { path, matrix, query }
    }
}

/// One request path segment, decoded and re-encoded in the form literals are stored in.
struct Segment {
    decoded: String,
    encoded: String,
}

fn parse_segments(path: &str) -> Result<Vec<Segment>, RoutingError> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok(Vec::new());
    }

    path.split('/')
        .map(|raw| -> Result<Segment, RoutingError> {
            let decoded = percent_decode_str(raw).decode_utf8().map_err(|e| {
                debug!(segment = raw, cause = %e, "path segment is not utf-8");
                RoutingError::InvalidEncoding { segment: raw.to_string() }
            })?;
            let encoded = encode_component(&decoded).to_string();
            Ok(Segment { decoded: decoded.into_owned(), encoded })
        })
        .collect()
}

fn encoded_path(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(&segment.encoded);
        path
    })
}

fn parse_pairs(encoded: &str) -> Result<HashMap<String, String>, RoutingError> {
    if encoded.is_empty() {
        return Ok(HashMap::new());
    }
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(encoded)
        .map_err(|e| {
            debug!(parameters = encoded, cause = %e, "undecodable parameters");
            RoutingError::InvalidEncoding { segment: encoded.to_string() }
        })?;

    let mut values = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        values.entry(name).or_insert(value);
    }
    Ok(values)
}

/// Binds the route's elements, returning the bound arguments and the names of required
/// elements that found no value. `segments` must fit the route's shape.
fn collect_arguments<H>(
    route: &Route<H>,
    segments: &[Segment],
    matrix: &HashMap<String, String>,
    query: &HashMap<String, String>,
) -> (Arguments, Vec<String>) {
    let mut arguments = Arguments::new();
    let mut missing = Vec::new();

    for (element, segment) in route.signature().positional().zip(segments) {
        if let PathElement::Variable(p) = element {
            arguments.insert(p.name(), segment.decoded.as_str());
        }
    }

    for element in route.signature().elements() {
        let (p, values) = match element {
            PathElement::Path(_) | PathElement::Variable(_) => continue,
            PathElement::Matrix(p) => (p, matrix),
            PathElement::Query(p) => (p, query),
        };

        match values.get(p.name()) {
            Some(value) => {
                arguments.insert(p.name(), value.as_str());
            }
            None if p.is_optional() => {}
            None => missing.push(p.name().to_string()),
        }
    }
    (arguments, missing)
}
