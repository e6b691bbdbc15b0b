//! The hot-swappable pair of route table and converter registry, and the per-request
//! [`Exchange`] resolved against it.
//!
//! A [`RestService`] holds the active [`Snapshot`] in an [`ArcSwap`]. Publishing a new
//! snapshot replaces router and registry together in one atomic store, so a request sees
//! either the old pair or the new pair, never a mix. An [`Exchange`] keeps the snapshot it
//! was resolved against alive until the response is written.

use crate::converter::{ConverterRegistry, Entity};
use crate::entity_type::EntityType;
use crate::error::{ConversionError, NegotiationError, RestError, RouteTableError};
use crate::media_type::MediaType;
use crate::negotiation::{acceptable_media_types, content_type};
use crate::router::{Arguments, BoundArguments, Route, RouteMatch, Router};
use arc_swap::ArcSwap;
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderValue, Response, StatusCode, Version, header};
use http_body::Body;
use http_body_util::BodyExt;
use mime::Mime;
use std::any::Any;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info};

/// One immutable router and registry pair.
#[derive(Debug)]
pub struct Snapshot<H> {
    router: Router<H>,
    registry: ConverterRegistry,
}

impl<H> Snapshot<H> {
    pub fn new(router: Router<H>, registry: ConverterRegistry) -> Self {
        Self { router, registry }
    }

    #[inline]
    pub fn router(&self) -> &Router<H> {
        &self.router
    }

    #[inline]
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }
}

pub struct RestService<H> {
    current: ArcSwap<Snapshot<H>>,
}

impl<H> RestService<H> {
    pub fn new(router: Router<H>, registry: ConverterRegistry) -> Self {
        Self { current: ArcSwap::from_pointee(Snapshot::new(router, registry)) }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<H>> {
        self.current.load_full()
    }

    /// Atomically replaces the active snapshot. Exchanges already in flight keep the
    /// snapshot they started with.
    pub fn publish(&self, router: Router<H>, registry: ConverterRegistry) {
        let routes = router.len();
        self.current.store(Arc::new(Snapshot::new(router, registry)));
        info!(routes, "published new route snapshot");
    }

    /// Compiles `routes` and publishes them with `registry`. On failure the active snapshot
    /// stays in place.
    pub fn reload(
        &self,
        routes: impl IntoIterator<Item = Route<H>>,
        registry: ConverterRegistry,
    ) -> Result<(), RouteTableError> {
        match Router::load(routes) {
            Ok(router) => {
                self.publish(router, registry);
                Ok(())
            }
            Err(e) => {
                error!(cause = %e, "rejected route table, keeping the active snapshot");
                Err(e)
            }
        }
    }

    /// Resolves a request head against the active snapshot.
    ///
    /// Routing, argument coercion and the availability of request and response
    /// representations are all checked here, before any handler runs.
    ///
    /// # Errors
    ///
    /// Any [`RestError`] except [`RestError::Decode`] and [`RestError::Encode`].
    pub fn begin(&self, parts: &Parts) -> Result<Exchange<H>, RestError> {
        let snapshot = self.snapshot();
        let target = parts.uri.path_and_query().map_or_else(|| parts.uri.path(), |pq| pq.as_str());

        let route_match = snapshot.router().resolve(&parts.method, target)?;
        let route = route_match.route();
        let bound = route_match.arguments().bind(route, snapshot.registry())?;

        let accept = match route.response_entity() {
            Some(entity_type) => {
                let accept = acceptable_media_types(&parts.headers)?;
                snapshot.registry().lookup_for_encode(entity_type, &accept)?;
                accept
            }
            None => Vec::new(),
        };

        let content_type = match route.request_entity() {
            Some(entity_type) => {
                let content_type = content_type(&parts.headers)?
                    .ok_or_else(|| NegotiationError::MissingContentType { entity: entity_type.to_string() })?;
                snapshot.registry().lookup_for_decode(entity_type, &MediaType::new(content_type.clone()))?;
                Some(content_type)
            }
            None => None,
        };

        Ok(Exchange { snapshot, route_match, bound, accept, content_type, version: parts.version })
    }
}

impl<H> fmt::Debug for RestService<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestService").field("routes", &self.current.load().router().len()).finish()
    }
}

/// A request resolved against one snapshot.
pub struct Exchange<H> {
    snapshot: Arc<Snapshot<H>>,
    route_match: RouteMatch<H>,
    bound: BoundArguments,
    accept: Vec<MediaType>,
    content_type: Option<Mime>,
    version: Version,
}

impl<H> Exchange<H> {
    #[inline]
    pub fn snapshot(&self) -> &Snapshot<H> {
        &self.snapshot
    }

    #[inline]
    pub fn route(&self) -> &Route<H> {
        self.route_match.route()
    }

    #[inline]
    pub fn target(&self) -> &H {
        self.route_match.target()
    }

    /// Raw argument values, as extracted from the request target.
    #[inline]
    pub fn arguments(&self) -> &Arguments {
        self.route_match.arguments()
    }

    /// Arguments coerced to their declared types.
    #[inline]
    pub fn bound(&self) -> &BoundArguments {
        &self.bound
    }

    /// Acceptable response media types; empty when the route has no response entity.
    #[inline]
    pub fn accept(&self) -> &[MediaType] {
        &self.accept
    }

    /// The request's `Content-Type` with its parameters; `None` when the route has no
    /// request entity.
    #[inline]
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Decodes the request entity from a complete body. `None` when the route declares no
    /// request entity.
    pub fn read_entity(&self, body: Bytes) -> Result<Option<Entity>, RestError> {
        let (Some(entity_type), Some(content_type)) = (self.route().request_entity(), self.content_type.as_ref()) else {
            return Ok(None);
        };
        self.snapshot.registry().decode(body, entity_type, content_type, self.arguments()).map(Some)
    }

    /// Collects `body` and decodes the request entity from it.
    pub async fn read_body<B>(&self, body: B) -> Result<Option<Entity>, RestError>
    where
        B: Body,
        B::Error: Display,
    {
        let bytes = body.collect().await.map_err(|e| RestError::decode(ConversionError::body(e)))?.to_bytes();
        self.read_entity(bytes)
    }

    /// Encodes the response entity with the negotiated media type.
    ///
    /// Routes without a response entity answer `204 No Content` and ignore `entity`.
    pub fn write_entity(&self, entity: &dyn Any) -> Result<Response<Bytes>, RestError> {
        let Some(entity_type) = self.route().response_entity() else {
            let mut response = Response::new(Bytes::new());
            *response.status_mut() = StatusCode::NO_CONTENT;
            return Ok(response);
        };

        let encoded = self.snapshot.registry().encode(entity, entity_type, &self.accept, self.arguments())?;
        let (content_type, body) = encoded.into_parts();
        let content_type = HeaderValue::from_str(content_type.as_ref())
            .map_err(|e| RestError::encode(ConversionError::malformed("content type", e)))?;

        let mut response = Response::new(body);
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        response.headers_mut().insert(header::VARY, HeaderValue::from_static("accept"));
        Ok(response)
    }

    /// Renders `error` for the protocol version of this exchange.
    pub fn error_response(&self, error: RestError) -> Response<Bytes> {
        error.into_response(self.version)
    }

    /// The response entity type declared by the route.
    pub fn response_entity(&self) -> Option<&EntityType> {
        self.route().response_entity()
    }
}

impl<H> fmt::Debug for Exchange<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("route", &self.route().to_string())
            .field("arguments", self.arguments())
            .field("accept", &self.accept)
            .field("content_type", &self.content_type)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
