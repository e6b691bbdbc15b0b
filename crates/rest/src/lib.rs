//! Request routing and content negotiation for REST services.
//!
//! `micro-rest` sits between an HTTP transport and application handlers:
//!
//! - the [`Router`] compiles route templates made of literal segments, path variables,
//!   matrix parameters and query parameters, and resolves a method plus request target to
//!   exactly one [`Route`] with its raw arguments;
//! - the [`ConverterRegistry`] holds per-(entity type, format) converters and picks the
//!   best mutually acceptable media type for an entity and an `Accept` header;
//! - the [`RestService`] publishes router and registry together as one atomically
//!   swappable snapshot and starts an [`Exchange`] per request.
//!
//! # Example
//!
//! ```
//! use http::{Method, Request};
//! use micro_rest::converter::ConverterRegistry;
//! use micro_rest::router::{self, Router, Signature};
//! use micro_rest::{EntityType, RestService};
//!
//! let route = router::get(Signature::builder().path("/users").variable::<u64>("id").build().unwrap(), "show_user")
//!     .with_response_entity(EntityType::of::<String>());
//! let registry = ConverterRegistry::builder().with_default_formats().unwrap().with_scalars().unwrap().build();
//! let service = RestService::new(Router::load([route]).unwrap(), registry);
//!
//! let (parts, ()) = Request::builder().method(Method::GET).uri("/users/42").body(()).unwrap().into_parts();
//! let exchange = service.begin(&parts).unwrap();
//! assert_eq!(*exchange.target(), "show_user");
//! assert_eq!(exchange.bound().get::<u64>("id"), Some(&42));
//!
//! let response = exchange.write_entity(&String::from("user 42")).unwrap();
//! assert_eq!(response.headers()["content-type"], "text/plain");
//! ```

mod entity_type;
mod error;
mod media_type;
mod service;
mod utils;

pub mod converter;
pub mod negotiation;
pub mod router;

pub use entity_type::EntityType;
pub use entity_type::TypeKey;
pub use error::*;
pub use media_type::MediaType;
pub use media_type::Quality;
pub use media_type::parse_accept;
pub use router::Route;
pub use router::Router;
pub use service::Exchange;
pub use service::RestService;
pub use service::Snapshot;
