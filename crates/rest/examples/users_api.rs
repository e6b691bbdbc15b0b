//! Drives a small user API through `micro-rest` without a network transport: each request
//! head is resolved, its body decoded, and the response encoded for the client's `Accept`.

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use micro_rest::converter::{ConverterRegistry, Entity, FormConverter, JsonConverter};
use micro_rest::router::{self, Arguments, Router, Signature, create_uri};
use micro_rest::{ConversionError, EntityType, Exchange, RestError, RestService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    ListUsers,
    ShowUser,
    CreateUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserList {
    users: Vec<User>,
}

struct Users {
    store: Mutex<BTreeMap<u64, User>>,
}

impl Users {
    fn handle(&self, exchange: &Exchange<Endpoint>, entity: Option<Entity>) -> Result<Response<Bytes>, RestError> {
        let mut store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match exchange.target() {
            Endpoint::ListUsers => exchange.write_entity(&UserList { users: store.values().cloned().collect() }),
            Endpoint::ShowUser => {
                let id = exchange.bound().get::<u64>("id").copied().unwrap_or_default();
                match store.get(&id) {
                    Some(user) => exchange.write_entity(user),
                    None => {
                        let mut response = Response::new(Bytes::new());
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        Ok(response)
                    }
                }
            }
            Endpoint::CreateUser => {
                let Some(user) = entity.and_then(|entity| entity.downcast::<User>().ok()) else {
                    return Err(RestError::decode(ConversionError::unexpected_entity("User")));
                };
                let id = user.id;
                store.insert(id, *user);
                exchange.write_entity(&id)
            }
        }
    }
}

async fn serve(service: &RestService<Endpoint>, users: &Users, request: Request<Full<Bytes>>) -> Response<Bytes> {
    let (parts, body) = request.into_parts();
    let exchange = match service.begin(&parts) {
        Ok(exchange) => exchange,
        Err(e) => {
            warn!(method = %parts.method, uri = %parts.uri, cause = %e, "request rejected");
            return e.into_response(parts.version);
        }
    };

    let result = match exchange.read_body(body).await {
        Ok(entity) => users.handle(&exchange, entity),
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| exchange.error_response(e))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let show_user = router::get(Signature::builder().path("/users").variable::<u64>("id").build().unwrap(), Endpoint::ShowUser)
        .with_response_entity(EntityType::of::<User>());
    let routes = vec![
        router::get(Signature::builder().path("/users").build().unwrap(), Endpoint::ListUsers)
            .with_response_entity(EntityType::of::<UserList>()),
        show_user.clone(),
        router::post(Signature::builder().path("/users").build().unwrap(), Endpoint::CreateUser)
            .with_request_entity(EntityType::of::<User>())
            .with_response_entity(EntityType::of::<u64>()),
    ];

    let registry = ConverterRegistry::builder()
        .with_default_formats()
        .and_then(|builder| builder.with_scalars())
        .and_then(|builder| builder.register(JsonConverter::<User>::new()))
        .and_then(|builder| builder.register(FormConverter::<User>::new()))
        .and_then(|builder| builder.register(JsonConverter::<UserList>::new()))
        .expect("invalid converter registry")
        .build();
    let service = RestService::new(Router::load(routes).expect("invalid route table"), registry);
    let users = Users { store: Mutex::new(BTreeMap::new()) };

    let requests = vec![
        Request::post("/users").header("content-type", "application/json").body(r#"{"id": 1, "name": "ada"}"#),
        Request::post("/users").header("content-type", "application/x-www-form-urlencoded").body("id=2&name=grace"),
        Request::get("/users").header("accept", "application/json").body(""),
        Request::get("/users/2").header("accept", "text/plain, application/json;q=0.5").body(""),
        Request::get("/users/2").header("accept", "text/html").body(""),
        Request::delete("/users/2").body(""),
    ];

    for request in requests {
        let request = request.expect("invalid request").map(|body| Full::new(Bytes::from_static(body.as_bytes())));
        let line = format!("{} {}", request.method(), request.uri());
        let response = serve(&service, &users, request).await;
        info!(request = %line, status = %response.status(), body = %String::from_utf8_lossy(response.body()), "handled");
    }

    let arguments = Arguments::new().with("id", "1");
    match create_uri(&show_user, &arguments) {
        Ok(uri) => info!(%uri, "link to the first user"),
        Err(e) => warn!(cause = %e, "cannot build link"),
    }
}
