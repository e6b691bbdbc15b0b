use bytes::Bytes;
use http::{Method, Request, StatusCode, Version, header};
use micro_rest::converter::{
    Accepts, ConverterRegistry, FromStrConverter, JsonConverter, MultipartForm, MultipartFormConverter, Tuple3, Tuple3Converter,
};
use micro_rest::router::{self, Arguments, Router, Signature, create_uri};
use micro_rest::{EntityType, MediaType, NegotiationError, RestError, RestService, RoutingError, parse_accept};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Api {
    ShowUser,
    CreateUser,
    Search,
    Triple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn routes() -> Vec<micro_rest::Route<Api>> {
    vec![
        router::get(Signature::builder().path("/users").variable::<u64>("id").build().unwrap(), Api::ShowUser)
            .with_response_entity(EntityType::of::<User>()),
        router::post(Signature::builder().path("/users").build().unwrap(), Api::CreateUser)
            .with_request_entity(EntityType::of::<User>())
            .with_response_entity(EntityType::of::<u64>()),
        router::get(
            Signature::builder()
                .path("/search")
                .optional_matrix::<String>("lang")
                .query::<String>("q")
                .optional_query::<u32>("page")
                .build()
                .unwrap(),
            Api::Search,
        ),
        router::get(Signature::builder().path("/triple").build().unwrap(), Api::Triple)
            .with_response_entity(triple_type()),
    ]
}

fn triple_type() -> EntityType {
    Tuple3::entity_type(EntityType::of::<i64>(), EntityType::of::<String>(), EntityType::of::<i64>())
}

fn registry() -> ConverterRegistry {
    ConverterRegistry::builder()
        .with_default_formats()
        .unwrap()
        .with_scalars()
        .unwrap()
        .register(JsonConverter::<User>::new())
        .unwrap()
        .register(Tuple3Converter::new())
        .unwrap()
        .build()
}

fn request(method: Method, uri: &str) -> http::request::Builder {
    Request::builder().method(method).uri(uri)
}

#[test]
fn users_by_id() {
    let router = Router::load(routes()).unwrap();

    let matched = router.resolve(&Method::GET, "/users/42").unwrap();
    assert_eq!(*matched.target(), Api::ShowUser);
    assert_eq!(matched.arguments().get("id"), Some("42"));

    assert!(matches!(router.resolve(&Method::GET, "/users/42/x"), Err(RoutingError::RouteNotFound { .. })));
    assert!(matches!(router.resolve(&Method::POST, "/users/42"), Err(RoutingError::MethodNotAllowed { .. })));
}

#[test]
fn long_prefers_text_plain() {
    let registry = ConverterRegistry::builder()
        .with_default_formats()
        .unwrap()
        .register(FromStrConverter::<i64>::with_accepts(Accepts::parse(["text/plain;q=0.8"]).unwrap()))
        .unwrap()
        .build();

    let accept = parse_accept("text/plain, application/json;q=0.9").unwrap();
    let selection = registry.lookup_for_encode(&EntityType::of::<i64>(), &accept).unwrap();
    assert_eq!(selection.media_type().essence(), "text/plain");
}

#[test]
fn string_is_not_acceptable_as_xml() {
    let accept = parse_accept("application/xml").unwrap();
    let error = registry().lookup_for_encode(&EntityType::of::<String>(), &accept).unwrap_err();
    assert!(matches!(error, NegotiationError::NotAcceptable { .. }));

    let error = RestError::from(error);
    assert_eq!(error.status(Version::HTTP_11), StatusCode::NOT_ACCEPTABLE);
}

#[test]
fn generic_triple_round_trips() {
    let registry = registry();
    let tuple = Tuple3::new(7_i64, String::from("seven"), -7_i64);
    let accept = [MediaType::any()];

    let encoded = registry.encode(&tuple, &triple_type(), &accept, Arguments::empty()).unwrap();
    assert_eq!(encoded.body(), &Bytes::from_static(b"7,seven,-7"));

    let (content_type, body) = encoded.into_parts();
    let entity = registry.decode(body, &triple_type(), &content_type, Arguments::empty()).unwrap();
    let decoded = entity.downcast_ref::<Tuple3>().unwrap();
    assert_eq!(decoded.get::<i64>(0), Some(&7));
    assert_eq!(decoded.get::<String>(1).map(String::as_str), Some("seven"));
    assert_eq!(decoded.get::<i64>(2), Some(&-7));
}

#[test]
fn create_user_with_json() {
    let service = RestService::new(Router::load(routes()).unwrap(), registry());
    let (parts, ()) = request(Method::POST, "/users")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "text/plain")
        .body(())
        .unwrap()
        .into_parts();

    let exchange = service.begin(&parts).unwrap();
    assert_eq!(*exchange.target(), Api::CreateUser);

    let entity = exchange.read_entity(Bytes::from_static(br#"{"id": 3, "name": "ada"}"#)).unwrap().unwrap();
    let user = entity.downcast_ref::<User>().unwrap();
    assert_eq!(user, &User { id: 3, name: "ada".into() });

    let response = exchange.write_entity(&user.id).unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.body(), &Bytes::from_static(b"3"));

    let error = exchange.read_entity(Bytes::from_static(b"{")).unwrap_err();
    assert_eq!(exchange.error_response(error).status(), StatusCode::BAD_REQUEST);
}

#[test]
fn error_responses() {
    let service = RestService::new(Router::load(routes()).unwrap(), registry());

    let cases = [
        (request(Method::GET, "/nowhere"), StatusCode::NOT_FOUND),
        (request(Method::GET, "/search?page=2"), StatusCode::NOT_FOUND),
        (request(Method::DELETE, "/users/1"), StatusCode::METHOD_NOT_ALLOWED),
        (request(Method::DELETE, "/users/1").version(Version::HTTP_10), StatusCode::BAD_REQUEST),
        (request(Method::GET, "/users/abc"), StatusCode::BAD_REQUEST),
        (request(Method::GET, "/users/1").header(header::ACCEPT, "text/html"), StatusCode::NOT_ACCEPTABLE),
        (request(Method::GET, "/users/1").header(header::ACCEPT, "html"), StatusCode::BAD_REQUEST),
        (request(Method::POST, "/users").header(header::CONTENT_TYPE, "text/csv"), StatusCode::UNSUPPORTED_MEDIA_TYPE),
    ];

    for (builder, status) in cases {
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        let error = service.begin(&parts).unwrap_err();
        let response = error.into_response(parts.version);
        assert_eq!(response.status(), status, "{} {}", parts.method, parts.uri);
    }
}

#[test]
fn uri_round_trip() {
    let router = Router::load(routes()).unwrap();
    let search = router.routes().find(|route| *route.target() == Api::Search).unwrap();

    let arguments = Arguments::new().with("q", "rust & tokio").with("lang", "en-GB").with("page", "3");
    let uri = create_uri(search, &arguments).unwrap();
    assert_eq!(uri, "/search;lang=en-GB?q=rust%20%26%20tokio&page=3");

    let matched = router.resolve(&Method::GET, &uri).unwrap();
    assert_eq!(*matched.target(), Api::Search);
    assert_eq!(matched.arguments(), &arguments);
}

#[test]
fn hot_reload() {
    let service = RestService::new(Router::load(routes()).unwrap(), registry());
    let (parts, ()) = request(Method::GET, "/triple").body(()).unwrap().into_parts();
    let in_flight = service.begin(&parts).unwrap();

    let ping = router::get(Signature::builder().path("/ping").build().unwrap(), Api::Search);
    service.reload([ping], ConverterRegistry::builder().with_default_formats().unwrap().build()).unwrap();

    let tuple = Tuple3::new(1_i64, String::from("one"), 1_i64);
    let response = in_flight.write_entity(&tuple).unwrap();
    assert_eq!(response.body(), &Bytes::from_static(b"1,one,1"));

    let error = service.begin(&parts).unwrap_err();
    assert!(matches!(error, RestError::Routing { source: RoutingError::RouteNotFound { .. } }));

    let (parts, ()) = request(Method::GET, "/ping").body(()).unwrap().into_parts();
    assert!(service.begin(&parts).is_ok());
}

#[test]
fn multipart_upload() {
    let upload = router::put(
        Signature::builder().path("/users").variable::<u64>("id").path("/avatar").build().unwrap(),
        Api::CreateUser,
    )
    .with_request_entity(EntityType::of::<MultipartForm>())
    .with_response_entity(EntityType::of::<u64>());
    let registry = ConverterRegistry::builder()
        .with_default_formats()
        .unwrap()
        .with_scalars()
        .unwrap()
        .register(MultipartFormConverter::new())
        .unwrap()
        .build();
    let service = RestService::new(Router::load([upload]).unwrap(), registry);

    let (parts, ()) = request(Method::PUT, "/users/9/avatar")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=frontier")
        .body(())
        .unwrap()
        .into_parts();
    let exchange = service.begin(&parts).unwrap();
    assert_eq!(exchange.content_type().and_then(|ct| ct.get_param("boundary")).map(|b| b.as_str()), Some("frontier"));

    let body = Bytes::from_static(
        b"--frontier\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
          Content-Type: image/png\r\n\r\n\
          PNGDATA\r\n--frontier--\r\n",
    );
    let entity = exchange.read_entity(body).unwrap().unwrap();
    let form = entity.downcast_ref::<MultipartForm>().unwrap();
    let avatar = form.file("avatar").unwrap();
    assert_eq!(avatar.filename(), Some("me.png"));
    assert_eq!(avatar.data(), &Bytes::from_static(b"PNGDATA"));

    let (parts, ()) = request(Method::PUT, "/users/9/avatar")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(())
        .unwrap()
        .into_parts();
    let exchange = service.begin(&parts).unwrap();
    let error = exchange.read_entity(Bytes::from_static(b"--x--")).unwrap_err();
    assert_eq!(exchange.error_response(error).status(), StatusCode::BAD_REQUEST);
}
