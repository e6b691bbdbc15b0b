use crate::entity_type::EntityType;
use crate::router::Signature;
use http::Method;
use std::fmt;

/// An HTTP action bound to a template, the entity types it exchanges and a handler target.
///
/// `H` is whatever the application uses to identify handlers: an enum, a function pointer,
/// a boxed trait object. The router never inspects it.
#[derive(Debug, Clone)]
pub struct Route<H> {
    method: Method,
    signature: Signature,
    request_entity: Option<EntityType>,
    response_entity: Option<EntityType>,
    target: H,
}

impl<H> Route<H> {
    pub fn new(method: Method, signature: Signature, target: H) -> Self {
        Self { method, signature, request_entity: None, response_entity: None, target }
    }

    #[must_use]
    pub fn with_request_entity(mut self, entity_type: EntityType) -> Self {
        self.request_entity = Some(entity_type);
        self
    }

    #[must_use]
    pub fn with_response_entity(mut self, entity_type: EntityType) -> Self {
        self.response_entity = Some(entity_type);
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn request_entity(&self) -> Option<&EntityType> {
        self.request_entity.as_ref()
    }

    #[inline]
    pub fn response_entity(&self) -> Option<&EntityType> {
        self.response_entity.as_ref()
    }

    #[inline]
    pub fn target(&self) -> &H {
        &self.target
    }

    #[inline]
    pub fn required_argument_count(&self) -> usize {
        self.signature.required_argument_count()
    }
}

impl<H> fmt::Display for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.signature)
    }
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a route answering HTTP ", stringify!($upper_case_method), " requests.")]
        #[inline]
        pub fn $method<H>(signature: Signature, target: H) -> Route<H> {
            Route::new(Method::$upper_case_method, signature, target)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_constructors() {
        let signature = Signature::builder().path("/users").variable::<u64>("id").build().unwrap();

        let route = get(signature.clone(), "show").with_response_entity(EntityType::of::<String>());
        assert_eq!(route.method(), Method::GET);
        assert_eq!(*route.target(), "show");
        assert!(route.request_entity().is_none());
        assert_eq!(route.response_entity(), Some(&EntityType::of::<String>()));
        assert_eq!(route.required_argument_count(), 1);
        assert_eq!(route.to_string(), "GET /users/{id}");

        assert_eq!(delete(signature.clone(), ()).method(), Method::DELETE);
        assert_eq!(patch(signature, ()).method(), Method::PATCH);
    }
}
