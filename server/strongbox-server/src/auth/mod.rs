//! Bearer-token middleware for the gRPC server.
//!
//! Applied under the tonic server, so it sees every call (unary
//! handlers and stream opens alike) before routing. Login and
//! CreateUser pass through untouched; everything else must carry a
//! verifiable token in the `authorization` header, whose user id is
//! injected into the request extensions for handlers to read.

use std::task::{Context, Poll};

use auth_identity::TokenService;
use futures::future::BoxFuture;
use http::header::HeaderValue;
use http::HeaderMap;
use tonic::{Code, Status};
use tower::{Layer, Service};
use uuid::Uuid;

/// Identity of the authenticated caller, placed in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// Methods that proceed without a token.
const PUBLIC_METHODS: [&str; 2] = ["/strongbox.v1.Vault/Login", "/strongbox.v1.Vault/CreateUser"];

pub(crate) fn is_public_method(path: &str) -> bool {
    PUBLIC_METHODS.contains(&path)
}

/// Extract and verify the bearer token, returning the caller's id.
pub(crate) fn authorize(tokens: &TokenService, headers: &HeaderMap) -> Result<Uuid, Status> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| Status::unauthenticated("missing auth token"))?;
    let token = value
        .to_str()
        .map_err(|_| Status::unauthenticated("invalid auth token"))?;
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

    tokens
        .verify(token)
        .map_err(|err| Status::unauthenticated(err.to_string()))
}

#[derive(Clone)]
pub struct AuthLayer {
    tokens: TokenService,
}

impl AuthLayer {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    tokens: TokenService,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for AuthMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<ReqBody>) -> Self::Future {
        // Take the ready inner service and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if is_public_method(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        match authorize(&self.tokens, req.headers()) {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthenticatedUser(user_id));
                Box::pin(async move { inner.call(req).await })
            }
            Err(status) => Box::pin(async move { Ok(reject(status)) }),
        }
    }
}

/// Trailers-only gRPC error response.
fn reject<B: Default>(status: Status) -> http::Response<B> {
    let mut response = http::Response::new(B::default());
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    response.headers_mut().insert(
        "grpc-status",
        HeaderValue::from(Code::Unauthenticated as i32),
    );
    if let Ok(message) = HeaderValue::from_str(status.message()) {
        response.headers_mut().insert("grpc-message", message);
    }
    response
}
