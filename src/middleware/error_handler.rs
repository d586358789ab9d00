//! Central error handling layer.
//!
//! Sits directly around the routes. Responses carrying an [`AppError`]
//! extension (handler errors, the routing fallbacks, extractor rejections)
//! get their JSON body written by the translator, with the originating
//! request as log context. Responses without a fault pass through untouched.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};

use crate::error::{AppError, ErrorTranslator, RequestSummary};

/// Error handling layer for Tower middleware stack.
#[derive(Clone, Copy)]
pub struct ErrorHandlerLayer {
    translator: ErrorTranslator,
}

impl ErrorHandlerLayer {
    pub fn new(translator: ErrorTranslator) -> Self {
        Self { translator }
    }
}

impl<S> Layer<S> for ErrorHandlerLayer {
    type Service = ErrorHandlerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandlerService {
            inner,
            translator: self.translator,
        }
    }
}

/// Error handling service wrapper.
#[derive(Clone)]
pub struct ErrorHandlerService<S> {
    inner: S,
    translator: ErrorTranslator,
}

impl<S> Service<Request<Body>> for ErrorHandlerService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let translator = self.translator;
        let summary = RequestSummary::capture(&req);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            match response.extensions_mut().remove::<AppError>() {
                Some(fault) => Ok(translator.render(&fault, &summary)),
                None => Ok(response),
            }
        })
    }
}
