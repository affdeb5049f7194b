//! Request handler trait and utilities.
//!
//! This module provides the [`Handler`] trait, the contract every element of
//! the handler chain implements: it writes into a [`ResponseWriter`] and
//! reports an [`Outcome`] describing what is left to do.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use derive_more::with_trait::Debug;

use crate::response::ResponseWriter;
use crate::{Error, Request, StatusCode};

/// What a [`Handler`] reports back to its caller.
///
/// # Examples
///
/// ```
/// use error_pages::{Error, Outcome, StatusCode};
///
/// let outcome = Outcome::forward(StatusCode::OK);
/// assert_eq!(outcome.status(), Some(StatusCode::OK));
///
/// let outcome = Outcome::with_error(StatusCode::BAD_GATEWAY, Error::wrap("upstream is down"));
/// assert!(outcome.error().is_some());
///
/// assert_eq!(Outcome::Finalized.status(), None);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub enum Outcome {
    /// The handler leaves the final say to its caller.
    ///
    /// `status` is the status the handler settled on. If it wrote a body it
    /// also wrote this status; for an error status without a body, the caller
    /// is expected to produce the response. `error` is set when the handler
    /// failed.
    Forward {
        /// The response status.
        status: StatusCode,
        /// The error the handler failed with, if any.
        error: Option<Error>,
    },
    /// The response has been completely written; nothing else must be
    /// written for this request.
    Finalized,
}

impl Outcome {
    /// Creates an [`Outcome::Forward`] without an error.
    pub fn forward(status: StatusCode) -> Self {
        Self::Forward {
            status,
            error: None,
        }
    }

    /// Creates an [`Outcome::Forward`] carrying an error.
    pub fn with_error(status: StatusCode, error: Error) -> Self {
        Self::Forward {
            status,
            error: Some(error),
        }
    }

    /// Returns the forwarded status, or `None` if the response is finalized.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Forward { status, .. } => Some(*status),
            Self::Finalized => None,
        }
    }

    /// Returns the forwarded error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Forward { error, .. } => error.as_ref(),
            Self::Finalized => None,
        }
    }

    /// Returns `true` if the response has been completely written.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

/// A single element of the handler chain.
///
/// Implementors write whatever they produce into the [`ResponseWriter`] and
/// report an [`Outcome`]. Handlers are shared between concurrently served
/// requests, so they must be `Send + Sync`.
///
/// # Examples
///
/// ```
/// use error_pages::{Handler, Outcome, Request, ResponseWriter, StatusCode};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn serve(&self, response: &mut ResponseWriter, _request: &Request) -> Outcome {
///         response.write(b"Hello world!");
///         Outcome::forward(StatusCode::OK)
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid request handler",
    label = "not a valid request handler",
    note = "make sure `serve` returns a future that is `Send`"
)]
pub trait Handler: Send + Sync {
    /// Serves the request.
    fn serve(
        &self,
        response: &mut ResponseWriter,
        request: &Request,
    ) -> impl Future<Output = Outcome> + Send;
}

impl<H: Handler> Handler for Arc<H> {
    fn serve(
        &self,
        response: &mut ResponseWriter,
        request: &Request,
    ) -> impl Future<Output = Outcome> + Send {
        H::serve(self, response, request)
    }
}

/// A [`Handler`] backed by a synchronous function.
///
/// Created with [`handler_fn`].
#[derive(Debug, Clone)]
pub struct HandlerFn<F> {
    #[debug("..")]
    func: F,
}

/// Creates a [`Handler`] from a function or closure.
///
/// # Examples
///
/// ```
/// use error_pages::handler::handler_fn;
/// use error_pages::{Outcome, StatusCode};
///
/// let handler = handler_fn(|response, _request| {
///     response.write(b"normal");
///     Outcome::forward(StatusCode::OK)
/// });
/// ```
pub fn handler_fn<F>(func: F) -> HandlerFn<F>
where
    F: Fn(&mut ResponseWriter, &Request) -> Outcome + Send + Sync,
{
    HandlerFn { func }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut ResponseWriter, &Request) -> Outcome + Send + Sync,
{
    async fn serve(&self, response: &mut ResponseWriter, request: &Request) -> Outcome {
        (self.func)(response, request)
    }
}

pub(crate) trait BoxHandler: Send + Sync {
    fn serve<'a>(
        &'a self,
        response: &'a mut ResponseWriter,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;
}

/// A type-erased, cheaply cloneable [`Handler`].
///
/// Useful when the concrete type of the next handler is not known at compile
/// time, or when the same handler is shared by several chains.
///
/// # Examples
///
/// ```
/// use error_pages::handler::{DynHandler, handler_fn};
/// use error_pages::{Outcome, StatusCode};
///
/// let handlers = vec![
///     DynHandler::new(handler_fn(|_, _| Outcome::forward(StatusCode::OK))),
///     DynHandler::new(handler_fn(|_, _| Outcome::forward(StatusCode::NOT_FOUND))),
/// ];
/// ```
#[derive(Debug, Clone)]
pub struct DynHandler {
    #[debug("..")]
    handler: Arc<dyn BoxHandler>,
}

impl DynHandler {
    /// Wraps a concrete handler.
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler + 'static,
    {
        struct Inner<H>(H);

        impl<H: Handler> BoxHandler for Inner<H> {
            fn serve<'a>(
                &'a self,
                response: &'a mut ResponseWriter,
                request: &'a Request,
            ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
                Box::pin(self.0.serve(response, request))
            }
        }

        Self {
            handler: Arc::new(Inner(handler)),
        }
    }
}

impl Handler for DynHandler {
    async fn serve(&self, response: &mut ResponseWriter, request: &Request) -> Outcome {
        BoxHandler::serve(&*self.handler, response, request).await
    }
}
