use futures_util::FutureExt;

use super::{respond, EnvelopeStatus, ErrorEnvelope};

/// Sits in front of every route. Handlers deal with the failures they expect themselves; anything
/// that escapes as a `tide::Error` or a panic is logged here and replaced with a generic 500
/// envelope. A panicking handler only costs its own request.
pub(super) struct ErrorBoundary;

/// Renders a panic payload for the log; `panic!` gives us either a `&str` or a `String`.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
  payload
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("non-string panic payload")
}

fn internal_error() -> tide::Result {
  respond(
    500,
    &ErrorEnvelope {
      status: EnvelopeStatus::Error,
      message: "Internal Server Error",
      error: None,
    },
  )
}

#[tide::utils::async_trait]
impl<State> tide::Middleware<State> for ErrorBoundary
where
  State: Clone + Send + Sync + 'static,
{
  async fn handle(&self, request: tide::Request<State>, next: tide::Next<'_, State>) -> tide::Result {
    let path = request.url().path().to_string();
    let response = match std::panic::AssertUnwindSafe(next.run(request)).catch_unwind().await {
      Ok(response) => response,
      Err(payload) => {
        log::error!("handler panicked while serving '{path}' - {}", panic_message(payload.as_ref()));
        return internal_error();
      }
    };

    match response.error() {
      Some(error) => {
        log::error!("unhandled error while serving '{path}' - {error}");
        internal_error()
      }
      None => Ok(response),
    }
  }
}
