//! Facade Envelope
//!
//! Wraps every RPC method with the cross-cutting concerns: request
//! validation, correlation ID assignment, timing with a slow-call
//! warning, and uniform error mapping.

use crate::error::to_rpc_error;
use hookbridge_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use std::fmt::Debug;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Calls taking longer than this are logged at WARN level.
const SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(300);

/// A validatable RPC request.
pub trait FacadeRequest: Debug {
    /// Reject malformed requests before any work happens.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Run one RPC method inside the facade envelope.
pub async fn call<Req, Resp, F, Fut>(
    method: &'static str,
    req: Req,
    f: F,
) -> Result<Resp, ErrorObjectOwned>
where
    Req: FacadeRequest,
    Resp: Debug,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Resp, AppError>>,
{
    let request_id = Uuid::new_v4();

    if let Err(msg) = req.validate() {
        error!(method, request_id = %request_id, request = ?req, error = %msg, "Invalid request");
        return Err(to_rpc_error(AppError::Validation(msg)));
    }

    debug!(method, request_id = %request_id, request = ?req, "Recv");

    let started = Instant::now();
    let result = f(req).await;
    let elapsed = started.elapsed();

    if elapsed > SLOW_CALL_THRESHOLD {
        warn!(
            method,
            request_id = %request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow call"
        );
    }

    match result {
        Ok(resp) => {
            debug!(method, request_id = %request_id, response = ?resp, "Resp");
            Ok(resp)
        }
        Err(err) => {
            error!(method, request_id = %request_id, error = %err, "Request failed");
            Err(to_rpc_error(err))
        }
    }
}
