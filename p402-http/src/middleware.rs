//! The handshake as a `reqwest-middleware` layer.

use std::sync::Arc;

use http::{Extensions, StatusCode};
use p402::settlement::{ReceiptSource, Sleeper, Wallet};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::{info, instrument, trace};

use crate::error::HttpError;
use crate::headers::proof_headers;
use crate::negotiator::{Negotiation, PaymentNegotiator};

/// Pays for `402` responses inside a [`rqm::ClientWithMiddleware`].
///
/// On `402` the middleware reads the body, settles through the shared
/// [`PaymentNegotiator`], and sends the request once more with the proof
/// headers. The retried response is returned as is. When the negotiator
/// declines (auto-pay off or over the cap), the original `402` is returned.
/// Requests with streaming bodies cannot be retried; they fail with
/// [`RequestNotCloneable`] before anything is paid.
pub struct PaymentMiddleware<W, R, S> {
    negotiator: Arc<PaymentNegotiator<R, S>>,
    wallet: W,
}

impl<W, R, S> std::fmt::Debug for PaymentMiddleware<W, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMiddleware").finish_non_exhaustive()
    }
}

impl<W, R, S> PaymentMiddleware<W, R, S> {
    /// Creates the middleware around a shared negotiator and a wallet.
    pub const fn new(negotiator: Arc<PaymentNegotiator<R, S>>, wallet: W) -> Self {
        Self { negotiator, wallet }
    }
}

/// Error raised when a paid request cannot be replayed.
#[derive(Debug, thiserror::Error)]
#[error("request body cannot be cloned for the paid retry")]
pub struct RequestNotCloneable;

#[cfg_attr(
    feature = "telemetry",
    instrument(name = "p402.middleware.next", skip_all)
)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

fn middleware_error(err: impl std::error::Error + Send + Sync + 'static) -> rqm::Error {
    rqm::Error::Middleware(err.into())
}

#[async_trait::async_trait]
impl<W, R, S> rqm::Middleware for PaymentMiddleware<W, R, S>
where
    W: Wallet + 'static,
    R: ReceiptSource + 'static,
    S: Sleeper + 'static,
{
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "p402.middleware.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let res = run_next(next.clone(), req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        // Paying is pointless if the proof cannot be delivered.
        let mut retry = retry_req.ok_or_else(|| middleware_error(RequestNotCloneable))?;

        #[cfg(feature = "telemetry")]
        info!(url = %res.url(), "Received 402 Payment Required, settling");

        let status = res.status();
        let version = res.version();
        let headers = res.headers().clone();
        let body = res
            .bytes()
            .await
            .map_err(|err| middleware_error(HttpError::Body(err)))?;

        let proof = match self.negotiator.negotiate(&body, &self.wallet).await {
            Ok(Negotiation::Paid(proof)) => proof,
            Ok(Negotiation::Declined(_)) => {
                let mut declined = http::Response::new(body);
                *declined.status_mut() = status;
                *declined.version_mut() = version;
                *declined.headers_mut() = headers;
                return Ok(Response::from(declined));
            }
            Err(failure) => return Err(middleware_error(failure)),
        };

        let style = self.negotiator.options().header_style();
        let proof_headers = proof_headers(&proof, style).map_err(middleware_error)?;
        retry.headers_mut().extend(proof_headers);

        #[cfg(feature = "telemetry")]
        trace!(tx_hash = %proof.tx_hash, "Retrying request with payment proof");

        run_next(next, retry, extensions).await
    }
}
