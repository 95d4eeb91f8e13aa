//! The pay-per-call handshake.
//!
//! [`PaymentNegotiator::fetch_with_payment`] issues a request; on `402` it
//! parses the payment details, settles the transfer through a
//! [`SettlementExecutor`], and repeats the request once with the proof
//! headers.

use std::sync::{Arc, OnceLock};

use alloy_primitives::TxHash;
use http::StatusCode;
use p402::amount::Amount;
use p402::chain::{ChainId, ChainPolicy, ChainProfiles};
use p402::error::{ErrorKind, Failure};
use p402::instructions::PaymentInstructions;
use p402::outcome::{PaymentProof, ProtocolResult};
use p402::phase::{Phase, PhaseListener, PhaseListeners};
use p402::settlement::{
    ReceiptSource, SettlementExecutor, Sleeper, TokioSleeper, TransferRequest, Wallet, WalletError,
};
use reqwest_middleware as rqm;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::constants::REJECTED_BODY_PREVIEW;
use crate::error::HttpError;
use crate::headers::{ProofHeaderStyle, proof_headers};
use crate::request::{PaidResponse, RequestOptions};

/// Knobs for [`PaymentNegotiator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatorOptions {
    /// Settle automatically. When off, a valid 402 yields
    /// [`ProtocolResult::PaymentRequired`].
    pub auto_pay: bool,
    /// Refuse to pay more than this per request.
    pub max_amount: Option<Amount>,
    /// How to pick the chain when the server does not name one.
    pub chain_policy: ChainPolicy,
    /// Send `X-Payment-Chain` on the paid retry.
    pub send_chain_header: bool,
    /// Also send the legacy `X-Payment-TX` on the paid retry.
    pub legacy_proof_header: bool,
}

impl Default for NegotiatorOptions {
    fn default() -> Self {
        Self {
            auto_pay: true,
            max_amount: None,
            chain_policy: ChainPolicy::ServerOnly,
            send_chain_header: true,
            legacy_proof_header: false,
        }
    }
}

impl NegotiatorOptions {
    pub(crate) const fn header_style(&self) -> ProofHeaderStyle {
        ProofHeaderStyle {
            chain: self.send_chain_header,
            legacy: self.legacy_proof_header,
        }
    }

    fn declines(&self, instructions: &PaymentInstructions) -> bool {
        !self.auto_pay
            || self
                .max_amount
                .is_some_and(|max| instructions.amount > max)
    }
}

/// What became of a 402.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// The transfer confirmed; retry with this proof.
    Paid(PaymentProof),
    /// Payment was not attempted (auto-pay off or over the cap).
    Declined(PaymentInstructions),
}

/// Client for resources that may answer `402 Payment Required`.
///
/// Share it behind an `Arc`; it holds no per-call state.
pub struct PaymentNegotiator<R, S = TokioSleeper> {
    http: rqm::ClientWithMiddleware,
    chains: Arc<ChainProfiles>,
    settlement: SettlementExecutor<R, S>,
    options: NegotiatorOptions,
    listeners: PhaseListeners,
}

impl<R, S> std::fmt::Debug for PaymentNegotiator<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentNegotiator")
            .field("chains", &self.chains.len())
            .field("poll_policy", &self.settlement.policy())
            .field("options", &self.options)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl<R, S> PaymentNegotiator<R, S> {
    /// Creates a negotiator with a default `reqwest` client.
    pub fn new(chains: Arc<ChainProfiles>, settlement: SettlementExecutor<R, S>) -> Self {
        Self {
            http: rqm::ClientWithMiddleware::from(reqwest::Client::new()),
            chains,
            settlement,
            options: NegotiatorOptions::default(),
            listeners: PhaseListeners::default(),
        }
    }

    /// Replaces the HTTP client, e.g. to set a timeout or add middleware.
    #[must_use]
    pub fn with_http_client(mut self, http: impl Into<rqm::ClientWithMiddleware>) -> Self {
        self.http = http.into();
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: NegotiatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a phase listener.
    #[must_use]
    pub fn with_listener(mut self, listener: impl PhaseListener + 'static) -> Self {
        self.listeners.push(listener);
        self
    }

    /// The active options.
    pub const fn options(&self) -> &NegotiatorOptions {
        &self.options
    }

    /// The chain table.
    pub fn chains(&self) -> &ChainProfiles {
        &self.chains
    }

    /// The settlement executor.
    pub const fn settlement(&self) -> &SettlementExecutor<R, S> {
        &self.settlement
    }
}

impl<R, S> PaymentNegotiator<R, S>
where
    R: ReceiptSource,
    S: Sleeper,
{
    /// Fetches `url`, paying for it if the server asks.
    ///
    /// Sends one request on the free path and two on the paid path. The
    /// retry is only issued after the transfer confirmed.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "p402.fetch_with_payment", skip_all, fields(url = %url))
    )]
    pub async fn fetch_with_payment<W: Wallet>(
        &self,
        url: &str,
        options: &RequestOptions,
        wallet: &W,
    ) -> ProtocolResult<PaidResponse> {
        let url = match parse_url(url) {
            Ok(url) => url,
            Err(err) => return Failure::from(err).into(),
        };

        let first = match self.send(&url, options, None).await {
            Ok(response) => response,
            Err(err) => return Failure::from(err).into(),
        };
        if first.status != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            debug!(status = %first.status, "No payment required");
            return ProtocolResult::Ok(first);
        }

        #[cfg(feature = "telemetry")]
        info!("Received 402 Payment Required");

        match self.pay_and_retry(&url, options, &first.body, wallet).await {
            Ok(ProtocolResult::Ok(response)) => {
                self.listeners.emit(Phase::Done);
                ProtocolResult::Ok(response)
            }
            Ok(declined) => declined,
            Err(failure) => self.fail(failure),
        }
    }

    /// Like [`fetch_with_payment`](Self::fetch_with_payment), but gives up
    /// with [`ErrorKind::Cancelled`] once `cancel` fires.
    ///
    /// A transfer already submitted is not recalled and may still confirm;
    /// its hash is carried on the cancelled failure.
    pub async fn fetch_with_payment_until<W: Wallet>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        options: &RequestOptions,
        wallet: &W,
    ) -> ProtocolResult<PaidResponse> {
        let submitted = OnceLock::new();
        let wallet = SubmissionRecorder {
            inner: wallet,
            submitted: &submitted,
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let failure = Failure::new(ErrorKind::Cancelled, "cancelled by caller");
                let failure = match submitted.get() {
                    Some(tx_hash) => failure.with_tx_hash(*tx_hash),
                    None => failure,
                };
                self.fail(failure)
            }
            result = self.fetch_with_payment(url, options, &wallet) => result,
        }
    }

    /// Turns a 402 body into a confirmed payment, or declines it.
    ///
    /// Emits [`Phase::Paying`] before settling.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when the body is malformed, the chain is
    /// unsupported, or settlement fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "p402.negotiate", skip_all, err)
    )]
    pub async fn negotiate<W: Wallet>(
        &self,
        body: &[u8],
        wallet: &W,
    ) -> Result<Negotiation, Failure> {
        let instructions = PaymentInstructions::from_body(body)?;
        if self.options.declines(&instructions) {
            #[cfg(feature = "telemetry")]
            info!(amount = %instructions.amount, auto_pay = self.options.auto_pay, "Payment declined");
            return Ok(Negotiation::Declined(instructions));
        }

        let profile = self.chains.resolve(
            &instructions,
            self.options.chain_policy,
            wallet.chain_id(),
        )?;

        #[cfg(feature = "telemetry")]
        info!(
            amount = %instructions.amount,
            chain = %profile.key,
            recipient = %instructions.recipient,
            "Settling payment"
        );

        self.listeners.emit(Phase::Paying);
        let tx_hash = self
            .settlement
            .settle(&instructions, profile, wallet)
            .await?;
        Ok(Negotiation::Paid(PaymentProof::new(tx_hash, profile)))
    }

    /// Settles for `body` and issues the paid retry.
    ///
    /// Never returns [`ProtocolResult::Failed`]; failures are the `Err` arm.
    async fn pay_and_retry<W: Wallet>(
        &self,
        url: &Url,
        options: &RequestOptions,
        body: &[u8],
        wallet: &W,
    ) -> Result<ProtocolResult<PaidResponse>, Failure> {
        let proof = match self.negotiate(body, wallet).await? {
            Negotiation::Paid(proof) => proof,
            Negotiation::Declined(instructions) => {
                return Ok(ProtocolResult::PaymentRequired(instructions));
            }
        };

        self.listeners.emit(Phase::Registering);
        let tx_hash = proof.tx_hash;
        let attach_hash = move |failure: Failure| failure.with_tx_hash(tx_hash);
        let headers = proof_headers(&proof, self.options.header_style())
            .map_err(|err| attach_hash(err.into()))?;
        let mut retry = self
            .send(url, options, Some(headers))
            .await
            .map_err(|err| attach_hash(err.into()))?;

        if !retry.status.is_success() {
            let preview = String::from_utf8_lossy(&retry.body);
            let preview: String = preview.chars().take(REJECTED_BODY_PREVIEW).collect();
            return Err(attach_hash(Failure::new(
                ErrorKind::RetryRejected,
                format!("{}: {preview}", retry.status),
            )));
        }

        retry.payment = Some(proof);
        Ok(ProtocolResult::Ok(retry))
    }

    async fn send(
        &self,
        url: &Url,
        options: &RequestOptions,
        proof: Option<http::HeaderMap>,
    ) -> Result<PaidResponse, HttpError> {
        let mut request = self
            .http
            .request(options.method(), url.clone())
            .headers(options.headers.clone());
        if let Some(proof) = proof {
            request = request.headers(proof);
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(PaidResponse {
            status,
            headers,
            body,
            payment: None,
        })
    }

    fn fail(&self, failure: Failure) -> ProtocolResult<PaidResponse> {
        #[cfg(feature = "telemetry")]
        warn!(kind = %failure.kind, detail = %failure.detail, tx_hash = ?failure.tx_hash, "Paid request failed");
        self.listeners.emit(Phase::Error);
        ProtocolResult::Failed(failure)
    }
}

/// Remembers the hash the wallet returned, so it outlives a dropped settlement.
struct SubmissionRecorder<'a, W> {
    inner: &'a W,
    submitted: &'a OnceLock<TxHash>,
}

impl<W: Wallet> Wallet for SubmissionRecorder<'_, W> {
    fn chain_id(&self) -> Option<ChainId> {
        self.inner.chain_id()
    }

    async fn submit_transfer(&self, transfer: &TransferRequest) -> Result<TxHash, WalletError> {
        let tx_hash = self.inner.submit_transfer(transfer).await?;
        let _ = self.submitted.set(tx_hash);
        Ok(tx_hash)
    }
}

fn parse_url(url: &str) -> Result<Url, HttpError> {
    let invalid = |reason: String| HttpError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed),
        "http" | "https" => Err(invalid("missing host".to_owned())),
        scheme => Err(invalid(format!("unsupported scheme {scheme:?}"))),
    }
}
