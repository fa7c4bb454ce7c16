//! Payment reconciliation state machine
//!
//! ```text
//! Initiating -> AwaitingCallback -> Approved | Rejected | Polling
//! Polling -> Approved | Rejected | TimedOut | Errored
//! ```
//!
//! Polls are strictly sequential: the next status request is only issued
//! after the previous one resolved and the poll interval elapsed. Dropping the
//! future returned by [`PaymentReconciler::reconcile`] (or the
//! [`ReconcileHandle`]) stops all further polling.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use url::Url;
use voxpromo_auth::{AuthError, Clock, SessionManager, User};

use crate::{
    BackUrls, CallbackParams, Checkout, CheckoutProvider, CheckoutRequest, PaymentError,
    PaymentStatus, Result,
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const MAX_POLLS: u32 = 20;
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

pub const SUCCESS_PATH: &str = "/premium-confirmado";
pub const FAILURE_PATH: &str = "/erro-pagamento";
pub const PENDING_PATH: &str = "/pagamento-pendente";

/// 決済照合の状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Initiating,
    AwaitingCallback,
    /// Waiting on status request number `attempt` (1-based)
    Polling { attempt: u32 },
    Approved,
    Rejected,
    TimedOut,
    Errored,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::Approved
                | ReconcileState::Rejected
                | ReconcileState::TimedOut
                | ReconcileState::Errored
        )
    }
}

/// How a reconciliation ended, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Premium is active. `newly_applied` is false when the payment had
    /// already been committed by an earlier reconciliation.
    Approved {
        payment_id: String,
        user: User,
        newly_applied: bool,
    },
    Rejected { payment_id: String },
    /// Not settled yet; the user should check back later
    Pending { payment_id: String },
    Errored { reason: String },
}

impl PaymentOutcome {
    pub fn state(&self) -> ReconcileState {
        match self {
            PaymentOutcome::Approved { .. } => ReconcileState::Approved,
            PaymentOutcome::Rejected { .. } => ReconcileState::Rejected,
            PaymentOutcome::Pending { .. } => ReconcileState::TimedOut,
            PaymentOutcome::Errored { .. } => ReconcileState::Errored,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Approved { .. })
    }
}

/// 決済照合オプション
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub checkout_timeout: Duration,
    pub success_path: String,
    pub failure_path: String,
    pub pending_path: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
            checkout_timeout: CHECKOUT_TIMEOUT,
            success_path: SUCCESS_PATH.to_string(),
            failure_path: FAILURE_PATH.to_string(),
            pending_path: PENDING_PATH.to_string(),
        }
    }
}

impl ReconcileOptions {
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    pub fn with_max_polls(mut self, value: u32) -> Self {
        self.max_polls = value;
        self
    }

    pub fn with_checkout_timeout(mut self, value: Duration) -> Self {
        self.checkout_timeout = value;
        self
    }

    /// Back URLs for a site rooted at `site_url`
    pub fn back_urls(&self, site_url: &Url) -> Result<BackUrls> {
        Ok(BackUrls {
            success: site_url.join(&self.success_path)?.to_string(),
            failure: site_url.join(&self.failure_path)?.to_string(),
            pending: site_url.join(&self.pending_path)?.to_string(),
        })
    }
}

/// 決済照合
///
/// Single-flight: one checkout or reconciliation runs at a time per
/// reconciler and concurrent calls queue behind it, so the published state
/// always belongs to a single payment.
pub struct PaymentReconciler {
    provider: Arc<dyn CheckoutProvider>,
    sessions: Arc<SessionManager>,
    site_url: Url,
    options: ReconcileOptions,
    state: Arc<RwLock<ReconcileState>>,
    state_change: broadcast::Sender<ReconcileState>,
    in_flight: Mutex<()>,
}

impl PaymentReconciler {
    pub fn new(
        provider: Arc<dyn CheckoutProvider>,
        sessions: Arc<SessionManager>,
        site_url: &str,
    ) -> Result<Self> {
        Ok(Self::new_with_options(
            provider,
            sessions,
            Url::parse(site_url)?,
            ReconcileOptions::default(),
        ))
    }

    pub fn new_with_options(
        provider: Arc<dyn CheckoutProvider>,
        sessions: Arc<SessionManager>,
        site_url: Url,
        options: ReconcileOptions,
    ) -> Self {
        let (state_change, _) = broadcast::channel(32);
        Self {
            provider,
            sessions,
            site_url,
            options,
            state: Arc::new(RwLock::new(ReconcileState::Idle)),
            state_change,
            in_flight: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// 状態変更の通知を受け取るレシーバーを取得
    pub fn on_state_change(&self) -> broadcast::Receiver<ReconcileState> {
        self.state_change.subscribe()
    }

    pub async fn get_state(&self) -> ReconcileState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, state: ReconcileState) {
        let mut current = self.state.write().await;
        if *current != state {
            log::info!("Reconciliation state {:?} -> {:?}", *current, state);
            *current = state.clone();
            // no receivers is fine
            let _ = self.state_change.send(state);
        }
    }

    /// Request a checkout for the current user and return where to send the
    /// browser. Not retried; a failure or timeout is reported immediately.
    pub async fn initiate_checkout(&self) -> Result<Checkout> {
        let _in_flight = self.in_flight.lock().await;
        self.set_state(ReconcileState::Initiating).await;

        let user = match self.sessions.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.set_state(ReconcileState::Idle).await;
                return Err(PaymentError::Auth(AuthError::NotAuthenticated));
            }
            Err(e) => {
                self.set_state(ReconcileState::Idle).await;
                return Err(e.into());
            }
        };

        let request = CheckoutRequest {
            payer_email: user.email,
            back_urls: self.options.back_urls(&self.site_url)?,
        };

        let result = timeout(
            self.options.checkout_timeout,
            self.provider.create_checkout(&request),
        )
        .await;

        let checkout = match result {
            Ok(Ok(checkout)) => checkout,
            Ok(Err(e)) => {
                log::error!("Checkout initiation failed: {}", e);
                self.set_state(ReconcileState::Errored).await;
                return Err(match e {
                    PaymentError::InitiationFailed(msg) => PaymentError::InitiationFailed(msg),
                    other => PaymentError::InitiationFailed(other.to_string()),
                });
            }
            Err(_) => {
                log::error!(
                    "Checkout initiation timed out after {:?}",
                    self.options.checkout_timeout
                );
                self.set_state(ReconcileState::Errored).await;
                return Err(PaymentError::InitiationFailed(format!(
                    "no answer within {:?}",
                    self.options.checkout_timeout
                )));
            }
        };

        self.set_state(ReconcileState::AwaitingCallback).await;
        Ok(checkout)
    }

    /// Resolve the payment named by a return-callback URL
    pub async fn reconcile(&self, callback_url: &str) -> PaymentOutcome {
        let _in_flight = self.in_flight.lock().await;
        self.set_state(ReconcileState::AwaitingCallback).await;

        let params = match CallbackParams::from_url(callback_url) {
            Ok(params) => params,
            Err(e) => {
                log::warn!("Unusable payment callback {}: {}", callback_url, e);
                return self.errored(e.to_string()).await;
            }
        };

        match params.status_hint {
            Some(PaymentStatus::Approved) => {
                let approved_at = self.sessions.clock().now();
                self.approve(params.payment_id, approved_at).await
            }
            Some(PaymentStatus::Rejected) => self.rejected(params.payment_id).await,
            _ => self.poll(params.payment_id).await,
        }
    }

    /// Run [`reconcile`](Self::reconcile) on a background task
    pub fn spawn_reconcile(self: &Arc<Self>, callback_url: &str) -> ReconcileHandle {
        let reconciler = Arc::clone(self);
        let callback_url = callback_url.to_string();
        ReconcileHandle {
            handle: Some(tokio::spawn(async move {
                reconciler.reconcile(&callback_url).await
            })),
        }
    }

    async fn poll(&self, payment_id: String) -> PaymentOutcome {
        let max_polls = self.options.max_polls;

        for attempt in 1..=max_polls {
            self.set_state(ReconcileState::Polling { attempt }).await;

            match self.provider.payment_status(&payment_id).await {
                Ok(report) => match report.status {
                    PaymentStatus::Approved => {
                        let approved_at = match report.approved_at {
                            Some(at) => at,
                            None => {
                                log::warn!(
                                    "Payment {} approved without approval date; using now",
                                    payment_id
                                );
                                self.sessions.clock().now()
                            }
                        };
                        return self.approve(payment_id, approved_at).await;
                    }
                    PaymentStatus::Rejected => return self.rejected(payment_id).await,
                    status => {
                        log::debug!(
                            "Payment {} still {} (poll {}/{})",
                            payment_id,
                            status,
                            attempt,
                            max_polls
                        );
                    }
                },
                Err(e) => {
                    log::error!("Status check for payment {} failed: {}", payment_id, e);
                    return self.errored(e.to_string()).await;
                }
            }

            if attempt < max_polls {
                sleep(self.options.poll_interval).await;
            }
        }

        log::info!(
            "Payment {} unresolved after {} polls; reporting pending",
            payment_id,
            max_polls
        );
        self.set_state(ReconcileState::TimedOut).await;
        PaymentOutcome::Pending { payment_id }
    }

    async fn approve(&self, payment_id: String, approved_at: DateTime<Utc>) -> PaymentOutcome {
        match self.sessions.grant_premium(&payment_id, approved_at).await {
            Ok(grant) => {
                self.set_state(ReconcileState::Approved).await;
                PaymentOutcome::Approved {
                    payment_id,
                    user: grant.user,
                    newly_applied: grant.applied,
                }
            }
            Err(AuthError::NotAuthenticated) => {
                log::error!(
                    "Payment {} approved but nobody is logged in; not applied",
                    payment_id
                );
                self.errored(PaymentError::Unattributable(payment_id).to_string())
                    .await
            }
            Err(e) => {
                log::error!("Applying payment {} failed: {}", payment_id, e);
                self.errored(e.to_string()).await
            }
        }
    }

    async fn rejected(&self, payment_id: String) -> PaymentOutcome {
        log::info!("Payment {} rejected", payment_id);
        self.set_state(ReconcileState::Rejected).await;
        PaymentOutcome::Rejected { payment_id }
    }

    async fn errored(&self, reason: String) -> PaymentOutcome {
        self.set_state(ReconcileState::Errored).await;
        PaymentOutcome::Errored { reason }
    }
}

/// Handle of a spawned reconciliation. Dropping it stops polling.
#[derive(Debug)]
pub struct ReconcileHandle {
    handle: Option<JoinHandle<PaymentOutcome>>,
}

impl ReconcileHandle {
    /// Wait for the outcome
    pub async fn outcome(mut self) -> Result<PaymentOutcome> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| PaymentError::Aborted(e.to_string())),
            None => Err(PaymentError::Aborted("already awaited".to_string())),
        }
    }

    /// Stop polling now
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for ReconcileHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
