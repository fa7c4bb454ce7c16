//! Premium checkout and payment reconciliation for VoxPromo
//!
//! Starts a checkout with the payment provider, reads the provider's return
//! callback, polls the payment status until it settles and commits the
//! premium upgrade through the session manager.

mod callback;
mod provider;
mod reconcile;
mod status;

use thiserror::Error;
use voxpromo_auth::AuthError;

pub use callback::CallbackParams;
pub use provider::{
    BackUrls, Checkout, CheckoutItem, CheckoutProvider, CheckoutRequest, MercadoPagoClient,
    PaymentStatusReport, MERCADO_PAGO_API_URL,
};
pub use reconcile::{
    PaymentOutcome, PaymentReconciler, ReconcileHandle, ReconcileOptions, ReconcileState,
    CHECKOUT_TIMEOUT, FAILURE_PATH, MAX_POLLS, PENDING_PATH, POLL_INTERVAL, SUCCESS_PATH,
};
pub use status::PaymentStatus;

/// エラー型
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Payment initiation failed: {0}")]
    InitiationFailed(String),

    #[error("Payment status error: {0}")]
    StatusError(String),

    #[error("No payment id in callback URL")]
    MissingPaymentId,

    #[error("Approved payment {0} cannot be attributed to a logged-in account")]
    Unattributable(String),

    #[error("Reconciliation aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl PaymentError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PaymentError::RequestError(e) => e.is_timeout() || e.is_connect(),
            PaymentError::InitiationFailed(_) => true,
            PaymentError::Auth(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
