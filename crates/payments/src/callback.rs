use url::Url;

use crate::{PaymentError, PaymentStatus, Result};

/// Parameters carried by the provider's return callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub payment_id: String,
    /// Status hint, absent when the provider sent none
    pub status_hint: Option<PaymentStatus>,
}

impl CallbackParams {
    /// Parse a callback URL.
    ///
    /// The id is read from `payment_id`, falling back to `collection_id`; the
    /// hint from `collection_status`, falling back to `status`. Empty values
    /// and the literal `null` count as absent. Relative URLs are accepted.
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let url = match Url::parse(callback_url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(callback_url)?
            }
            Err(e) => return Err(e.into()),
        };

        let param = |name: &str| -> Option<String> {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty() && value != "null")
        };

        let payment_id = param("payment_id")
            .or_else(|| param("collection_id"))
            .ok_or(PaymentError::MissingPaymentId)?;
        let status_hint = param("collection_status")
            .or_else(|| param("status"))
            .map(|status| PaymentStatus::from(status.as_str()));

        Ok(Self {
            payment_id,
            status_hint,
        })
    }
}
