use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Payment status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    /// Any other provider status (`in_process`, `authorized`, ...)
    Unknown(String),
}

impl PaymentStatus {
    /// Approved and rejected end a payment attempt; everything else keeps polling
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Approved | PaymentStatus::Rejected)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value.trim() {
            "pending" => PaymentStatus::Pending,
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            other => PaymentStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(PaymentStatus::from(value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PaymentStatus::from("approved"), PaymentStatus::Approved);
        assert_eq!(PaymentStatus::from("rejected"), PaymentStatus::Rejected);
        assert_eq!(PaymentStatus::from("pending"), PaymentStatus::Pending);
        assert_eq!(
            PaymentStatus::from("in_process"),
            PaymentStatus::Unknown("in_process".to_string())
        );
        // 大文字は別物として扱う
        assert!(!PaymentStatus::from("APPROVED").is_terminal());
    }

    #[test]
    fn test_status_from_json() {
        let status: PaymentStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(status, PaymentStatus::Approved);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"approved\"");
    }
}
