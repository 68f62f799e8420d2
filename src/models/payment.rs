use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::time::rfc3339_nanos;

/// Inbound submission, as accepted by `POST /payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: Decimal,
}

impl PaymentRequest {
    /// Largest amount accepted at intake.
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

    pub fn new(correlation_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            amount,
        }
    }

    /// Boundary validation: a non-empty id and an amount in `(0, MAX_AMOUNT]`.
    pub fn is_valid(&self) -> bool {
        !self.correlation_id.trim().is_empty()
            && self.amount > Decimal::ZERO
            && self.amount <= Self::MAX_AMOUNT
    }
}

/// The two downstream payment processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Default,
    Fallback,
}

impl Processor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Default => "default",
            Processor::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown processor: {0}")]
pub struct UnknownProcessor(pub String);

impl FromStr for Processor {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Processor::Default),
            "fallback" => Ok(Processor::Fallback),
            other => Err(UnknownProcessor(other.to_string())),
        }
    }
}

// Payload para enviar aos Payment Processors. Built once per attempt; the
// serialized bytes of an accepted payload are what gets persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorPayload<'a> {
    #[serde(rename = "correlationId")]
    pub correlation_id: &'a str,
    pub amount: Decimal,
    #[serde(rename = "processedBy")]
    pub processed_by: Processor,
    #[serde(rename = "requestedAt", with = "rfc3339_nanos")]
    pub requested_at: DateTime<Utc>,
}

impl<'a> ProcessorPayload<'a> {
    pub fn new(
        request: &'a PaymentRequest,
        processed_by: Processor,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_id: &request.correlation_id,
            amount: request.amount,
            processed_by,
            requested_at,
        }
    }
}

/// A persisted record as read back from the store.
///
/// `processed_by` and `requested_at` stay as raw strings: unknown processors
/// are dropped by the aggregator and the timestamp is only parsed when a time
/// window is requested.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredPayment {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: Decimal,
    #[serde(rename = "processedBy")]
    pub processed_by: String,
    #[serde(rename = "requestedAt")]
    pub requested_at: String,
}

impl StoredPayment {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn processor(&self) -> Option<Processor> {
        self.processed_by.parse().ok()
    }
}
