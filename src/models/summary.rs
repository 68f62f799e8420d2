use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::payment::Processor;
use crate::utils::money::round_one_decimal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryItem {
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "totalAmount")]
    pub total_amount: Decimal,
}

/// A bucket total no longer fits in a `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} total amount overflowed")]
pub struct TotalOverflow(pub Processor);

impl SummaryItem {
    /// Adds one payment; the item is left untouched on overflow.
    pub fn add(&mut self, amount: Decimal) -> Option<()> {
        self.total_amount = self.total_amount.checked_add(amount)?;
        self.total_requests += 1;
        Some(())
    }
}

/// Response of `GET /payments-summary`; recomputed on every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub default: SummaryItem,
    pub fallback: SummaryItem,
}

impl PaymentSummary {
    pub fn record(&mut self, processor: Processor, amount: Decimal) -> Result<(), TotalOverflow> {
        self.item_mut(processor).add(amount).ok_or(TotalOverflow(processor))
    }

    pub fn item_mut(&mut self, processor: Processor) -> &mut SummaryItem {
        match processor {
            Processor::Default => &mut self.default,
            Processor::Fallback => &mut self.fallback,
        }
    }

    /// Rounds both totals to one decimal place for the response.
    pub fn rounded(mut self) -> Self {
        self.default.total_amount = round_one_decimal(self.default.total_amount);
        self.fallback.total_amount = round_one_decimal(self.fallback.total_amount);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_json_shape() {
        let mut summary = PaymentSummary::default();
        summary.record(Processor::Default, dec!(19.90)).unwrap();

        let json = serde_json::to_value(summary.rounded()).unwrap();
        assert_eq!(json["default"]["totalRequests"], 1);
        assert_eq!(json["default"]["totalAmount"].as_f64(), Some(19.9));
        assert_eq!(json["fallback"]["totalRequests"], 0);
        assert_eq!(json["fallback"]["totalAmount"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_overflowing_total_is_reported() {
        let mut summary = PaymentSummary::default();
        summary.record(Processor::Fallback, Decimal::MAX).unwrap();

        assert_eq!(
            summary.record(Processor::Fallback, dec!(1)),
            Err(TotalOverflow(Processor::Fallback))
        );
        assert_eq!(summary.fallback.total_requests, 1);
        assert_eq!(summary.fallback.total_amount, Decimal::MAX);
        assert!(summary.record(Processor::Default, dec!(1)).is_ok());
    }
}
