use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::SummaryError;
use crate::models::{PaymentSummary, StoredPayment, TotalOverflow};
use crate::storage::PaymentStore;
use crate::utils::time::parse_timestamp;

/// Inclusive `[from, to]` filter on `requestedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Both bounds or neither; blank values count as absent.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Option<Self>, SummaryError> {
        let from = from.map(str::trim).filter(|s| !s.is_empty());
        let to = to.map(str::trim).filter(|s| !s.is_empty());

        match (from, to) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) => Ok(Some(Self {
                from: parse_bound(from)?,
                to: parse_bound(to)?,
            })),
            _ => Err(SummaryError::MissingBound),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

fn parse_bound(raw: &str) -> Result<DateTime<Utc>, SummaryError> {
    parse_timestamp(raw).ok_or_else(|| SummaryError::InvalidTimestamp(raw.to_string()))
}

/// Reduces serialized records to per-processor totals.
///
/// Records that fail to deserialize or name an unknown processor are
/// skipped. With a window, records whose `requestedAt` cannot be parsed are
/// skipped too. Fails if a bucket total leaves the `Decimal` range.
pub fn aggregate<'a, I>(
    records: I,
    window: Option<&TimeWindow>,
) -> Result<PaymentSummary, TotalOverflow>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut summary = PaymentSummary::default();

    for bytes in records {
        let record = match StoredPayment::from_slice(bytes) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "skipping malformed payment record");
                continue;
            }
        };

        if let Some(window) = window {
            match parse_timestamp(&record.requested_at) {
                Some(at) if window.contains(at) => {}
                _ => continue,
            }
        }

        if let Some(processor) = record.processor() {
            summary.record(processor, record.amount)?;
        }
    }

    Ok(summary.rounded())
}

pub struct SummaryAggregator {
    store: Arc<dyn PaymentStore>,
}

impl SummaryAggregator {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    pub async fn summarize(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<PaymentSummary, SummaryError> {
        let window = TimeWindow::parse(from, to)?;
        let records = self.store.scan_all().await?;
        let summary = aggregate(records.values().map(Vec::as_slice), window.as_ref())?;
        Ok(summary)
    }
}
