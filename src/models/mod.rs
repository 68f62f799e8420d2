pub mod payment;
pub mod summary;

pub use payment::{PaymentRequest, Processor, ProcessorPayload, StoredPayment};
pub use summary::{PaymentSummary, SummaryItem, TotalOverflow};
