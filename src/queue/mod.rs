pub mod payment_queue;
pub mod worker;

pub use payment_queue::{PaymentQueue, QueuedPayment};
pub use worker::{DeadLetter, DeadLetters, RetryPolicy, WorkerContext, WorkerPool};
