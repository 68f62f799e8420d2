use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::warn;

use crate::app::config::OverflowPolicy;
use crate::error::QueueError;
use crate::models::PaymentRequest;

/// A submission waiting for a worker, with the dispatches already tried.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedPayment {
    pub request: PaymentRequest,
    pub attempts: u32,
}

impl QueuedPayment {
    pub fn new(request: PaymentRequest) -> Self {
        Self { request, attempts: 0 }
    }
}

/// Bounded FIFO intake buffer shared by the submit path and the workers.
pub struct PaymentQueue {
    sender: mpsc::Sender<QueuedPayment>,
    receiver: Mutex<mpsc::Receiver<QueuedPayment>>,
    overflow: OverflowPolicy,
}

impl PaymentQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            overflow,
        }
    }

    pub async fn enqueue(&self, request: PaymentRequest) -> Result<(), QueueError> {
        let item = QueuedPayment::new(request);
        match self.overflow {
            OverflowPolicy::Block => self.sender.send(item).await.map_err(|_| QueueError::Closed),
            OverflowPolicy::Reject => self.sender.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Closed(_) => QueueError::Closed,
            }),
        }
    }

    /// Puts `item` back at the tail once `delay` has passed.
    ///
    /// The wait and the send run on their own task, so a worker never blocks
    /// on a full queue while handing a payment back.
    pub fn requeue_after(&self, item: QueuedPayment, delay: Duration) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(mpsc::error::SendError(item)) = sender.send(item).await {
                warn!(
                    correlation_id = %item.request.correlation_id,
                    "queue closed, dropping payment"
                );
            }
        });
    }

    /// Waits for the next payment.
    pub async fn dequeue(&self) -> Option<QueuedPayment> {
        self.receiver.lock().await.recv().await
    }

    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}
