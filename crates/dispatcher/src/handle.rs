//! CompletionHandle - per-send worker that delivers results to the caller

use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use contracts::{ReceiveResult, WatchId};

use crate::dispatcher::SendId;

/// Result of one target, queued for the completion worker
pub(crate) type TargetResult = (WatchId, ReceiveResult);

/// Handle to the task running a send's completion callback
///
/// The callback runs on this task only, so it never executes inside `send`
/// and never runs concurrently with itself.
pub(crate) struct CompletionHandle {
    tx: mpsc::UnboundedSender<TargetResult>,
    worker_handle: JoinHandle<()>,
}

impl CompletionHandle {
    /// Spawn the worker for a send with `expected` distinct targets
    pub(crate) fn spawn<F>(send_id: SendId, expected: usize, on_result: F) -> Self
    where
        F: FnMut(WatchId, ReceiveResult) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker_handle = tokio::spawn(async move {
            completion_worker(send_id, expected, rx, on_result).await;
        });
        Self { tx, worker_handle }
    }

    /// Sender the dispatcher uses to finalize targets
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<TargetResult> {
        self.tx.clone()
    }

    /// Drop the handle's own sender; the worker stays alive while pending
    /// deliveries still hold a sender.
    pub(crate) fn detach(self) -> JoinHandle<()> {
        self.worker_handle
    }
}

/// Worker that forwards each target's result to the callback, once
#[instrument(
    name = "completion_worker",
    skip(rx, on_result),
    fields(send_id = %send_id)
)]
async fn completion_worker<F>(
    send_id: SendId,
    expected: usize,
    mut rx: mpsc::UnboundedReceiver<TargetResult>,
    mut on_result: F,
) where
    F: FnMut(WatchId, ReceiveResult),
{
    let mut seen: HashSet<WatchId> = HashSet::with_capacity(expected);

    while seen.len() < expected {
        let Some((watch, result)) = rx.recv().await else {
            warn!(
                delivered = seen.len(),
                expected, "Result channel closed before every target completed"
            );
            return;
        };

        if !seen.insert(watch.clone()) {
            warn!(watch = %watch, "Duplicate result dropped");
            continue;
        }

        debug!(watch = %watch, result = %result, "Delivering result");
        on_result(watch, result);
    }

    debug!(expected, "All targets completed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::NackReason;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_each_target_reported_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = CompletionHandle::spawn(SendId(1), 2, move |watch, result| {
            sink.lock().unwrap().push((watch, result));
        });

        let tx = handle.sender();
        tx.send(("w1".into(), ReceiveResult::Ack)).unwrap();
        tx.send(("w1".into(), ReceiveResult::Timeout)).unwrap();
        tx.send(("w2".into(), ReceiveResult::Nack(NackReason::NotConnected)))
            .unwrap();

        handle.detach().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("w1".into(), ReceiveResult::Ack));
        assert_eq!(seen[1].0, "w2");
    }

    #[tokio::test]
    async fn test_worker_exits_when_senders_dropped() {
        let handle = CompletionHandle::spawn(SendId(2), 3, |_, _| {});
        let tx = handle.sender();
        tx.send(("w1".into(), ReceiveResult::Ack)).unwrap();
        drop(tx);

        // detach drops the handle's sender as well
        handle.detach().await.unwrap();
    }
}
