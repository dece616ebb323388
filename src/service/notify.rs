//! Notification boundary.
//!
//! Transfer events are handed to a [`Notifier`] after the state change has been
//! committed. Delivery runs on its own task; a failing notifier is logged and
//! never affects the operation that produced the notice.

use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::prelude::Uuid;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What happened to the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The origin school issued a TAC
    TacIssued,
    /// A destination school claimed the transfer
    TransferInitiated,
    /// The record was migrated
    TransferCompleted,
    /// The destination school declined
    TransferRejected,
    /// The origin school withdrew the TAC
    TacRevoked,
}

/// One transfer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferNotice {
    /// Event kind
    pub kind: NoticeKind,
    /// Transfer the event belongs to
    pub transfer_id: Uuid,
    /// Student being transferred
    pub student_id: Uuid,
    /// Origin school
    pub from_school_id: Uuid,
    /// Destination school, once bound
    pub to_school_id: Option<Uuid>,
    /// Free-form reason (request or rejection reason)
    pub reason: Option<String>,
}

/// Receiver of transfer events (mail, webhooks, in-app inbox).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notice.
    async fn notify(&self, notice: &TransferNotice) -> Result<()>;
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &TransferNotice) -> Result<()> {
        info!(
            kind = ?notice.kind,
            transfer_id = %notice.transfer_id,
            from_school_id = %notice.from_school_id,
            to_school_id = ?notice.to_school_id,
            "Transfer notice"
        );
        Ok(())
    }
}

/// Delivers `notice` on a background task.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notice: TransferNotice) -> JoinHandle<()> {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notice).await {
            warn!(
                kind = ?notice.kind,
                transfer_id = %notice.transfer_id,
                error = %e,
                "Failed to deliver transfer notice"
            );
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::errors::Error;
    use std::sync::Mutex;

    /// Keeps every notice it receives.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<TransferNotice>>,
    }

    impl RecordingNotifier {
        pub fn kinds(&self) -> Vec<NoticeKind> {
            self.notices
                .lock()
                .map(|n| n.iter().map(|notice| notice.kind).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &TransferNotice) -> Result<()> {
            if let Ok(mut notices) = self.notices.lock() {
                notices.push(notice.clone());
            }
            Ok(())
        }
    }

    /// Fails every delivery.
    #[derive(Debug, Default)]
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notice: &TransferNotice) -> Result<()> {
            Err(Error::Config {
                message: "mail relay unreachable".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::testing::*;
    use super::*;

    fn notice(kind: NoticeKind) -> TransferNotice {
        TransferNotice {
            kind,
            transfer_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            from_school_id: Uuid::new_v4(),
            to_school_id: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier = Arc::clone(&recorder) as Arc<dyn Notifier>;

        dispatch(&notifier, notice(NoticeKind::TacIssued)).await.unwrap();
        assert_eq!(recorder.kinds(), vec![NoticeKind::TacIssued]);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let notifier: Arc<dyn Notifier> = Arc::new(FailingNotifier);
        // The task finishes normally even though delivery failed
        dispatch(&notifier, notice(NoticeKind::TacRevoked)).await.unwrap();
    }

    #[tokio::test]
    async fn test_tracing_notifier_accepts_everything() {
        let notifier = TracingNotifier;
        assert!(notifier.notify(&notice(NoticeKind::TransferCompleted)).await.is_ok());
    }
}
