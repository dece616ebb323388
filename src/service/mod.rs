//! Transfer service - the operations the HTTP layer calls.
//!
//! The caller has already confirmed that the acting user belongs to the school
//! id it passes in. The service owns the connection, the protocol settings and
//! the notifier, delegates to [`crate::core`], and emits a notice after every
//! successful state change.

/// Notification boundary
pub mod notify;

use crate::{
    config::transfer::TransferConfig,
    core::{
        history::{self, HistoricalGrades},
        listing::{self, ListQuery, Page},
        migration::MigrationRequest,
        snapshot::{self, StudentTransferSnapshot},
        transfer::{self, CompletedTransfer, IssuedTac},
    },
    entities::transfer as transfer_entity,
    errors::Result,
};
use notify::{NoticeKind, Notifier, TracingNotifier, TransferNotice};
use sea_orm::{DatabaseConnection, prelude::Uuid};
use std::sync::Arc;
use tracing::debug;

/// Result of a successful `initiate_transfer`.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiatedTransfer {
    /// The claimed transfer
    pub transfer: transfer_entity::Model,
    /// The origin record the destination school may now read
    pub snapshot: StudentTransferSnapshot,
}

/// Entry point for the transfer protocol.
#[derive(Clone)]
pub struct TransferService {
    db: DatabaseConnection,
    config: TransferConfig,
    notifier: Arc<dyn Notifier>,
}

impl TransferService {
    /// Service that logs its notices.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: TransferConfig) -> Self {
        Self::with_notifier(db, config, Arc::new(TracingNotifier))
    }

    /// Service with a custom notifier.
    #[must_use]
    pub fn with_notifier(
        db: DatabaseConnection,
        config: TransferConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            notifier,
        }
    }

    /// Underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Active protocol settings.
    #[must_use]
    pub const fn config(&self) -> &TransferConfig {
        &self.config
    }

    fn announce(
        &self,
        kind: NoticeKind,
        transfer: &transfer_entity::Model,
        reason: Option<String>,
    ) {
        self.send(TransferNotice {
            kind,
            transfer_id: transfer.id,
            student_id: transfer.student_id,
            from_school_id: transfer.from_school_id,
            to_school_id: transfer.to_school_id,
            reason,
        });
    }

    fn send(&self, notice: TransferNotice) {
        if !self.config.notifications_enabled {
            debug!(
                kind = ?notice.kind,
                transfer_id = %notice.transfer_id,
                "Notifications disabled, dropping notice"
            );
            return;
        }
        notify::dispatch(&self.notifier, notice);
    }

    /// Issues a TAC for a student of `school_id`, or returns the live one.
    pub async fn generate_tac(
        &self,
        school_id: Uuid,
        requesting_user_id: Uuid,
        student_id: Uuid,
        reason: Option<String>,
    ) -> Result<IssuedTac> {
        let notice_reason = reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let issued = transfer::request_tac(
            &self.db,
            &self.config,
            school_id,
            requesting_user_id,
            student_id,
            reason,
        )
        .await?;
        if !issued.reused {
            self.send(TransferNotice {
                kind: NoticeKind::TacIssued,
                transfer_id: issued.transfer_id,
                student_id,
                from_school_id: school_id,
                to_school_id: None,
                reason: notice_reason,
            });
        }
        Ok(issued)
    }

    /// Claims a transfer for `school_id` and returns the student's origin record.
    pub async fn initiate_transfer(
        &self,
        school_id: Uuid,
        tac: &str,
        student_id: Uuid,
    ) -> Result<InitiatedTransfer> {
        let (transfer, snapshot) =
            transfer::initiate(&self.db, &self.config, school_id, tac, student_id).await?;
        self.announce(NoticeKind::TransferInitiated, &transfer, None);
        Ok(InitiatedTransfer { transfer, snapshot })
    }

    /// Reads the origin record a TAC grants access to without claiming it.
    pub async fn fetch_student_record(
        &self,
        tac: &str,
        student_id: Uuid,
    ) -> Result<StudentTransferSnapshot> {
        snapshot::fetch_by_tac(&self.db, tac, student_id).await
    }

    /// Migrates the student into `school_id` and completes the transfer.
    pub async fn complete_transfer(
        &self,
        school_id: Uuid,
        transfer_id: Uuid,
        request: &MigrationRequest,
    ) -> Result<CompletedTransfer> {
        let completed = transfer::complete(&self.db, school_id, transfer_id, request).await?;
        self.announce(NoticeKind::TransferCompleted, &completed.transfer, None);
        Ok(completed)
    }

    /// Declines a transfer claimed by `school_id`.
    pub async fn reject_transfer(
        &self,
        school_id: Uuid,
        transfer_id: Uuid,
        reason: &str,
    ) -> Result<transfer_entity::Model> {
        let rejected = transfer::reject(&self.db, school_id, transfer_id, reason).await?;
        self.announce(
            NoticeKind::TransferRejected,
            &rejected,
            rejected.rejection_reason.clone(),
        );
        Ok(rejected)
    }

    /// Withdraws an unused TAC issued by `school_id`.
    pub async fn revoke_tac(
        &self,
        school_id: Uuid,
        transfer_id: Uuid,
    ) -> Result<transfer_entity::Model> {
        let revoked = transfer::revoke(&self.db, school_id, transfer_id).await?;
        self.announce(NoticeKind::TacRevoked, &revoked, None);
        Ok(revoked)
    }

    /// Transfers `school_id` issued TACs for.
    pub async fn list_outgoing(
        &self,
        school_id: Uuid,
        query: &ListQuery,
    ) -> Result<Page<transfer_entity::Model>> {
        listing::list_outgoing(&self.db, &self.config, school_id, query).await
    }

    /// Transfers `school_id` has claimed.
    pub async fn list_incoming(
        &self,
        school_id: Uuid,
        query: &ListQuery,
    ) -> Result<Page<transfer_entity::Model>> {
        listing::list_incoming(&self.db, &self.config, school_id, query).await
    }

    /// Grade history the origin school held when the transfer completed.
    pub async fn get_historical_grades(
        &self,
        school_id: Uuid,
        transfer_id: Uuid,
    ) -> Result<HistoricalGrades> {
        history::get_historical_grades(&self.db, school_id, transfer_id).await
    }
}
