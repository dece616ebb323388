//! Transfer entity - The aggregate root of the student transfer protocol.
//!
//! A transfer is created by the origin school together with its Transfer Access
//! Code (TAC), claimed by a destination school, and terminated exactly once.
//! `tac` is unique while present; `tac_used_at`/`tac_used_by` are only ever set
//! together with the `COMPLETED` status.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a transfer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// TAC issued, waiting for a destination school
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Claimed by a destination school, waiting for completion
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    /// Record migrated; the TAC is consumed
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Declined by the destination school
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    /// Revoked by the origin school before use
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl TransferStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Whether the transfer can still be claimed or completed.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

/// Transfer database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    /// Server-assigned identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Student being transferred
    pub student_id: Uuid,
    /// Origin school (set at creation, immutable)
    pub from_school_id: Uuid,
    /// Destination school, bound by the first successful `initiate`
    pub to_school_id: Option<Uuid>,
    /// Class level of the origin enrollment when the TAC was issued
    pub class_level: Option<String>,
    /// Transfer Access Code, unique while present
    #[sea_orm(unique)]
    pub tac: Option<String>,
    /// When the current TAC was generated
    pub tac_generated_at: Option<DateTimeUtc>,
    /// When the current TAC stops being accepted
    pub tac_expires_at: Option<DateTimeUtc>,
    /// When the TAC was consumed (completion only)
    pub tac_used_at: Option<DateTimeUtc>,
    /// School that consumed the TAC
    pub tac_used_by: Option<Uuid>,
    /// Lifecycle state
    pub status: TransferStatus,
    /// Free-text reason given by the origin school
    pub reason: Option<String>,
    /// Origin-school user that requested the TAC
    pub requested_by: Uuid,
    /// When a destination school claimed the transfer
    pub approved_at: Option<DateTimeUtc>,
    /// When the destination school rejected the transfer
    pub rejected_at: Option<DateTimeUtc>,
    /// Reason given for the rejection
    pub rejection_reason: Option<String>,
    /// When the migration was committed
    pub completed_at: Option<DateTimeUtc>,
    /// Creation timestamp
    pub created_at: DateTimeUtc,
    /// Last modification timestamp
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Transfer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transfer moves one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the TAC is present, unused and not yet expired at `now`.
    #[must_use]
    pub fn has_live_tac(&self, now: DateTimeUtc) -> bool {
        self.status.is_live()
            && self.tac.is_some()
            && self.tac_used_at.is_none()
            && self.tac_expires_at.is_some_and(|expires| expires > now)
    }

    /// Whether the TAC has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTimeUtc) -> bool {
        self.tac_expires_at.is_some_and(|expires| expires < now)
    }
}
