//! Origin-side view of a completed transfer.
//!
//! After completion the origin school keeps its own rows (the source enrollment
//! is only deactivated), so the frozen record is whatever enrollments existed
//! at the origin when the transfer completed.

use crate::{
    core::{
        snapshot::{self, EnrollmentRecord},
        transfer::get_transfer,
    },
    entities::{TransferStatus, transfer},
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use tracing::instrument;

/// A completed transfer with the grade history it carried away.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalGrades {
    /// The completed transfer
    pub transfer: transfer::Model,
    /// Origin enrollments that started on or before completion, most recent first
    pub enrollments: Vec<EnrollmentRecord>,
}

/// Returns the grade history the origin school held when `transfer_id` completed.
///
/// # Errors
/// * `NotFound` - unknown transfer
/// * `Forbidden` - `school_id` is not the origin school
/// * `BadRequest` - the transfer is not COMPLETED
#[instrument(skip(db))]
pub async fn get_historical_grades<C>(
    db: &C,
    school_id: Uuid,
    transfer_id: Uuid,
) -> Result<HistoricalGrades>
where
    C: ConnectionTrait,
{
    let transfer = get_transfer(db, transfer_id).await?;
    if transfer.from_school_id != school_id {
        return Err(Error::forbidden(
            "Only the origin school can view the historical grades of a transfer",
        ));
    }
    let Some(completed_at) = transfer
        .completed_at
        .filter(|_| transfer.status == TransferStatus::Completed)
    else {
        return Err(Error::bad_request(
            "Historical grades are only available for completed transfers",
        ));
    };

    let enrollments = snapshot::load_history(db, transfer.student_id, transfer.from_school_id)
        .await?
        .into_iter()
        .filter(|record| record.enrollment.enrollment_date <= completed_at)
        .collect();

    Ok(HistoricalGrades {
        transfer,
        enrollments,
    })
}
