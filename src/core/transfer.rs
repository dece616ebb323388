//! Transfer state machine.
//!
//! PENDING -> APPROVED -> COMPLETED, with REJECTED (destination declines) and
//! CANCELLED (origin revokes) as the other terminal states. Every transition is
//! a conditional update that re-states its guard in the WHERE clause, so two
//! racing requests cannot both win; the loser re-reads the row and gets the
//! error that now applies.
//!
//! Completion is the only path that consumes a TAC. `initiate` binds the
//! destination school but leaves the code reusable by that same school, so an
//! aborted completion can be retried.

use crate::{
    config::transfer::TransferConfig,
    core::{
        migration::{self, MigrationRequest, MigrationUnit},
        snapshot::{self, StudentTransferSnapshot},
        tac::{self, Attempt},
    },
    entities::{Enrollment, Student, Transfer, TransferStatus, enrollment, transfer},
    errors::{Error, Result, is_unique_violation},
};
use chrono::{Duration, Utc};
use sea_orm::{
    Condition, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait, prelude::*,
};
use tracing::{info, instrument, warn};

/// A TAC handed to the origin school.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTac {
    /// Transfer the code belongs to
    pub transfer_id: Uuid,
    /// The code itself
    pub tac: String,
    /// When the code stops being accepted
    pub expires_at: DateTimeUtc,
    /// True when an existing live code was returned instead of a new one
    pub reused: bool,
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransfer {
    /// The finalised transfer
    pub transfer: transfer::Model,
    /// Enrollment created at the destination school
    pub new_enrollment_id: Uuid,
    /// Number of grades copied
    pub grades_copied: usize,
}

/// Loads a transfer by id.
pub async fn get_transfer<C>(db: &C, transfer_id: Uuid) -> Result<transfer::Model>
where
    C: ConnectionTrait,
{
    Transfer::find_by_id(transfer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("transfer", transfer_id))
}

/// Issues a TAC for `student_id` at the origin school, or returns the live one.
///
/// At most one unused, unexpired code exists per (student, origin school); a
/// repeated request gets the same code back with `reused = true`.
///
/// # Errors
/// * `NotFound` - unknown student, or the student was never enrolled at the school
/// * `TokenGenerationExhausted` - no unique code within the configured attempts
#[instrument(skip(db, config, reason))]
pub async fn request_tac(
    db: &DatabaseConnection,
    config: &TransferConfig,
    from_school_id: Uuid,
    requested_by: Uuid,
    student_id: Uuid,
    reason: Option<String>,
) -> Result<IssuedTac> {
    let txn = db.begin().await?;
    let now = Utc::now();

    Student::find_by_id(student_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("student", student_id))?;

    let class_level = current_class_level(&txn, student_id, from_school_id)
        .await?
        .ok_or_else(|| Error::not_found("enrollment for student", student_id))?;

    if let Some(existing) = find_live_tac(&txn, student_id, from_school_id, now).await? {
        txn.commit().await?;
        info!(transfer_id = %existing.id, "Returning existing live TAC");
        return issued(existing, true);
    }

    let expires_at = now + Duration::days(config.tac_ttl_days);
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let txn_ref = &txn;
    let created = tac::issue_unique(&config.tac_prefix, config.max_generation_attempts, |code| {
        let candidate = transfer::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(student_id),
            from_school_id: Set(from_school_id),
            to_school_id: Set(None),
            class_level: Set(Some(class_level.clone())),
            tac: Set(Some(code)),
            tac_generated_at: Set(Some(now)),
            tac_expires_at: Set(Some(expires_at)),
            tac_used_at: Set(None),
            tac_used_by: Set(None),
            status: Set(TransferStatus::Pending),
            reason: Set(reason.clone()),
            requested_by: Set(requested_by),
            approved_at: Set(None),
            rejected_at: Set(None),
            rejection_reason: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        insert_candidate(txn_ref, candidate)
    })
    .await?;

    txn.commit().await?;
    info!(transfer_id = %created.id, "Issued new TAC");
    issued(created, false)
}

fn issued(transfer: transfer::Model, reused: bool) -> Result<IssuedTac> {
    match (transfer.tac, transfer.tac_expires_at) {
        (Some(tac), Some(expires_at)) => Ok(IssuedTac {
            transfer_id: transfer.id,
            tac,
            expires_at,
            reused,
        }),
        _ => Err(Error::conflict("Transfer has no active access code")),
    }
}

/// Offers one candidate row to the store inside a savepoint so a collision only
/// discards this attempt.
async fn insert_candidate(
    txn: &DatabaseTransaction,
    candidate: transfer::ActiveModel,
) -> Result<Attempt<transfer::Model>> {
    let savepoint = txn.begin().await?;
    match candidate.insert(&savepoint).await {
        Ok(inserted) => {
            savepoint.commit().await?;
            Ok(Attempt::Accepted(inserted))
        }
        Err(err) if is_unique_violation(&err) => {
            savepoint.rollback().await?;
            Ok(Attempt::Collision)
        }
        Err(err) => Err(err.into()),
    }
}

async fn current_class_level<C>(db: &C, student_id: Uuid, school_id: Uuid) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let mut enrollments = Enrollment::find()
        .filter(enrollment::Column::StudentId.eq(student_id))
        .filter(enrollment::Column::SchoolId.eq(school_id))
        .all(db)
        .await?;
    enrollments.sort_by_key(|e| {
        std::cmp::Reverse((e.is_active, e.academic_year.clone(), e.enrollment_date))
    });
    Ok(enrollments.into_iter().next().map(|e| e.class_level))
}

/// Finds the unused, unexpired TAC of (student, origin school), if any.
pub async fn find_live_tac<C>(
    db: &C,
    student_id: Uuid,
    from_school_id: Uuid,
    now: DateTimeUtc,
) -> Result<Option<transfer::Model>>
where
    C: ConnectionTrait,
{
    let candidates = Transfer::find()
        .filter(transfer::Column::StudentId.eq(student_id))
        .filter(transfer::Column::FromSchoolId.eq(from_school_id))
        .filter(transfer::Column::Status.is_in([TransferStatus::Pending, TransferStatus::Approved]))
        .filter(transfer::Column::Tac.is_not_null())
        .filter(transfer::Column::TacUsedAt.is_null())
        .all(db)
        .await?;
    Ok(candidates.into_iter().find(|t| t.has_live_tac(now)))
}

fn ensure_claimable(
    transfer: &transfer::Model,
    to_school_id: Uuid,
    student_id: Uuid,
    now: DateTimeUtc,
) -> Result<()> {
    if transfer.tac_used_at.is_some() {
        return Err(Error::conflict("Transfer access code has already been used"));
    }
    if transfer.to_school_id.is_some_and(|bound| bound != to_school_id) {
        return Err(Error::conflict(
            "Transfer access code has already been claimed by another school",
        ));
    }
    if transfer.is_expired(now) {
        return Err(Error::bad_request("Transfer access code has expired"));
    }
    if transfer.student_id != student_id {
        return Err(Error::bad_request(
            "Transfer access code was not issued for this student",
        ));
    }
    if transfer.from_school_id == to_school_id {
        return Err(Error::bad_request(
            "A student cannot be transferred to the school they are leaving",
        ));
    }
    match transfer.status {
        TransferStatus::Pending | TransferStatus::Approved => Ok(()),
        TransferStatus::Rejected => Err(Error::bad_request("Transfer has been rejected")),
        TransferStatus::Cancelled => Err(Error::bad_request("Transfer has been cancelled")),
        TransferStatus::Completed => Err(Error::conflict("Transfer is already completed")),
    }
}

/// Claims a transfer for the destination school and returns the origin record.
///
/// The same school may call this again on a code it already claimed; another
/// school gets `Conflict`. The TAC is not consumed.
///
/// # Errors
/// * `BadRequest` - malformed or expired code, wrong student, same-school transfer
/// * `NotFound` - unknown code
/// * `Conflict` - code used, or claimed by another school
#[instrument(skip(db, config, tac_code), fields(tac = %tac::mask(tac_code)))]
pub async fn initiate(
    db: &DatabaseConnection,
    config: &TransferConfig,
    to_school_id: Uuid,
    tac_code: &str,
    student_id: Uuid,
) -> Result<(transfer::Model, StudentTransferSnapshot)> {
    let code = tac::normalize(tac_code);
    if !tac::is_well_formed(&config.tac_prefix, &code) {
        return Err(Error::bad_request("Malformed transfer access code"));
    }

    let transfer = Transfer::find()
        .filter(transfer::Column::Tac.eq(code.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("transfer access code", tac::mask(&code)))?;

    let now = Utc::now();
    ensure_claimable(&transfer, to_school_id, student_id, now)?;

    let claimed = Transfer::update_many()
        .set(transfer::ActiveModel {
            to_school_id: Set(Some(to_school_id)),
            status: Set(TransferStatus::Approved),
            approved_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(transfer::Column::Id.eq(transfer.id))
        .filter(transfer::Column::TacUsedAt.is_null())
        .filter(transfer::Column::Status.is_in([TransferStatus::Pending, TransferStatus::Approved]))
        .filter(
            Condition::any()
                .add(transfer::Column::ToSchoolId.is_null())
                .add(transfer::Column::ToSchoolId.eq(to_school_id)),
        )
        .exec(db)
        .await?;

    if claimed.rows_affected == 0 {
        let latest = get_transfer(db, transfer.id).await?;
        ensure_claimable(&latest, to_school_id, student_id, now)?;
        return Err(Error::conflict("Transfer changed while it was being claimed"));
    }

    let transfer = get_transfer(db, transfer.id).await?;
    info!(transfer_id = %transfer.id, %to_school_id, "Transfer claimed by destination school");

    let snapshot = snapshot::fetch_for_transfer(db, &transfer).await?;
    Ok((transfer, snapshot))
}

fn ensure_completable(transfer: &transfer::Model, to_school_id: Uuid) -> Result<()> {
    if transfer.to_school_id != Some(to_school_id) {
        return Err(Error::forbidden(
            "Only the destination school that claimed the transfer can complete it",
        ));
    }
    match transfer.status {
        TransferStatus::Approved => Ok(()),
        TransferStatus::Completed => Err(Error::conflict("Transfer is already completed")),
        TransferStatus::Rejected => Err(Error::bad_request("Transfer has been rejected")),
        TransferStatus::Cancelled => Err(Error::bad_request("Transfer has been cancelled")),
        TransferStatus::Pending => Err(Error::bad_request("Transfer has not been claimed")),
    }
}

/// Migrates the student into the destination school and finalises the transfer.
///
/// Everything, including the status flip and TAC consumption, commits in one
/// transaction. On any failure the transfer stays APPROVED and can be retried.
///
/// # Errors
/// * `NotFound` - unknown transfer, class or class arm
/// * `Forbidden` - the caller is not the bound destination school
/// * `Conflict` - already completed (including by a concurrent call)
/// * `BadRequest` - rejected/cancelled transfer, full arm, no teacher, invalid request
#[instrument(skip(db, request))]
pub async fn complete(
    db: &DatabaseConnection,
    to_school_id: Uuid,
    transfer_id: Uuid,
    request: &MigrationRequest,
) -> Result<CompletedTransfer> {
    let unit = MigrationUnit::begin(db).await?;
    match complete_in(&unit, to_school_id, transfer_id, request).await {
        Ok(completed) => {
            unit.commit().await?;
            info!(
                %transfer_id,
                new_enrollment_id = %completed.new_enrollment_id,
                grades_copied = completed.grades_copied,
                "Transfer completed"
            );
            Ok(completed)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                warn!(
                    %transfer_id,
                    error = %rollback_err,
                    "Rollback after failed completion failed"
                );
            }
            Err(err)
        }
    }
}

async fn complete_in(
    unit: &MigrationUnit,
    to_school_id: Uuid,
    transfer_id: Uuid,
    request: &MigrationRequest,
) -> Result<CompletedTransfer> {
    let db = unit.connection();
    let transfer = get_transfer(db, transfer_id).await?;
    ensure_completable(&transfer, to_school_id)?;

    let outcome = migration::migrate(unit, &transfer, to_school_id, request).await?;

    let now = Utc::now();
    let finalized = Transfer::update_many()
        .set(transfer::ActiveModel {
            status: Set(TransferStatus::Completed),
            completed_at: Set(Some(now)),
            tac_used_at: Set(Some(now)),
            tac_used_by: Set(Some(to_school_id)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(transfer::Column::Id.eq(transfer_id))
        .filter(transfer::Column::Status.eq(TransferStatus::Approved))
        .filter(transfer::Column::ToSchoolId.eq(to_school_id))
        .filter(transfer::Column::TacUsedAt.is_null())
        .exec(db)
        .await?;

    if finalized.rows_affected == 0 {
        return Err(Error::conflict("Transfer was completed by a concurrent request"));
    }

    Ok(CompletedTransfer {
        transfer: get_transfer(db, transfer_id).await?,
        new_enrollment_id: outcome.new_enrollment_id,
        grades_copied: outcome.grades_copied,
    })
}

fn ensure_rejectable(transfer: &transfer::Model, to_school_id: Uuid) -> Result<()> {
    if transfer.to_school_id != Some(to_school_id) {
        return Err(Error::forbidden(
            "Only the destination school that claimed the transfer can reject it",
        ));
    }
    if transfer.status.is_terminal() {
        return Err(Error::conflict(format!(
            "Cannot reject a transfer that is {}",
            transfer.status.to_value()
        )));
    }
    if transfer.status == TransferStatus::Pending {
        return Err(Error::bad_request("Transfer has not been claimed"));
    }
    Ok(())
}

/// Declines a claimed transfer. The TAC is left untouched.
///
/// # Errors
/// * `BadRequest` - blank reason
/// * `NotFound` - unknown transfer
/// * `Forbidden` - the caller is not the bound destination school
/// * `Conflict` - the transfer is already terminal
#[instrument(skip(db, reason))]
pub async fn reject(
    db: &DatabaseConnection,
    to_school_id: Uuid,
    transfer_id: Uuid,
    reason: &str,
) -> Result<transfer::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::bad_request("A rejection reason is required"));
    }

    let transfer = get_transfer(db, transfer_id).await?;
    ensure_rejectable(&transfer, to_school_id)?;

    let now = Utc::now();
    let rejected = Transfer::update_many()
        .set(transfer::ActiveModel {
            status: Set(TransferStatus::Rejected),
            rejected_at: Set(Some(now)),
            rejection_reason: Set(Some(reason.to_string())),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(transfer::Column::Id.eq(transfer_id))
        .filter(transfer::Column::Status.eq(TransferStatus::Approved))
        .filter(transfer::Column::ToSchoolId.eq(to_school_id))
        .exec(db)
        .await?;

    if rejected.rows_affected == 0 {
        let latest = get_transfer(db, transfer_id).await?;
        ensure_rejectable(&latest, to_school_id)?;
        return Err(Error::conflict("Transfer changed while it was being rejected"));
    }

    info!(%transfer_id, "Transfer rejected");
    get_transfer(db, transfer_id).await
}

fn ensure_revocable(transfer: &transfer::Model, from_school_id: Uuid) -> Result<()> {
    if transfer.from_school_id != from_school_id {
        return Err(Error::forbidden(
            "Only the origin school can revoke a transfer access code",
        ));
    }
    if transfer.tac_used_at.is_some() {
        return Err(Error::conflict("Cannot revoke a transfer access code that has been used"));
    }
    match transfer.status {
        TransferStatus::Completed => Err(Error::conflict("Transfer is already completed")),
        TransferStatus::Cancelled => Err(Error::conflict("Transfer has already been revoked")),
        TransferStatus::Pending | TransferStatus::Approved | TransferStatus::Rejected => Ok(()),
    }
}

/// Withdraws an unused TAC: the code and its timestamps are cleared and the
/// transfer becomes CANCELLED.
///
/// # Errors
/// * `NotFound` - unknown transfer
/// * `Forbidden` - the caller is not the origin school
/// * `Conflict` - the code was used, or the transfer is already cancelled
#[instrument(skip(db))]
pub async fn revoke(
    db: &DatabaseConnection,
    from_school_id: Uuid,
    transfer_id: Uuid,
) -> Result<transfer::Model> {
    let transfer = get_transfer(db, transfer_id).await?;
    ensure_revocable(&transfer, from_school_id)?;

    let now = Utc::now();
    let revoked = Transfer::update_many()
        .set(transfer::ActiveModel {
            tac: Set(None),
            tac_generated_at: Set(None),
            tac_expires_at: Set(None),
            status: Set(TransferStatus::Cancelled),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(transfer::Column::Id.eq(transfer_id))
        .filter(transfer::Column::FromSchoolId.eq(from_school_id))
        .filter(transfer::Column::TacUsedAt.is_null())
        .filter(transfer::Column::Status.is_not_in([
            TransferStatus::Completed,
            TransferStatus::Cancelled,
        ]))
        .exec(db)
        .await?;

    if revoked.rows_affected == 0 {
        let latest = get_transfer(db, transfer_id).await?;
        ensure_revocable(&latest, from_school_id)?;
        return Err(Error::conflict("Transfer changed while it was being revoked"));
    }

    info!(%transfer_id, "TAC revoked");
    get_transfer(db, transfer_id).await
}
