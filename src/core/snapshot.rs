//! Cross-tenant read of one student's academic record.
//!
//! This is the only read path that ignores tenant scoping. The caller proves
//! possession of a TAC; the origin school and student are re-derived from the
//! transfer row the TAC points at, and only that student's enrollments at that
//! one school are returned.

use crate::{
    core::{health::HealthProfile, tac},
    entities::{Enrollment, Grade, Student, Transfer, enrollment, grade, student, transfer},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::prelude::*;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One enrollment with its full grade history.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    /// The enrollment row
    pub enrollment: enrollment::Model,
    /// Grades under the enrollment, most recent first
    pub grades: Vec<grade::Model>,
}

/// Point-in-time bundle of a student's profile, enrollments and grades at the
/// origin school of a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentTransferSnapshot {
    /// Transfer the snapshot was taken for
    pub transfer_id: Uuid,
    /// Origin school the records were read from
    pub from_school_id: Uuid,
    /// Student profile
    pub student: student::Model,
    /// Every enrollment at the origin school, most recent first
    pub enrollments: Vec<EnrollmentRecord>,
    current_index: Option<usize>,
}

impl StudentTransferSnapshot {
    /// The most recently active enrollment, or the most recent one when none is active.
    #[must_use]
    pub fn current(&self) -> Option<&EnrollmentRecord> {
        self.current_index.and_then(|idx| self.enrollments.get(idx))
    }

    /// Grades of [`Self::current`], empty when the student has no enrollment.
    #[must_use]
    pub fn current_grades(&self) -> &[grade::Model] {
        self.current().map_or(&[], |record| record.grades.as_slice())
    }

    /// Number of grades across every enrollment.
    #[must_use]
    pub fn total_grades(&self) -> usize {
        self.enrollments.iter().map(|record| record.grades.len()).sum()
    }

    /// Medical fields of the transferred profile.
    #[must_use]
    pub fn health(&self) -> HealthProfile {
        HealthProfile::from(&self.student)
    }
}

/// Reads the record a TAC grants access to.
///
/// # Errors
/// * `NotFound` - no transfer holds this TAC, or the student is gone
/// * `BadRequest` - the TAC is bound to another student, or has expired
/// * `Conflict` - the TAC has already been consumed
#[instrument(skip(db, tac_code), fields(tac = %tac::mask(tac_code)))]
pub async fn fetch_by_tac<C>(
    db: &C,
    tac_code: &str,
    student_id: Uuid,
) -> Result<StudentTransferSnapshot>
where
    C: ConnectionTrait,
{
    let code = tac::normalize(tac_code);
    let transfer = Transfer::find()
        .filter(transfer::Column::Tac.eq(code.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("transfer access code", tac::mask(&code)))?;

    if transfer.student_id != student_id {
        return Err(Error::bad_request(
            "Transfer access code was not issued for this student",
        ));
    }
    if transfer.tac_used_at.is_some() {
        return Err(Error::conflict("Transfer access code has already been used"));
    }
    if transfer.is_expired(Utc::now()) {
        return Err(Error::bad_request("Transfer access code has expired"));
    }

    fetch_for_transfer(db, &transfer).await
}

/// Reads the origin record for a transfer already loaded by the caller.
pub async fn fetch_for_transfer<C>(
    db: &C,
    transfer: &transfer::Model,
) -> Result<StudentTransferSnapshot>
where
    C: ConnectionTrait,
{
    let student = Student::find_by_id(transfer.student_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("student", transfer.student_id))?;

    let enrollments = load_history(db, transfer.student_id, transfer.from_school_id).await?;
    let current_index = enrollments
        .iter()
        .position(|record| record.enrollment.is_active)
        .or_else(|| (!enrollments.is_empty()).then_some(0));

    debug!(
        transfer_id = %transfer.id,
        enrollments = enrollments.len(),
        "Loaded origin snapshot"
    );

    Ok(StudentTransferSnapshot {
        transfer_id: transfer.id,
        from_school_id: transfer.from_school_id,
        student,
        enrollments,
        current_index,
    })
}

/// Loads every enrollment of `student_id` at `school_id` with its grades, both
/// ordered most recent first.
pub(crate) async fn load_history<C>(
    db: &C,
    student_id: Uuid,
    school_id: Uuid,
) -> Result<Vec<EnrollmentRecord>>
where
    C: ConnectionTrait,
{
    let mut enrollments = Enrollment::find()
        .filter(enrollment::Column::StudentId.eq(student_id))
        .filter(enrollment::Column::SchoolId.eq(school_id))
        .all(db)
        .await?;
    enrollments.sort_by(|a, b| {
        (&b.academic_year, b.enrollment_date, b.created_at).cmp(&(
            &a.academic_year,
            a.enrollment_date,
            a.created_at,
        ))
    });

    let ids: Vec<Uuid> = enrollments.iter().map(|e| e.id).collect();
    let mut by_enrollment: HashMap<Uuid, Vec<grade::Model>> = HashMap::new();
    if !ids.is_empty() {
        let grades = Grade::find()
            .filter(grade::Column::EnrollmentId.is_in(ids))
            .all(db)
            .await?;
        for grade in grades {
            by_enrollment.entry(grade.enrollment_id).or_default().push(grade);
        }
    }

    Ok(enrollments
        .into_iter()
        .map(|enrollment| {
            let mut grades = by_enrollment.remove(&enrollment.id).unwrap_or_default();
            grades.sort_by_key(|g| {
                Reverse((
                    g.academic_year.clone(),
                    term_rank(&g.term),
                    g.term.clone(),
                    g.created_at,
                ))
            });
            EnrollmentRecord { enrollment, grades }
        })
        .collect())
}

/// Orders term names chronologically within a year; unknown names sort first.
fn term_rank(term: &str) -> u8 {
    let term = term.to_ascii_lowercase();
    if term.starts_with("first") || term.starts_with("1") {
        1
    } else if term.starts_with("second") || term.starts_with("2") {
        2
    } else if term.starts_with("third") || term.starts_with("3") {
        3
    } else {
        0
    }
}
