//! Migration of a student's record into the destination school.
//!
//! All writes happen on a [`MigrationUnit`], a single database transaction that
//! spans enrollment creation, every grade copy, the profile merge, source
//! deactivation and the transfer finalisation done by the caller. Nothing is
//! visible to other connections until [`MigrationUnit::commit`]; any error
//! before that leaves the store exactly as it was.

use crate::{
    core::{health::HealthProfile, snapshot},
    entities::{
        Class, ClassArm, ClassLevel, Enrollment, Grade, Student, Teacher, Term, class, class_arm,
        enrollment, grade, student, teacher, term, transfer,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    Condition, DatabaseConnection, DatabaseTransaction, IntoActiveModel, PaginatorTrait,
    QueryOrder, Set, TransactionTrait, prelude::*,
};
use tracing::{debug, info, instrument};

/// Placement and year requested by the destination school.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    /// Class level name to record when no class arm is given (e.g. "JSS2")
    pub target_class_level: String,
    /// Academic year of the new enrollment (e.g. "2024/2025")
    pub academic_year: String,
    /// Explicit class at the destination school
    pub class_id: Option<Uuid>,
    /// Class arm at the destination school; its capacity is enforced
    pub class_arm_id: Option<Uuid>,
}

impl MigrationRequest {
    /// Request with only a class level and year.
    #[must_use]
    pub fn new(target_class_level: impl Into<String>, academic_year: impl Into<String>) -> Self {
        Self {
            target_class_level: target_class_level.into(),
            academic_year: academic_year.into(),
            class_id: None,
            class_arm_id: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.academic_year.trim().is_empty() {
            return Err(Error::bad_request("Academic year is required"));
        }
        if self.class_arm_id.is_none() && self.target_class_level.trim().is_empty() {
            return Err(Error::bad_request(
                "Either a target class level or a class arm is required",
            ));
        }
        Ok(())
    }
}

/// What a successful migration wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Enrollment created at the destination school
    pub new_enrollment_id: Uuid,
    /// Number of grade rows copied into it
    pub grades_copied: usize,
    /// Number of origin enrollments switched to inactive
    pub source_enrollments_closed: u64,
    /// Destination term linked to the enrollment, if one was active
    pub term_id: Option<Uuid>,
}

/// Where the new enrollment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    class_id: Option<Uuid>,
    class_arm_id: Option<Uuid>,
    class_level: String,
}

/// Unit of work for one migration: a database transaction that is either
/// committed as a whole or rolled back as a whole.
pub struct MigrationUnit {
    txn: DatabaseTransaction,
}

impl MigrationUnit {
    /// Opens the transaction.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self> {
        let txn = db.begin().await?;
        Ok(Self { txn })
    }

    /// Connection every step of the migration must use.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Makes every write of the unit visible.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await.map_err(Into::into)
    }

    /// Discards every write of the unit.
    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await.map_err(Into::into)
    }
}

/// Moves the origin record of `transfer` into `to_school_id` inside `unit`.
///
/// The caller has already checked that `to_school_id` is the school bound to the
/// transfer and is responsible for finalising the transfer row and committing.
///
/// # Errors
/// * `BadRequest` - invalid request, class arm full, or no teacher at the destination
/// * `NotFound` - class arm or class not at the destination school, student gone
#[instrument(skip(unit, transfer, request), fields(transfer_id = %transfer.id))]
pub async fn migrate(
    unit: &MigrationUnit,
    transfer: &transfer::Model,
    to_school_id: Uuid,
    request: &MigrationRequest,
) -> Result<MigrationOutcome> {
    request.validate()?;
    let db = unit.connection();

    let placement = resolve_placement(db, to_school_id, request).await?;
    let term_id = resolve_active_term(db, to_school_id).await?;
    let new_enrollment =
        create_enrollment(db, transfer.student_id, to_school_id, &placement, request, term_id)
            .await?;

    let source = snapshot::fetch_for_transfer(db, transfer).await?;
    let grades_copied = copy_grades(db, source.current_grades(), &new_enrollment).await?;

    merge_profile(db, &source, to_school_id).await?;
    let source_enrollments_closed =
        deactivate_source(db, transfer.student_id, transfer.from_school_id).await?;

    info!(
        new_enrollment_id = %new_enrollment.id,
        grades_copied,
        source_enrollments_closed,
        "Migrated student record"
    );

    Ok(MigrationOutcome {
        new_enrollment_id: new_enrollment.id,
        grades_copied,
        source_enrollments_closed,
        term_id,
    })
}

async fn resolve_placement<C>(
    db: &C,
    to_school_id: Uuid,
    request: &MigrationRequest,
) -> Result<Placement>
where
    C: ConnectionTrait,
{
    let explicit_class = match request.class_id {
        Some(class_id) => {
            let class = Class::find_by_id(class_id)
                .one(db)
                .await?
                .filter(|c| c.school_id == to_school_id)
                .ok_or_else(|| Error::not_found("class", class_id))?;
            Some(class)
        }
        None => None,
    };

    if let Some(arm_id) = request.class_arm_id {
        let arm = ClassArm::find_by_id(arm_id)
            .one(db)
            .await?
            .filter(|a| a.school_id == to_school_id)
            .ok_or_else(|| Error::not_found("class arm", arm_id))?;

        ensure_arm_has_room(db, &arm, &request.academic_year).await?;

        let level_name = ClassLevel::find_by_id(arm.class_level_id)
            .one(db)
            .await?
            .map_or_else(|| request.target_class_level.trim().to_string(), |level| level.name);

        return Ok(Placement {
            class_id: explicit_class.map(|c| c.id),
            class_arm_id: Some(arm.id),
            class_level: level_name,
        });
    }

    let target = request.target_class_level.trim();
    let class_id = match explicit_class {
        Some(class) => Some(class.id),
        None => find_matching_class(db, to_school_id, target).await?.map(|c| c.id),
    };
    if class_id.is_none() {
        debug!(target, "No matching class at destination, recording level only");
    }

    Ok(Placement {
        class_id,
        class_arm_id: None,
        class_level: target.to_string(),
    })
}

/// Counts active enrollments of the arm for the year against its capacity.
///
/// The count is not locked; two completions racing into the last seat can both
/// pass.
async fn ensure_arm_has_room<C>(db: &C, arm: &class_arm::Model, academic_year: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(capacity) = arm.capacity else {
        return Ok(());
    };
    let occupied = Enrollment::find()
        .filter(enrollment::Column::ClassArmId.eq(arm.id))
        .filter(enrollment::Column::AcademicYear.eq(academic_year))
        .filter(enrollment::Column::IsActive.eq(true))
        .count(db)
        .await?;

    if occupied >= u64::try_from(capacity.max(0)).unwrap_or_default() {
        return Err(Error::bad_request(format!(
            "Class arm {} is full ({occupied}/{capacity})",
            arm.name
        )));
    }
    Ok(())
}

async fn find_matching_class<C>(
    db: &C,
    school_id: Uuid,
    target: &str,
) -> Result<Option<class::Model>>
where
    C: ConnectionTrait,
{
    if target.is_empty() {
        return Ok(None);
    }
    Class::find()
        .filter(class::Column::SchoolId.eq(school_id))
        .filter(
            Condition::any()
                .add(class::Column::Name.eq(target))
                .add(class::Column::Level.eq(target)),
        )
        .order_by_asc(class::Column::Name)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn resolve_active_term<C>(db: &C, school_id: Uuid) -> Result<Option<Uuid>>
where
    C: ConnectionTrait,
{
    let term = Term::find()
        .filter(term::Column::SchoolId.eq(school_id))
        .filter(term::Column::IsActive.eq(true))
        .one(db)
        .await?;
    Ok(term.map(|t| t.id))
}

async fn create_enrollment<C>(
    db: &C,
    student_id: Uuid,
    school_id: Uuid,
    placement: &Placement,
    request: &MigrationRequest,
    term_id: Option<Uuid>,
) -> Result<enrollment::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let model = enrollment::ActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(student_id),
        school_id: Set(school_id),
        class_id: Set(placement.class_id),
        class_arm_id: Set(placement.class_arm_id),
        class_level: Set(placement.class_level.clone()),
        academic_year: Set(request.academic_year.trim().to_string()),
        enrollment_date: Set(now),
        is_active: Set(true),
        term_id: Set(term_id),
        created_at: Set(now),
    };
    model.insert(db).await.map_err(Into::into)
}

/// Picks the teacher copied grades are attributed to.
async fn attribution_teacher<C>(db: &C, school_id: Uuid) -> Result<teacher::Model>
where
    C: ConnectionTrait,
{
    Teacher::find()
        .filter(teacher::Column::SchoolId.eq(school_id))
        .order_by_asc(teacher::Column::CreatedAt)
        .one(db)
        .await?
        .ok_or_else(|| {
            Error::bad_request("No teacher found at the destination school to attribute grades to")
        })
}

/// Copies grades into `target`, preserving everything but ownership.
async fn copy_grades<C>(
    db: &C,
    source: &[grade::Model],
    target: &enrollment::Model,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    if source.is_empty() {
        return Ok(0);
    }
    let teacher = attribution_teacher(db, target.school_id).await?;

    for original in source {
        let copy = grade::ActiveModel {
            id: Set(Uuid::new_v4()),
            enrollment_id: Set(target.id),
            student_id: Set(original.student_id),
            school_id: Set(target.school_id),
            teacher_id: Set(teacher.id),
            subject: Set(original.subject.clone()),
            grade_type: Set(original.grade_type.clone()),
            assessment_name: Set(original.assessment_name.clone()),
            score: Set(original.score),
            max_score: Set(original.max_score),
            grade: Set(original.grade.clone()),
            term: Set(original.term.clone()),
            academic_year: Set(original.academic_year.clone()),
            remarks: Set(original.remarks.clone()),
            created_at: Set(original.created_at),
        };
        Grade::insert(copy).exec(db).await?;
    }
    Ok(source.len())
}

/// Moves the shared student row to `to_school_id`.
///
/// The snapshot and the destination profile are the same `students` row, so the
/// merge leaves every stored value in place and never writes a blank or missing
/// snapshot field over a filled one.
async fn merge_profile<C>(
    db: &C,
    source: &snapshot::StudentTransferSnapshot,
    to_school_id: Uuid,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let current = Student::find_by_id(source.student.id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("student", source.student.id))?;

    let merged = HealthProfile::from(&current).merged_with(&source.health());
    let mut active: student::ActiveModel = current.into_active_model();
    merged.apply_to(&mut active);
    active.school_id = Set(to_school_id);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

async fn deactivate_source<C>(db: &C, student_id: Uuid, from_school_id: Uuid) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Enrollment::update_many()
        .set(enrollment::ActiveModel {
            is_active: Set(false),
            ..Default::default()
        })
        .filter(enrollment::Column::StudentId.eq(student_id))
        .filter(enrollment::Column::SchoolId.eq(from_school_id))
        .filter(enrollment::Column::IsActive.eq(true))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_request_validation() {
        let blank_year = MigrationRequest::new("JSS2", " ");
        assert!(matches!(blank_year.validate(), Err(Error::BadRequest { .. })));

        let nothing = MigrationRequest::new("", "2024/2025");
        assert!(matches!(nothing.validate(), Err(Error::BadRequest { .. })));

        let arm_only = MigrationRequest {
            class_arm_id: Some(Uuid::new_v4()),
            ..MigrationRequest::new("", "2024/2025")
        };
        assert!(arm_only.validate().is_ok());
    }

    #[tokio::test]
    async fn test_placement_uses_arm_level_name() -> Result<()> {
        let fx = setup_school_pair().await?;
        let (_level, arm) = create_test_class_arm(
            &fx.db,
            fx.school_b,
            "JSS2",
            "Gold",
            Some(30),
        )
        .await?;

        let request = MigrationRequest {
            class_arm_id: Some(arm.id),
            ..MigrationRequest::new("ignored", "2024/2025")
        };
        let placement = resolve_placement(&fx.db, fx.school_b, &request).await?;
        assert_eq!(placement.class_arm_id, Some(arm.id));
        assert_eq!(placement.class_level, "JSS2");
        Ok(())
    }

    #[tokio::test]
    async fn test_placement_rejects_foreign_arm() -> Result<()> {
        let fx = setup_school_pair().await?;
        let (_level, arm) = create_test_class_arm(&fx.db, fx.school_a, "JSS2", "A", None).await?;

        let request = MigrationRequest {
            class_arm_id: Some(arm.id),
            ..MigrationRequest::new("JSS2", "2024/2025")
        };
        let result = resolve_placement(&fx.db, fx.school_b, &request).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_full_arm_is_rejected() -> Result<()> {
        let fx = setup_school_pair().await?;
        let (_level, arm) = create_test_class_arm(&fx.db, fx.school_b, "JSS2", "A", Some(1)).await?;
        let other = create_test_student(&fx.db, fx.school_b, "Chidi", "Okeke").await?;
        let mut seated =
            create_test_enrollment(&fx.db, other.id, fx.school_b, "JSS2", "2024/2025", true).await?
                .into_active_model();
        seated.class_arm_id = Set(Some(arm.id));
        seated.update(&fx.db).await?;

        let request = MigrationRequest {
            class_arm_id: Some(arm.id),
            ..MigrationRequest::new("JSS2", "2024/2025")
        };
        let result = resolve_placement(&fx.db, fx.school_b, &request).await;
        assert!(matches!(result, Err(Error::BadRequest { .. })));

        // A different year has its own seats
        let next_year = MigrationRequest {
            class_arm_id: Some(arm.id),
            ..MigrationRequest::new("JSS2", "2025/2026")
        };
        assert!(resolve_placement(&fx.db, fx.school_b, &next_year).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_best_effort_class_match() -> Result<()> {
        let fx = setup_school_pair().await?;
        let class = create_test_class(&fx.db, fx.school_b, "JSS2 Gold", "JSS2").await?;

        let matched = resolve_placement(
            &fx.db,
            fx.school_b,
            &MigrationRequest::new("JSS2", "2024/2025"),
        )
        .await?;
        assert_eq!(matched.class_id, Some(class.id));

        let unmatched = resolve_placement(
            &fx.db,
            fx.school_b,
            &MigrationRequest::new("SSS1", "2024/2025"),
        )
        .await?;
        assert_eq!(unmatched.class_id, None);
        assert_eq!(unmatched.class_level, "SSS1");
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_class_must_belong_to_destination() -> Result<()> {
        let fx = setup_school_pair().await?;
        let foreign = create_test_class(&fx.db, fx.school_a, "JSS2 Blue", "JSS2").await?;

        let request = MigrationRequest {
            class_id: Some(foreign.id),
            ..MigrationRequest::new("JSS2", "2024/2025")
        };
        let result = resolve_placement(&fx.db, fx.school_b, &request).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_active_term_is_optional() -> Result<()> {
        let fx = setup_school_pair().await?;
        assert_eq!(resolve_active_term(&fx.db, fx.school_b).await?, None);

        create_test_term(&fx.db, fx.school_b, "First Term", "2024/2025", false).await?;
        let active = create_test_term(&fx.db, fx.school_b, "Second Term", "2024/2025", true).await?;
        assert_eq!(resolve_active_term(&fx.db, fx.school_b).await?, Some(active.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_keeps_profile_and_moves_school() -> Result<()> {
        let fx = setup_school_pair().await?;
        let mut profile = fx.student.clone().into_active_model();
        profile.medications = Set(Some("  ".to_string()));
        profile.emergency_contact_phone = Set(Some("+2348012345678".to_string()));
        profile.update(&fx.db).await?;

        let transfer_id = approved_transfer(&fx).await?;
        crate::core::transfer::complete(
            &fx.db,
            fx.school_b,
            transfer_id,
            &MigrationRequest::new("JSS2", "2024/2025"),
        )
        .await?;

        let moved = Student::find_by_id(fx.student.id).one(&fx.db).await?.unwrap();
        assert_eq!(moved.school_id, fx.school_b);
        assert_eq!(moved.blood_group.as_deref(), Some("O+"));
        assert_eq!(moved.allergies.as_deref(), Some("Peanuts"));
        assert_eq!(moved.medications.as_deref(), Some("  "));
        assert_eq!(moved.emergency_contact_name.as_deref(), Some("Ifeoma Nwosu"));
        assert_eq!(moved.emergency_contact_phone.as_deref(), Some("+2348012345678"));
        assert!(moved.updated_at >= fx.student.updated_at);
        Ok(())
    }
}
