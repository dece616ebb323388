//! Shared test utilities for the transfer crate.
//!
//! This module provides helpers for setting up an in-memory database with a
//! couple of schools and creating records with sensible defaults.

use crate::{
    config::transfer::TransferConfig,
    core::{tac, transfer as transfer_core},
    entities::{self, Transfer, TransferStatus, transfer},
    errors::Result,
};
use chrono::{Duration, Utc};
use sea_orm::{DatabaseConnection, IntoActiveModel, Set, prelude::*};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Configuration used by tests: the built-in defaults.
#[must_use]
pub fn test_config() -> TransferConfig {
    TransferConfig::default()
}

/// Two schools with a student enrolled at the first one, plus a third school
/// without any teacher.
pub struct SchoolPair {
    /// Database connection
    pub db: DatabaseConnection,
    /// Origin school
    pub school_a: Uuid,
    /// Destination school
    pub school_b: Uuid,
    /// A school with no staff
    pub school_c: Uuid,
    /// Staff user at school A
    pub user_a: Uuid,
    /// Student enrolled at school A
    pub student: entities::student::Model,
    /// Teacher at school A
    pub teacher_a: entities::teacher::Model,
    /// Teacher at school B
    pub teacher_b: entities::teacher::Model,
    /// The student's active JSS1 enrollment at school A for 2024/2025
    pub enrollment_a: entities::enrollment::Model,
}

/// Sets up a complete two-school environment.
///
/// # Defaults
/// * student: "Amaka Nwosu", blood group "O+", allergies "Peanuts"
/// * `enrollment_a`: JSS1, 2024/2025, active
pub async fn setup_school_pair() -> Result<SchoolPair> {
    let db = setup_test_db().await?;
    let school_a = Uuid::new_v4();
    let school_b = Uuid::new_v4();
    let school_c = Uuid::new_v4();

    let mut student = create_test_student(&db, school_a, "Amaka", "Nwosu")
        .await?
        .into_active_model();
    student.blood_group = Set(Some("O+".to_string()));
    student.allergies = Set(Some("Peanuts".to_string()));
    student.emergency_contact_name = Set(Some("Ifeoma Nwosu".to_string()));
    let student = student.update(&db).await?;

    let teacher_a = create_test_teacher(&db, school_a, "Mr. Adeyemi").await?;
    let teacher_b = create_test_teacher(&db, school_b, "Mrs. Okafor").await?;
    let enrollment_a =
        create_test_enrollment(&db, student.id, school_a, "JSS1", "2024/2025", true).await?;

    Ok(SchoolPair {
        db,
        school_a,
        school_b,
        school_c,
        user_a: Uuid::new_v4(),
        student,
        teacher_a,
        teacher_b,
        enrollment_a,
    })
}

/// Creates a student with no medical details.
pub async fn create_test_student(
    db: &DatabaseConnection,
    school_id: Uuid,
    first_name: &str,
    last_name: &str,
) -> Result<entities::student::Model> {
    let now = Utc::now();
    let student = entities::student::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        date_of_birth: Set(None),
        blood_group: Set(None),
        allergies: Set(None),
        medications: Set(None),
        emergency_contact_name: Set(None),
        emergency_contact_phone: Set(None),
        emergency_contact_relationship: Set(None),
        medical_notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(student.insert(db).await?)
}

/// Creates a teacher.
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    school_id: Uuid,
    name: &str,
) -> Result<entities::teacher::Model> {
    let teacher = entities::teacher::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
    };
    Ok(teacher.insert(db).await?)
}

/// Creates an enrollment without class placement.
pub async fn create_test_enrollment(
    db: &DatabaseConnection,
    student_id: Uuid,
    school_id: Uuid,
    class_level: &str,
    academic_year: &str,
    is_active: bool,
) -> Result<entities::enrollment::Model> {
    let now = Utc::now();
    let enrollment = entities::enrollment::ActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(student_id),
        school_id: Set(school_id),
        class_id: Set(None),
        class_arm_id: Set(None),
        class_level: Set(class_level.to_string()),
        academic_year: Set(academic_year.to_string()),
        enrollment_date: Set(now),
        is_active: Set(is_active),
        term_id: Set(None),
        created_at: Set(now),
    };
    Ok(enrollment.insert(db).await?)
}

/// Creates `count` quiz grades named "Quiz 1".."Quiz n" under `enrollment`.
///
/// Each grade is backdated by its index in hours so ordering is deterministic.
pub async fn create_test_grades(
    db: &DatabaseConnection,
    enrollment: &entities::enrollment::Model,
    teacher_id: Uuid,
    count: usize,
) -> Result<Vec<entities::grade::Model>> {
    let base = Utc::now() - Duration::days(30);
    let mut grades = Vec::with_capacity(count);
    for i in 1..=count {
        let hours = i64::try_from(i).unwrap_or_default();
        let grade = entities::grade::ActiveModel {
            id: Set(Uuid::new_v4()),
            enrollment_id: Set(enrollment.id),
            student_id: Set(enrollment.student_id),
            school_id: Set(enrollment.school_id),
            teacher_id: Set(teacher_id),
            subject: Set(if i % 2 == 0 { "Mathematics" } else { "English" }.to_string()),
            grade_type: Set("quiz".to_string()),
            assessment_name: Set(format!("Quiz {i}")),
            score: Set(50.0 + hours as f64),
            max_score: Set(100.0),
            grade: Set(Some("C".to_string())),
            term: Set("First Term".to_string()),
            academic_year: Set(enrollment.academic_year.clone()),
            remarks: Set(None),
            created_at: Set(base + Duration::hours(hours)),
        };
        grades.push(grade.insert(db).await?);
    }
    Ok(grades)
}

/// Creates a class.
pub async fn create_test_class(
    db: &DatabaseConnection,
    school_id: Uuid,
    name: &str,
    level: &str,
) -> Result<entities::class::Model> {
    let class = entities::class::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        name: Set(name.to_string()),
        level: Set(level.to_string()),
    };
    Ok(class.insert(db).await?)
}

/// Creates a class level and one arm under it.
pub async fn create_test_class_arm(
    db: &DatabaseConnection,
    school_id: Uuid,
    level_name: &str,
    arm_name: &str,
    capacity: Option<i32>,
) -> Result<(entities::class_level::Model, entities::class_arm::Model)> {
    let level = entities::class_level::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        name: Set(level_name.to_string()),
    }
    .insert(db)
    .await?;

    let arm = entities::class_arm::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        class_level_id: Set(level.id),
        name: Set(arm_name.to_string()),
        capacity: Set(capacity),
    }
    .insert(db)
    .await?;

    Ok((level, arm))
}

/// Creates a term.
pub async fn create_test_term(
    db: &DatabaseConnection,
    school_id: Uuid,
    name: &str,
    academic_year: &str,
    is_active: bool,
) -> Result<entities::term::Model> {
    let term = entities::term::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        name: Set(name.to_string()),
        academic_year: Set(academic_year.to_string()),
        is_active: Set(is_active),
    };
    Ok(term.insert(db).await?)
}

/// School A issues (or returns the live) TAC for the fixture student.
pub async fn issue_tac(fx: &SchoolPair) -> Result<transfer_core::IssuedTac> {
    transfer_core::request_tac(
        &fx.db,
        &test_config(),
        fx.school_a,
        fx.user_a,
        fx.student.id,
        None,
    )
    .await
}

/// Issues a TAC for the fixture student and claims it for school B.
/// Returns the transfer id.
pub async fn approved_transfer(fx: &SchoolPair) -> Result<Uuid> {
    let issued = issue_tac(fx).await?;
    transfer_core::initiate(&fx.db, &test_config(), fx.school_b, &issued.tac, fx.student.id)
        .await?;
    Ok(issued.transfer_id)
}

/// Moves a transfer's TAC window into the past.
pub async fn expire_transfer(db: &DatabaseConnection, transfer_id: Uuid) -> Result<()> {
    let now = Utc::now();
    Transfer::update_many()
        .set(transfer::ActiveModel {
            tac_generated_at: Set(Some(now - Duration::days(31))),
            tac_expires_at: Set(Some(now - Duration::days(1))),
            ..Default::default()
        })
        .filter(transfer::Column::Id.eq(transfer_id))
        .exec(db)
        .await?;
    Ok(())
}

/// An unsaved PENDING transfer with a live TAC.
#[must_use]
pub fn sample_transfer(student_id: Uuid, from_school_id: Uuid) -> transfer::Model {
    let now = Utc::now();
    transfer::Model {
        id: Uuid::new_v4(),
        student_id,
        from_school_id,
        to_school_id: None,
        class_level: Some("JSS1".to_string()),
        tac: Some(tac::generate_tac("TAC", &mut rand::rngs::OsRng)),
        tac_generated_at: Some(now),
        tac_expires_at: Some(now + Duration::days(30)),
        tac_used_at: None,
        tac_used_by: None,
        status: TransferStatus::Pending,
        reason: None,
        requested_by: Uuid::new_v4(),
        approved_at: None,
        rejected_at: None,
        rejection_reason: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Makes the store refuse every grade insert with the given assessment name.
pub async fn fail_grade_inserts_named(
    db: &DatabaseConnection,
    assessment_name: &str,
) -> Result<()> {
    let name = assessment_name.replace('\'', "''");
    db.execute_unprepared(&format!(
        "CREATE TRIGGER fail_grade_insert BEFORE INSERT ON grades \
         WHEN NEW.assessment_name = '{name}' \
         BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END;"
    ))
    .await?;
    Ok(())
}

/// Removes the trigger installed by [`fail_grade_inserts_named`].
pub async fn clear_grade_insert_failures(db: &DatabaseConnection) -> Result<()> {
    db.execute_unprepared("DROP TRIGGER IF EXISTS fail_grade_insert;")
        .await?;
    Ok(())
}
