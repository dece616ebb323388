//! Grade entity - One assessment result recorded under an enrollment.
//!
//! Copied grades keep their original `created_at`; `teacher_id` always points at
//! a teacher of the school that owns the grade.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Grade database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "grades")]
pub struct Model {
    /// Unique identifier for the grade
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Enrollment the grade was recorded under
    pub enrollment_id: Uuid,
    /// Student the grade belongs to
    pub student_id: Uuid,
    /// School owning the grade
    pub school_id: Uuid,
    /// Attributed teacher at `school_id`
    pub teacher_id: Uuid,
    /// Subject name
    pub subject: String,
    /// Kind of assessment (e.g. "EXAM", "CA")
    pub grade_type: String,
    /// Name of the assessment
    pub assessment_name: String,
    /// Score obtained
    pub score: f64,
    /// Maximum attainable score
    pub max_score: f64,
    /// Letter grade, if assigned
    pub grade: Option<String>,
    /// Term name
    pub term: String,
    /// Academic year
    pub academic_year: String,
    /// Teacher remarks
    pub remarks: Option<String>,
    /// When the grade was originally recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Grade and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each grade belongs to one enrollment
    #[sea_orm(
        belongs_to = "super::enrollment::Entity",
        from = "Column::EnrollmentId",
        to = "super::enrollment::Column::Id"
    )]
    Enrollment,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
