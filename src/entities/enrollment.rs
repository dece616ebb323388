//! Enrollment entity - A student's membership in one school for one academic year.
//!
//! Origin enrollments are never deleted; a completed transfer only flips
//! `is_active` to false so the history stays auditable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Enrollment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    /// Unique identifier for the enrollment
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Enrolled student
    pub student_id: Uuid,
    /// School (tenant) owning the enrollment
    pub school_id: Uuid,
    /// Matched class, if any
    pub class_id: Option<Uuid>,
    /// Class arm placement, if any
    pub class_arm_id: Option<Uuid>,
    /// Class level name (e.g. "JSS2")
    pub class_level: String,
    /// Academic year (e.g. "2024/2025")
    pub academic_year: String,
    /// When the student joined
    pub enrollment_date: DateTimeUtc,
    /// Whether this is the student's live enrollment at the school
    pub is_active: bool,
    /// Term the enrollment started in, if one was active
    pub term_id: Option<Uuid>,
    /// Creation timestamp
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Enrollment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each enrollment belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    /// One enrollment has many grades
    #[sea_orm(has_many = "super::grade::Entity")]
    Grades,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::grade::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Grades.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
