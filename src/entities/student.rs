//! Student entity - The shared identity of a learner across schools.
//!
//! The profile carries the medical fields merged during a transfer and the id of
//! the school that currently owns it. Enrollments and grades hang off the student
//! per school.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Unique identifier for the student
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School that currently owns the profile
    pub school_id: Uuid,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Date of birth, if recorded
    pub date_of_birth: Option<Date>,
    /// Blood group (e.g. "O+")
    pub blood_group: Option<String>,
    /// Known allergies
    pub allergies: Option<String>,
    /// Current medications
    pub medications: Option<String>,
    /// Emergency contact name
    pub emergency_contact_name: Option<String>,
    /// Emergency contact phone number
    pub emergency_contact_phone: Option<String>,
    /// Relationship of the emergency contact to the student
    pub emergency_contact_relationship: Option<String>,
    /// Free-form medical notes
    pub medical_notes: Option<String>,
    /// Creation timestamp
    pub created_at: DateTimeUtc,
    /// Last modification timestamp
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Student and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One student has many enrollments
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
    /// One student can be the subject of many transfers
    #[sea_orm(has_many = "super::transfer::Entity")]
    Transfers,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
