//! Teacher entity - Staff member of a school, referenced by grades.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Teacher database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teachers")]
pub struct Model {
    /// Unique identifier for the teacher
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School employing the teacher
    pub school_id: Uuid,
    /// Display name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTimeUtc,
}

/// `Teacher` has no relationships used by the transfer protocol
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
