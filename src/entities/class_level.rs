//! Class level entity - A year group at a school (e.g. "JSS2"), parent of class arms.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class level database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_levels")]
pub struct Model {
    /// Unique identifier for the class level
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School owning the level
    pub school_id: Uuid,
    /// Level name, copied onto enrollments placed in one of its arms
    pub name: String,
}

/// Defines relationships between `ClassLevel` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One level has many arms
    #[sea_orm(has_many = "super::class_arm::Entity")]
    ClassArms,
}

impl Related<super::class_arm::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassArms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
