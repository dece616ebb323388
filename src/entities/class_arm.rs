//! Class arm entity - A subdivision of a class level with an optional capacity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class arm database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_arms")]
pub struct Model {
    /// Unique identifier for the arm
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School owning the arm
    pub school_id: Uuid,
    /// Parent class level
    pub class_level_id: Uuid,
    /// Arm name (e.g. "A", "Gold")
    pub name: String,
    /// Maximum active enrollments per academic year; `None` means unlimited
    pub capacity: Option<i32>,
}

/// Defines relationships between `ClassArm` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each arm belongs to one class level
    #[sea_orm(
        belongs_to = "super::class_level::Entity",
        from = "Column::ClassLevelId",
        to = "super::class_level::Column::Id"
    )]
    ClassLevel,
}

impl Related<super::class_level::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassLevel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
