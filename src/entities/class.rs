//! Class entity - A named class at a school, matched by name or level on placement.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    /// Unique identifier for the class
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School owning the class
    pub school_id: Uuid,
    /// Class name (e.g. "JSS2 Gold")
    pub name: String,
    /// Class level the class belongs to (e.g. "JSS2")
    pub level: String,
}

/// `Class` has no relationships used by the transfer protocol
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
