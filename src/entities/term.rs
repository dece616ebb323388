//! Term entity - An academic term; at most one per school is expected to be active.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Term database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "terms")]
pub struct Model {
    /// Unique identifier for the term
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// School owning the term
    pub school_id: Uuid,
    /// Term name (e.g. "First Term")
    pub name: String,
    /// Academic year the term belongs to
    pub academic_year: String,
    /// Whether this is the school's current term
    pub is_active: bool,
}

/// `Term` has no relationships used by the transfer protocol
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
