//! SeaORM Entity for crop listings
//!
//! Interests are embedded as a JSONB array so a submission is a single-row
//! append. Owner-supplied fields without a dedicated column live in
//! `attributes`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "crops")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Available quantity, never negative
    #[sea_orm(column_type = "Decimal(None)")]
    pub quantity: Decimal,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    /// Interest records as a JSON array, in submission order
    #[sea_orm(column_type = "JsonBinary")]
    pub interests: Json,
    /// Remaining owner-supplied fields as a JSON object
    #[sea_orm(column_type = "JsonBinary")]
    pub attributes: Json,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
