//! Postgres-backed crop store
//!
//! Each listing is one row of `crops`. Interest submissions append to the
//! JSONB `interests` column inside a single UPDATE, and decisions write
//! back only when `version` still matches what was read.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Set, Statement, Value,
};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::entities::crops::{self, Entity as Crops};
use crate::models::crop::{CropListing, CropPatch, Interest, Owner};
use crate::services::crop_store::{CropStore, StoreError, UpdateOutcome};

#[derive(Clone)]
pub struct PgCropStore {
    db: DatabaseConnection,
}

impl PgCropStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn fetch_returning(&self, stmt: Statement) -> Result<Option<CropListing>, StoreError> {
        Crops::find()
            .from_raw_sql(stmt)
            .one(&self.db)
            .await?
            .map(into_listing)
            .transpose()
    }
}

/// Row -> listing
fn into_listing(model: crops::Model) -> Result<CropListing, StoreError> {
    let interests: Vec<Interest> =
        serde_json::from_value(model.interests).map_err(|e| StoreError::Corrupt {
            id: model.id,
            message: format!("interests: {}", e),
        })?;

    let attributes = match model.attributes {
        JsonValue::Object(map) => map,
        JsonValue::Null => Default::default(),
        other => {
            return Err(StoreError::Corrupt {
                id: model.id,
                message: format!("attributes is not an object: {}", other),
            });
        }
    };

    let owner = match (model.owner_email, model.owner_name) {
        (Some(owner_email), Some(owner_name)) => Some(Owner {
            owner_email,
            owner_name,
        }),
        _ => None,
    };

    Ok(CropListing {
        id: model.id,
        name: model.name,
        description: model.description,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
        owner,
        interests,
        version: model.version,
        attributes,
    })
}

fn into_rows(models: Vec<crops::Model>) -> Result<Vec<CropListing>, StoreError> {
    models.into_iter().map(into_listing).collect()
}

#[async_trait]
impl CropStore for PgCropStore {
    async fn find_all(&self) -> Result<Vec<CropListing>, StoreError> {
        let rows = Crops::find()
            .order_by(crops::Column::CreatedAt, Order::Asc)
            .order_by(crops::Column::Id, Order::Asc)
            .all(&self.db)
            .await?;
        into_rows(rows)
    }

    async fn find_latest(&self, limit: u64) -> Result<Vec<CropListing>, StoreError> {
        let rows = Crops::find()
            .order_by(crops::Column::CreatedAt, Order::Desc)
            .order_by(crops::Column::Id, Order::Desc)
            .limit(limit)
            .all(&self.db)
            .await?;
        into_rows(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CropListing>, StoreError> {
        Crops::find_by_id(id)
            .one(&self.db)
            .await?
            .map(into_listing)
            .transpose()
    }

    async fn find_by_owner(&self, email: Option<&str>) -> Result<Vec<CropListing>, StoreError> {
        let mut query = Crops::find();
        if let Some(email) = email {
            query = query.filter(crops::Column::OwnerEmail.eq(email));
        }
        let rows = query
            .order_by(crops::Column::CreatedAt, Order::Asc)
            .order_by(crops::Column::Id, Order::Asc)
            .all(&self.db)
            .await?;
        into_rows(rows)
    }

    async fn find_with_interests_from(&self, email: &str) -> Result<Vec<CropListing>, StoreError> {
        let needle = serde_json::json!([{ "userEmail": email }]);
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT * FROM crops
            WHERE interests @> $1::jsonb
            ORDER BY created_at ASC, id ASC
            "#,
            [Value::Json(Some(Box::new(needle)))],
        );
        let rows = Crops::find().from_raw_sql(stmt).all(&self.db).await?;
        into_rows(rows)
    }

    async fn insert(&self, listing: CropListing) -> Result<Uuid, StoreError> {
        let (owner_email, owner_name) = match listing.owner {
            Some(owner) => (Some(owner.owner_email), Some(owner.owner_name)),
            None => (None, None),
        };

        let row = crops::ActiveModel {
            id: Set(listing.id),
            name: Set(listing.name),
            description: Set(listing.description),
            quantity: Set(listing.quantity),
            owner_email: Set(owner_email),
            owner_name: Set(owner_name),
            created_at: Set(listing.created_at.into()),
            interests: Set(serde_json::to_value(&listing.interests)?),
            attributes: Set(JsonValue::Object(listing.attributes)),
            version: Set(listing.version),
        };
        let inserted = row.insert(&self.db).await?;
        debug!(crop_id = %inserted.id, "Inserted crop listing");
        Ok(inserted.id)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &CropPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut assignments = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut changed = Vec::new();

        if let Some(name) = &patch.name {
            values.push(name.clone().into());
            assignments.push(format!("name = ${}", values.len()));
            changed.push(format!("name IS DISTINCT FROM ${}", values.len()));
        }
        if let Some(description) = &patch.description {
            values.push(description.clone().into());
            assignments.push(format!("description = ${}", values.len()));
            changed.push(format!("description IS DISTINCT FROM ${}", values.len()));
        }
        if let Some(quantity) = patch.quantity {
            values.push(quantity.into());
            assignments.push(format!("quantity = ${}", values.len()));
            changed.push(format!("quantity IS DISTINCT FROM ${}", values.len()));
        }
        if !patch.attributes.is_empty() {
            let attributes = JsonValue::Object(patch.attributes.clone());
            values.push(Value::Json(Some(Box::new(attributes))));
            assignments.push(format!("attributes = attributes || ${}::jsonb", values.len()));
            // Key-wise equality; containment would miss narrowed arrays and objects
            changed.push(format!(
                "attributes IS DISTINCT FROM attributes || ${}::jsonb",
                values.len()
            ));
        }

        if assignments.is_empty() {
            let matched = Crops::find_by_id(id).one(&self.db).await?.is_some();
            return Ok(UpdateOutcome {
                matched: u64::from(matched),
                modified: 0,
            });
        }

        // Only rows that actually differ count as modified
        values.push(id.into());
        let id_param = values.len();
        let sql = format!(
            "UPDATE crops SET {}, version = version + 1 WHERE id = ${} AND ({})",
            assignments.join(", "),
            id_param,
            changed.join(" OR "),
        );
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                values,
            ))
            .await?;

        let modified = result.rows_affected();
        let matched = if modified > 0 {
            modified
        } else {
            u64::from(Crops::find_by_id(id).one(&self.db).await?.is_some())
        };
        Ok(UpdateOutcome { matched, modified })
    }

    async fn delete(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = Crops::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    async fn append_interest(
        &self,
        id: Uuid,
        interest: &Interest,
    ) -> Result<Option<CropListing>, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            UPDATE crops
            SET interests = interests || jsonb_build_array($1::jsonb),
                version = version + 1
            WHERE id = $2
            RETURNING *
            "#,
            [
                Value::Json(Some(Box::new(serde_json::to_value(interest)?))),
                id.into(),
            ],
        );
        self.fetch_returning(stmt).await
    }

    async fn write_decision(
        &self,
        id: Uuid,
        expected_version: i64,
        interests: &[Interest],
        quantity: Decimal,
    ) -> Result<Option<CropListing>, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            UPDATE crops
            SET interests = $1::jsonb,
                quantity = $2,
                version = version + 1
            WHERE id = $3 AND version = $4
            RETURNING *
            "#,
            [
                Value::Json(Some(Box::new(serde_json::to_value(interests)?))),
                quantity.into(),
                id.into(),
                expected_version.into(),
            ],
        );
        self.fetch_returning(stmt).await
    }
}
