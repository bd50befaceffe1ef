use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Crop listings with their interests embedded as a JSONB array
        manager
            .create_table(
                Table::create()
                    .table(Crops::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Crops::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Crops::Name).text().null())
                    .col(ColumnDef::new(Crops::Description).text().null())
                    .col(
                        ColumnDef::new(Crops::Quantity)
                            .decimal()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Crops::Quantity).gte(0)),
                    )
                    .col(ColumnDef::new(Crops::OwnerEmail).string_len(320).null())
                    .col(ColumnDef::new(Crops::OwnerName).text().null())
                    .col(
                        ColumnDef::new(Crops::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Crops::Interests)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Crops::Attributes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Crops::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Newest-first listing
        manager
            .create_index(
                Index::create()
                    .name("idx_crops_created_at")
                    .table(Crops::Table)
                    .col(Crops::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crops_owner_email")
                    .table(Crops::Table)
                    .col(Crops::OwnerEmail)
                    .to_owned(),
            )
            .await?;

        // Containment lookups for "my interests"
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_crops_interests \
                 ON crops USING GIN (interests jsonb_path_ops)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Crops::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Crops {
    Table,
    Id,
    Name,
    Description,
    Quantity,
    OwnerEmail,
    OwnerName,
    CreatedAt,
    Interests,
    Attributes,
    Version,
}
