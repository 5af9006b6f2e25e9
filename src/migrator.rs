use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_items_table::Migration),
            Box::new(m20240601_000002_create_custody_transfers_table::Migration),
            Box::new(m20240601_000003_create_incidents_table::Migration),
        ]
    }
}

mod m20240601_000001_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::ActivityId).uuid().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(ColumnDef::new(Items::Description).string().null())
                        .col(ColumnDef::new(Items::Category).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Items::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Items::Code).string_len(16).null())
                        .col(
                            ColumnDef::new(Items::OwnershipType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Items::LenderName).string().null())
                        .col(ColumnDef::new(Items::LenderContact).string().null())
                        .col(ColumnDef::new(Items::AssignedTo).string().null())
                        .col(
                            ColumnDef::new(Items::AssignmentType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Items::CurrentHolder).string().null())
                        .col(ColumnDef::new(Items::State).string_len(20).not_null())
                        .col(ColumnDef::new(Items::Condition).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Items::Returned)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Items::ReturnedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Items::Observations).text().null())
                        .col(
                            ColumnDef::new(Items::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_activity_id")
                        .table(Items::Table)
                        .col(Items::ActivityId)
                        .to_owned(),
                )
                .await?;

            // NULL codes never collide, so uncoded records are unaffected.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_activity_code")
                        .table(Items::Table)
                        .col(Items::ActivityId)
                        .col(Items::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Items {
        Table,
        Id,
        ActivityId,
        Name,
        Description,
        Category,
        Quantity,
        Code,
        OwnershipType,
        LenderName,
        LenderContact,
        AssignedTo,
        AssignmentType,
        CurrentHolder,
        State,
        Condition,
        Returned,
        ReturnedAt,
        Observations,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_custody_transfers_table {

    use super::m20240601_000001_create_items_table::Items;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_custody_transfers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CustodyTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustodyTransfers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustodyTransfers::ItemId).uuid().not_null())
                        .col(ColumnDef::new(CustodyTransfers::PreviousHolder).string().null())
                        .col(ColumnDef::new(CustodyTransfers::NewHolder).string().not_null())
                        .col(
                            ColumnDef::new(CustodyTransfers::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustodyTransfers::Sequence).integer().not_null())
                        .col(ColumnDef::new(CustodyTransfers::Note).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_custody_transfers_item_id")
                                .from(CustodyTransfers::Table, CustodyTransfers::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Two writers racing past the version check still cannot share a sequence.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_custody_transfers_item_sequence")
                        .table(CustodyTransfers::Table)
                        .col(CustodyTransfers::ItemId)
                        .col(CustodyTransfers::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustodyTransfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CustodyTransfers {
        Table,
        Id,
        ItemId,
        PreviousHolder,
        NewHolder,
        Timestamp,
        Sequence,
        Note,
    }
}

mod m20240601_000003_create_incidents_table {

    use super::m20240601_000001_create_items_table::Items;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_incidents_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Incidents::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Incidents::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Incidents::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Incidents::Kind).string_len(20).not_null())
                        .col(ColumnDef::new(Incidents::Description).text().not_null())
                        .col(
                            ColumnDef::new(Incidents::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_incidents_item_id")
                                .from(Incidents::Table, Incidents::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_incidents_item_id")
                        .table(Incidents::Table)
                        .col(Incidents::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Incidents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Incidents {
        Table,
        Id,
        ItemId,
        Kind,
        Description,
        Timestamp,
    }
}
