use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_branches_table::Migration),
            Box::new(m20250101_000003_create_drivers_table::Migration),
            Box::new(m20250101_000004_create_products_table::Migration),
            Box::new(m20250101_000005_create_movements_table::Migration),
        ]
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    PasswordHash,
    Profile,
    Status,
    Avatar,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Branches {
    Table,
    Id,
    UserId,
    Document,
    Street,
    Number,
    Neighborhood,
    City,
    State,
    Complement,
    ZipCode,
    Latitude,
    Longitude,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Drivers {
    Table,
    Id,
    UserId,
    Document,
    Street,
    Number,
    Neighborhood,
    City,
    State,
    Complement,
    ZipCode,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Products {
    Table,
    Id,
    BranchId,
    Name,
    Description,
    Quantity,
    Avatar,
    UrlCover,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Movements {
    Table,
    Id,
    ProductId,
    DestinationBranchId,
    DriverId,
    Quantity,
    Status,
    CreatedAt,
    UpdatedAt,
}

mod m20250101_000001_create_users_table {
    use super::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Users::Name).string_len(240).not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Profile).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Users::Status)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::Avatar).binary().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_users_profile")
                        .table(Users::Table)
                        .col(Users::Profile)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_branches_table {
    use super::{Branches, Users};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_branches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Branches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Branches::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Branches::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Branches::Document).string_len(30).not_null())
                        .col(ColumnDef::new(Branches::Street).string_len(100).not_null())
                        .col(ColumnDef::new(Branches::Number).string_len(10).not_null())
                        .col(
                            ColumnDef::new(Branches::Neighborhood)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Branches::City).string_len(100).not_null())
                        .col(ColumnDef::new(Branches::State).string_len(50).not_null())
                        .col(ColumnDef::new(Branches::Complement).string_len(100).null())
                        .col(ColumnDef::new(Branches::ZipCode).string_len(20).not_null())
                        .col(ColumnDef::new(Branches::Latitude).double().null())
                        .col(ColumnDef::new(Branches::Longitude).double().null())
                        .col(
                            ColumnDef::new(Branches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Branches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_branches_user_id")
                                .from(Branches::Table, Branches::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000003_create_drivers_table {
    use super::{Drivers, Users};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_drivers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Drivers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Drivers::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Drivers::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Drivers::Document).string_len(30).not_null())
                        .col(ColumnDef::new(Drivers::Street).string_len(100).not_null())
                        .col(ColumnDef::new(Drivers::Number).string_len(10).not_null())
                        .col(
                            ColumnDef::new(Drivers::Neighborhood)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Drivers::City).string_len(100).not_null())
                        .col(ColumnDef::new(Drivers::State).string_len(50).not_null())
                        .col(ColumnDef::new(Drivers::Complement).string_len(100).null())
                        .col(ColumnDef::new(Drivers::ZipCode).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Drivers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Drivers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_drivers_user_id")
                                .from(Drivers::Table, Drivers::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Drivers::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000004_create_products_table {
    use super::{Branches, Products};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Products::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(200).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Products::Quantity).gte(0)),
                        )
                        .col(ColumnDef::new(Products::Avatar).binary().null())
                        .col(ColumnDef::new(Products::UrlCover).string().null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_branch_id")
                                .from(Products::Table, Products::BranchId)
                                .to(Branches::Table, Branches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_branch_created")
                        .table(Products::Table)
                        .col(Products::BranchId)
                        .col(Products::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000005_create_movements_table {
    use super::{Branches, Drivers, Movements, Products};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movements::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Movements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(Movements::DestinationBranchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::DriverId).uuid().null())
                        .col(
                            ColumnDef::new(Movements::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(Movements::Quantity).gt(0)),
                        )
                        .col(ColumnDef::new(Movements::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Movements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Movements::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_product_id")
                                .from(Movements::Table, Movements::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_destination_branch_id")
                                .from(Movements::Table, Movements::DestinationBranchId)
                                .to(Branches::Table, Branches::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_driver_id")
                                .from(Movements::Table, Movements::DriverId)
                                .to(Drivers::Table, Drivers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_movements_status_created")
                        .table(Movements::Table)
                        .col(Movements::Status)
                        .col(Movements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_movements_destination")
                        .table(Movements::Table)
                        .col(Movements::DestinationBranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};

    #[tokio::test]
    async fn every_migration_applies_once_on_a_fresh_database() {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let applied = Migrator::get_applied_migrations(&db).await.unwrap();
        let names: Vec<String> = applied.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "m20250101_000001_create_users_table",
                "m20250101_000002_create_branches_table",
                "m20250101_000003_create_drivers_table",
                "m20250101_000004_create_products_table",
                "m20250101_000005_create_movements_table",
            ]
        );
        assert!(Migrator::get_pending_migrations(&db).await.unwrap().is_empty());

        // a second run is a no-op
        Migrator::up(&db, None).await.unwrap();
        Migrator::down(&db, None).await.unwrap();
        assert!(Migrator::get_applied_migrations(&db).await.unwrap().is_empty());
    }
}
