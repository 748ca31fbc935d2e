//! Table identifiers and the MySQL statements the tools issue against them.

use sea_orm_migration::prelude::*;
use serde::Serialize;

/// Name of the foreign key from `stock_movements.item_id`
pub const STOCK_MOVEMENTS_ITEM_FK: &str = "stock_movements_ibfk_1";

/// Tables of the retail schema that the tools touch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CatalogTable {
    Categories,
    StockItems,
    StockMovements,
    SaleItems,
    Returns,
}

impl CatalogTable {
    pub fn iden(self) -> Alias {
        Alias::new(self.as_ref())
    }
}

/// Column identifiers
#[derive(Iden)]
pub enum CatalogColumn {
    ItemId,
    ImagePath,
}

/// `ALTER TABLE <table> ADD COLUMN image_path VARCHAR(255) NULL`
pub fn add_image_path_column(table: CatalogTable) -> String {
    Table::alter()
        .table(table.iden())
        .add_column(
            ColumnDef::new(CatalogColumn::ImagePath)
                .string_len(255)
                .null(),
        )
        .to_string(MysqlQueryBuilder)
}

pub fn truncate(table: CatalogTable) -> String {
    Table::truncate()
        .table(table.iden())
        .to_string(MysqlQueryBuilder)
}

pub fn drop_stock_movements_item_fk() -> String {
    ForeignKey::drop()
        .name(STOCK_MOVEMENTS_ITEM_FK)
        .table(CatalogTable::StockMovements.iden())
        .to_string(MysqlQueryBuilder)
}

/// `stock_movements.item_id -> stock_items.item_id`, cascading both ways
pub fn create_stock_movements_item_fk() -> String {
    ForeignKey::create()
        .name(STOCK_MOVEMENTS_ITEM_FK)
        .from(CatalogTable::StockMovements.iden(), CatalogColumn::ItemId)
        .to(CatalogTable::StockItems.iden(), CatalogColumn::ItemId)
        .on_delete(ForeignKeyAction::Cascade)
        .on_update(ForeignKeyAction::Cascade)
        .to_string(MysqlQueryBuilder)
}

pub fn set_foreign_key_checks(enabled: bool) -> String {
    format!("SET FOREIGN_KEY_CHECKS = {}", u8::from(enabled))
}

/// `SELECT COUNT(*) AS num_items FROM <table>`, optionally restricted to rows
/// without an image
pub fn count_rows(table: CatalogTable, missing_image_only: bool) -> String {
    let mut query = Query::select();
    query
        .expr_as(Expr::col(Asterisk).count(), Alias::new("num_items"))
        .from(table.iden());
    if missing_image_only {
        query.and_where(Expr::col(CatalogColumn::ImagePath).is_null());
    }
    query.to_string(MysqlQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn table_names_are_snake_case() {
        let names: Vec<String> = CatalogTable::iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            ["categories", "stock_items", "stock_movements", "sale_items", "returns"]
        );
    }

    #[test]
    fn image_path_column_is_nullable_varchar() {
        let sql = add_image_path_column(CatalogTable::StockItems);
        assert!(sql.starts_with("ALTER TABLE `stock_items` ADD COLUMN `image_path`"));
        assert!(sql.contains("varchar(255)"));
        assert!(sql.contains("NULL"));
        assert!(!sql.contains("NOT NULL"));
    }

    #[test]
    fn truncate_targets_named_table() {
        assert_eq!(truncate(CatalogTable::SaleItems), "TRUNCATE TABLE `sale_items`");
    }

    #[test]
    fn foreign_key_statements() {
        assert_eq!(
            drop_stock_movements_item_fk(),
            "ALTER TABLE `stock_movements` DROP FOREIGN KEY `stock_movements_ibfk_1`"
        );

        let create = create_stock_movements_item_fk();
        assert!(create.contains("ADD CONSTRAINT `stock_movements_ibfk_1`"));
        assert!(create.contains("FOREIGN KEY (`item_id`) REFERENCES `stock_items` (`item_id`)"));
        assert!(create.contains("ON DELETE CASCADE"));
        assert!(create.contains("ON UPDATE CASCADE"));
    }

    #[test]
    fn foreign_key_checks_toggle() {
        assert_eq!(set_foreign_key_checks(false), "SET FOREIGN_KEY_CHECKS = 0");
        assert_eq!(set_foreign_key_checks(true), "SET FOREIGN_KEY_CHECKS = 1");
    }

    #[test]
    fn count_query_filters_missing_images() {
        assert_eq!(
            count_rows(CatalogTable::Categories, false),
            "SELECT COUNT(*) AS `num_items` FROM `categories`"
        );
        assert_eq!(
            count_rows(CatalogTable::StockItems, true),
            "SELECT COUNT(*) AS `num_items` FROM `stock_items` WHERE `image_path` IS NULL"
        );
    }
}
