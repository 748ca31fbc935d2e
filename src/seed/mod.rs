//! Boutique catalog seeding.
//!
//! Replaces the contents of the catalog tables with the fixed demonstration
//! catalog. Referential-integrity checking is switched off for the truncates
//! and inserts and is always switched back on before returning.

pub mod catalog;

use std::fmt;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, Statement,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::execute_step;
use crate::entities::{category, stock_item};
use crate::errors::{AdminError, MySqlErrorCode};
use crate::report::StepFailure;
use crate::schema::{self, CatalogTable};

pub use catalog::{CategorySeed, ProductSeed, CATEGORIES, PRODUCTS};

/// Tables that receive an `image_path` column, in order
pub const IMAGE_COLUMN_TABLES: [CatalogTable; 2] =
    [CatalogTable::StockItems, CatalogTable::Categories];

/// Tables emptied before the catalog is inserted, in order
pub const TRUNCATE_ORDER: [CatalogTable; 4] = [
    CatalogTable::SaleItems,
    CatalogTable::Returns,
    CatalogTable::StockItems,
    CatalogTable::Categories,
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub columns_added: Vec<CatalogTable>,
    pub columns_present: Vec<CatalogTable>,
    pub column_failures: Vec<StepFailure>,
    pub tables_truncated: Vec<CatalogTable>,
    pub categories_inserted: u64,
    pub stock_items_inserted: u64,
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Boutique data seeded successfully!")?;
        writeln!(f, "  categories inserted:  {}", self.categories_inserted)?;
        writeln!(f, "  stock items inserted: {}", self.stock_items_inserted)?;
        write!(f, "  tables truncated:     {}", join(&self.tables_truncated))?;
        if !self.columns_added.is_empty() {
            write!(f, "\n  image_path added to:  {}", join(&self.columns_added))?;
        }
        for failure in &self.column_failures {
            write!(f, "\n  warning: {}: {}", failure.step, failure.message)?;
        }
        Ok(())
    }
}

fn join(tables: &[CatalogTable]) -> String {
    tables
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Seeds the boutique catalog.
///
/// Column additions never abort the run: "duplicate column" is expected on
/// every run after the first, other errors are logged and recorded. Once
/// foreign-key checks are disabled they are restored on every path.
pub async fn seed_catalog(db: &DatabaseConnection) -> Result<SeedReport, AdminError> {
    let mut report = SeedReport::default();

    for table in IMAGE_COLUMN_TABLES {
        ensure_image_path_column(db, table, &mut report).await;
    }

    info!("Updating database with Boutique items...");
    execute_step(db, "disable_fk_checks", &schema::set_foreign_key_checks(false)).await?;

    let loaded = load_catalog(db, &mut report).await;
    let restored =
        execute_step(db, "restore_fk_checks", &schema::set_foreign_key_checks(true)).await;

    match (loaded, restored) {
        (Ok(()), Ok(_)) => {
            info!("Boutique data seeded successfully!");
            Ok(report)
        }
        (Ok(()), Err(e)) => Err(e.into()),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(restore_err)) => {
            error!("Failed to restore FOREIGN_KEY_CHECKS: {}", restore_err);
            Err(e)
        }
    }
}

async fn ensure_image_path_column(
    db: &DatabaseConnection,
    table: CatalogTable,
    report: &mut SeedReport,
) {
    info!("Checking for image_path column in {}...", table);
    let step = format!("add_image_path_{}", table);
    match execute_step(db, &step, &schema::add_image_path_column(table)).await {
        Ok(_) => {
            info!("Added image_path column to {}.", table);
            report.columns_added.push(table);
        }
        Err(e) if MySqlErrorCode::from_db_err(&e) == Some(MySqlErrorCode::DuplicateColumn) => {
            info!("image_path column already exists in {}.", table);
            report.columns_present.push(table);
        }
        Err(e) => {
            warn!("Could not add image_path column to {}: {}", table, e);
            report.column_failures.push(StepFailure::new(step, &e));
        }
    }
}

async fn load_catalog(db: &DatabaseConnection, report: &mut SeedReport) -> Result<(), AdminError> {
    for table in TRUNCATE_ORDER {
        execute_step(db, "truncate", &schema::truncate(table)).await?;
        info!("Truncated {}.", table);
        report.tables_truncated.push(table);
    }

    let txn = db.begin().await?;
    let inserted = async {
        info!("Inserting Categories...");
        let categories = category::Entity::insert_many(
            CATEGORIES.iter().map(CategorySeed::to_active_model),
        )
        .exec_without_returning(&txn)
        .await?;

        info!("Inserting Stock Items (Products)...");
        let stock_items = stock_item::Entity::insert_many(
            PRODUCTS.iter().map(ProductSeed::to_active_model),
        )
        .exec_without_returning(&txn)
        .await?;

        Ok::<_, DbErr>((categories, stock_items))
    }
    .await;

    match inserted {
        Ok((categories, stock_items)) => {
            txn.commit().await?;
            report.categories_inserted = categories;
            report.stock_items_inserted = stock_items;
            Ok(())
        }
        Err(e) => {
            warn!("Rolling back catalog inserts: {}", e);
            if let Err(rollback_err) = txn.rollback().await {
                error!("Rollback failed: {}", rollback_err);
            }
            Err(e.into())
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    num_items: i64,
}

/// Row counts of the seeded tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub categories: i64,
    pub stock_items: i64,
    pub stock_items_without_image: i64,
    pub sale_items: i64,
    pub returns: i64,
}

impl CatalogCounts {
    /// True when the tables hold exactly the seeded catalog
    pub fn matches_catalog(&self) -> bool {
        self.categories == CATEGORIES.len() as i64
            && self.stock_items == PRODUCTS.len() as i64
            && self.stock_items_without_image == 0
            && self.sale_items == 0
            && self.returns == 0
    }
}

impl fmt::Display for CatalogCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "categories:                {}", self.categories)?;
        writeln!(f, "stock_items:               {}", self.stock_items)?;
        writeln!(f, "stock_items without image: {}", self.stock_items_without_image)?;
        writeln!(f, "sale_items:                {}", self.sale_items)?;
        write!(f, "returns:                   {}", self.returns)
    }
}

async fn count<C: ConnectionTrait>(
    db: &C,
    table: CatalogTable,
    missing_image_only: bool,
) -> Result<i64, DbErr> {
    let stmt = Statement::from_string(
        db.get_database_backend(),
        schema::count_rows(table, missing_image_only),
    );
    CountRow::find_by_statement(stmt)
        .one(db)
        .await?
        .map(|row| row.num_items)
        .ok_or_else(|| DbErr::RecordNotFound(format!("row count of {}", table)))
}

/// Reads back what the seeder left behind.
pub async fn catalog_counts<C: ConnectionTrait>(db: &C) -> Result<CatalogCounts, DbErr> {
    Ok(CatalogCounts {
        categories: count(db, CatalogTable::Categories, false).await?,
        stock_items: count(db, CatalogTable::StockItems, false).await?,
        stock_items_without_image: count(db, CatalogTable::StockItems, true).await?,
        sale_items: count(db, CatalogTable::SaleItems, false).await?,
        returns: count(db, CatalogTable::Returns, false).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sea_orm::{
        DatabaseBackend, MockDatabase, MockExecResult, RuntimeErr, Transaction, Value,
    };
    use std::collections::BTreeMap;

    fn ok(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn server_error(message: &str) -> DbErr {
        DbErr::Exec(RuntimeErr::Internal(format!(
            "error returned from database: {}",
            message
        )))
    }

    fn duplicate_column() -> DbErr {
        server_error("1060 (42S21): Duplicate column name 'image_path'")
    }

    fn sql(text: String) -> Transaction {
        Transaction::one(Statement::from_string(DatabaseBackend::MySql, text))
    }

    fn expected_prefix() -> Vec<Transaction> {
        let mut log = vec![
            sql(schema::add_image_path_column(CatalogTable::StockItems)),
            sql(schema::add_image_path_column(CatalogTable::Categories)),
            sql(schema::set_foreign_key_checks(false)),
        ];
        log.extend(TRUNCATE_ORDER.iter().map(|t| sql(schema::truncate(*t))));
        log
    }

    #[tokio::test]
    async fn first_run_adds_columns_and_inserts_catalog() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([ok(0), ok(0), ok(0), ok(0), ok(0), ok(0), ok(0)])
            .append_exec_results([ok(5), ok(15), ok(0)])
            .into_connection();

        let report = seed_catalog(&db).await.unwrap();
        assert_eq!(
            report.columns_added,
            [CatalogTable::StockItems, CatalogTable::Categories]
        );
        assert!(report.columns_present.is_empty());
        assert_eq!(report.tables_truncated, TRUNCATE_ORDER);
        assert_eq!(report.categories_inserted, 5);
        assert_eq!(report.stock_items_inserted, 15);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 9);
        assert_eq!(log[..7], expected_prefix()[..]);

        let inserts = format!("{:?}", log[7]);
        assert!(inserts.contains("BEGIN"));
        assert!(inserts.contains("INSERT INTO `categories`"));
        assert!(inserts.contains("INSERT INTO `stock_items`"));
        assert!(inserts.contains("COMMIT"));

        assert_eq!(log[8], sql(schema::set_foreign_key_checks(true)));
    }

    #[tokio::test]
    async fn second_run_tolerates_existing_columns() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_errors([duplicate_column(), duplicate_column()])
            .append_exec_results([ok(0), ok(0), ok(0), ok(0), ok(0)])
            .append_exec_results([ok(5), ok(15), ok(0)])
            .into_connection();

        let report = seed_catalog(&db).await.unwrap();
        assert!(report.columns_added.is_empty());
        assert_eq!(
            report.columns_present,
            [CatalogTable::StockItems, CatalogTable::Categories]
        );
        assert!(report.column_failures.is_empty());
        assert_eq!(report.stock_items_inserted, 15);
    }

    #[tokio::test]
    async fn other_column_errors_are_recorded_not_fatal() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_errors([server_error(
                "1142 (42000): ALTER command denied to user 'seed'@'localhost'",
            )])
            .append_exec_errors([duplicate_column()])
            .append_exec_results([ok(0), ok(0), ok(0), ok(0), ok(0)])
            .append_exec_results([ok(5), ok(15), ok(0)])
            .into_connection();

        let report = seed_catalog(&db).await.unwrap();
        assert_eq!(report.column_failures.len(), 1);
        assert_eq!(
            report.column_failures[0].code,
            Some(MySqlErrorCode::Other(1142))
        );
        assert_eq!(report.columns_present, [CatalogTable::Categories]);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_and_restores_checks() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([ok(0), ok(0), ok(0), ok(0), ok(0), ok(0), ok(0)])
            .append_exec_results([ok(5)])
            .append_exec_errors([server_error(
                "1054 (42S22): Unknown column 'image_path' in 'field list'",
            )])
            .append_exec_results([ok(0)])
            .into_connection();

        let err = seed_catalog(&db).await.unwrap_err();
        assert_matches!(err, AdminError::DatabaseError(_));
        assert_eq!(err.mysql_code(), Some(MySqlErrorCode::Other(1054)));

        let log = db.into_transaction_log();
        let inserts = format!("{:?}", log[7]);
        assert!(inserts.contains("ROLLBACK"));
        assert!(!inserts.contains("COMMIT"));
        assert_eq!(log.last(), Some(&sql(schema::set_foreign_key_checks(true))));
    }

    #[tokio::test]
    async fn failed_truncate_still_restores_checks() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([ok(0), ok(0), ok(0), ok(0)])
            .append_exec_errors([server_error(
                "1146 (42S02): Table 'SileenSystem.returns' doesn't exist",
            )])
            .append_exec_results([ok(0)])
            .into_connection();

        let err = seed_catalog(&db).await.unwrap_err();
        assert_eq!(err.mysql_code(), Some(MySqlErrorCode::NoSuchTable));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 6);
        assert_eq!(log[5], sql(schema::set_foreign_key_checks(true)));
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn counts_match_seeded_catalog() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([
                [count_row(5)],
                [count_row(15)],
                [count_row(0)],
                [count_row(0)],
                [count_row(0)],
            ])
            .into_connection();

        let counts = catalog_counts(&db).await.unwrap();
        assert_eq!(counts.categories, 5);
        assert_eq!(counts.stock_items, 15);
        assert!(counts.matches_catalog());
    }

    #[test]
    fn leftover_sales_do_not_match_catalog() {
        let counts = CatalogCounts {
            categories: 5,
            stock_items: 15,
            stock_items_without_image: 0,
            sale_items: 2,
            returns: 0,
        };
        assert!(!counts.matches_catalog());
    }
}
