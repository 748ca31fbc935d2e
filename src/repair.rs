//! Repair of the `stock_movements` foreign key.
//!
//! Older schemas pointed `stock_movements.item_id` at a legacy `items` table.
//! The repair empties the movement log, drops that constraint if it is there
//! and recreates it against `stock_items`.

use std::fmt;

use sea_orm::{ConnectionTrait, DbBackend, DbErr, FromQueryResult, Statement};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::execute_step;
use crate::errors::{AdminError, MySqlErrorCode};
use crate::schema::{self, CatalogTable, STOCK_MOVEMENTS_ITEM_FK};

/// State of the old constraint before the repair ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousConstraint {
    Dropped,
    Absent,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub constraint: &'static str,
    pub previous_constraint: PreviousConstraint,
    /// Filled in when the caller asked for a read-back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<ForeignKeyInfo>,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Database fixed successfully! stock_movements now references stock_items."
        )?;
        let previous = match self.previous_constraint {
            PreviousConstraint::Dropped => "dropped",
            PreviousConstraint::Absent => "not present",
        };
        write!(f, "  previous {}: {}", self.constraint, previous)?;
        if let Some(info) = &self.verified {
            write!(f, "\n  verified: {}", info)?;
        }
        Ok(())
    }
}

/// Points `stock_movements.item_id` at `stock_items`.
///
/// All movement rows are deleted first. A missing old constraint (error 1091)
/// is only a warning; any other failure stops the repair.
pub async fn repair_stock_movements_fk<C>(db: &C) -> Result<RepairReport, AdminError>
where
    C: ConnectionTrait,
{
    info!("Clearing stock_movements table...");
    execute_step(db, "truncate", &schema::truncate(CatalogTable::StockMovements)).await?;

    info!("Dropping incorrect foreign key (referencing items)...");
    let previous_constraint =
        match execute_step(db, "drop_foreign_key", &schema::drop_stock_movements_item_fk()).await
        {
            Ok(_) => PreviousConstraint::Dropped,
            Err(e)
                if MySqlErrorCode::from_db_err(&e) == Some(MySqlErrorCode::CantDropFieldOrKey) =>
            {
                warn!("Could not drop foreign key (it might not exist): {}", e);
                PreviousConstraint::Absent
            }
            Err(e) => return Err(e.into()),
        };

    info!("Adding correct foreign key (referencing stock_items)...");
    execute_step(
        db,
        "add_foreign_key",
        &schema::create_stock_movements_item_fk(),
    )
    .await?;

    info!("Database fixed successfully! stock_movements now references stock_items.");
    Ok(RepairReport {
        constraint: STOCK_MOVEMENTS_ITEM_FK,
        previous_constraint,
        verified: None,
    })
}

const FOREIGN_KEY_QUERY: &str = r#"SELECT
    kcu.COLUMN_NAME AS column_name,
    rc.REFERENCED_TABLE_NAME AS referenced_table,
    kcu.REFERENCED_COLUMN_NAME AS referenced_column,
    rc.DELETE_RULE AS delete_rule,
    rc.UPDATE_RULE AS update_rule
FROM information_schema.REFERENTIAL_CONSTRAINTS rc
JOIN information_schema.KEY_COLUMN_USAGE kcu
    ON kcu.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA
    AND kcu.CONSTRAINT_NAME = rc.CONSTRAINT_NAME
    AND kcu.TABLE_NAME = rc.TABLE_NAME
WHERE rc.CONSTRAINT_SCHEMA = DATABASE()
    AND rc.TABLE_NAME = ?
    AND rc.CONSTRAINT_NAME = ?"#;

/// A foreign key as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct ForeignKeyInfo {
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub delete_rule: String,
    pub update_rule: String,
}

impl ForeignKeyInfo {
    /// True when the key references `stock_items(item_id)` and cascades both ways
    pub fn is_repaired(&self) -> bool {
        self.column_name == "item_id"
            && self.referenced_table == CatalogTable::StockItems.as_ref()
            && self.referenced_column == "item_id"
            && self.delete_rule.eq_ignore_ascii_case("CASCADE")
            && self.update_rule.eq_ignore_ascii_case("CASCADE")
    }
}

impl fmt::Display for ForeignKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}({}) ON DELETE {} ON UPDATE {}",
            self.column_name,
            self.referenced_table,
            self.referenced_column,
            self.delete_rule,
            self.update_rule
        )
    }
}

/// Reads `stock_movements_ibfk_1` from `information_schema`.
pub async fn verify_foreign_key<C>(db: &C) -> Result<Option<ForeignKeyInfo>, DbErr>
where
    C: ConnectionTrait,
{
    let stmt = Statement::from_sql_and_values(
        DbBackend::MySql,
        FOREIGN_KEY_QUERY,
        [
            CatalogTable::StockMovements.as_ref().into(),
            STOCK_MOVEMENTS_ITEM_FK.into(),
        ],
    );
    ForeignKeyInfo::find_by_statement(stmt).one(db).await
}

/// Fails unless the constraint exists in its repaired form.
pub async fn ensure_repaired<C>(db: &C) -> Result<ForeignKeyInfo, AdminError>
where
    C: ConnectionTrait,
{
    match verify_foreign_key(db).await? {
        Some(info) if info.is_repaired() => {
            info!(constraint = STOCK_MOVEMENTS_ITEM_FK, "Verified {}", info);
            Ok(info)
        }
        Some(info) => Err(AdminError::Verification(format!(
            "{} is {}",
            STOCK_MOVEMENTS_ITEM_FK, info
        ))),
        None => Err(AdminError::Verification(format!(
            "{} does not exist on stock_movements",
            STOCK_MOVEMENTS_ITEM_FK
        ))),
    }
}
