//! Bulk import of the vendor reference dataset from a `;`-delimited file.
//!
//! Only rows flagged active are loaded. Duplicate-key integrity violations
//! propagate unchanged so the operator sees exactly which row collided.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use futures::FutureExt;
use serde::Deserialize;
use tracing::info;

use crate::error::StoreError;
use crate::store::executor::{PgBackend, ResilientExecutor, Sleeper};

const CREATE_VENDOR_TABLE_SQL: &str = r#"CREATE TABLE IF NOT EXISTS vendor_data (
    id VARCHAR(16) PRIMARY KEY,
    name TEXT NOT NULL,
    address1 TEXT,
    address2 TEXT,
    address3 TEXT,
    city TEXT,
    state TEXT,
    zipcode TEXT,
    country TEXT,
    telephone TEXT,
    vendor_account_group TEXT,
    industry_sector TEXT,
    taxid1 TEXT,
    active_vendor INT NOT NULL,
    file_id TEXT)"#;

const CREATE_TRGM_EXTENSION_SQL: &str = "CREATE EXTENSION IF NOT EXISTS pg_trgm";

const INSERT_VENDOR_SQL: &str = "INSERT INTO vendor_data VALUES \
    ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)";

/// One row of the source file, named exactly as the exporting system names
/// its columns.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorCsvRow {
    #[serde(rename = "VendorID")]
    pub id: String,
    #[serde(rename = "VendorName")]
    pub name: String,
    #[serde(rename = "Address1")]
    pub address1: String,
    #[serde(rename = "Address2")]
    pub address2: String,
    #[serde(rename = "Address3")]
    pub address3: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "ZipCode")]
    pub zipcode: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Telephone")]
    pub telephone: String,
    #[serde(rename = "VendorAccountGroup")]
    pub vendor_account_group: String,
    #[serde(rename = "IndustrySector")]
    pub industry_sector: String,
    #[serde(rename = "TaxID1")]
    pub tax_id: String,
    #[serde(rename = "ActiveVendor")]
    pub active_vendor: String,
    #[serde(rename = "FileID")]
    pub file_id: String,
}

impl VendorCsvRow {
    pub fn is_active(&self) -> bool {
        self.active_vendor == "1"
    }
}

/// Parses every row of a `;`-delimited vendor file.
pub fn read_vendor_rows<R: Read>(reader: R) -> anyhow::Result<Vec<VendorCsvRow>> {
    let mut csv_reader = csv::ReaderBuilder::new().delimiter(b';').from_reader(reader);
    let mut rows = Vec::new();
    for (line, row) in csv_reader.deserialize::<VendorCsvRow>().enumerate() {
        rows.push(row.with_context(|| format!("malformed vendor row {}", line + 1))?);
    }
    Ok(rows)
}

/// Creates the vendor table and the trigram extension the matcher relies on.
pub async fn ensure_schema<S: Sleeper>(
    executor: &ResilientExecutor<PgBackend, S>,
) -> Result<(), StoreError> {
    execute_statement(executor, CREATE_TRGM_EXTENSION_SQL).await?;
    execute_statement(executor, CREATE_VENDOR_TABLE_SQL).await
}

/// Imports all active vendors from `path`, committing once at the end.
/// Returns the number of rows inserted.
pub async fn import_vendor_file<S: Sleeper>(
    executor: &ResilientExecutor<PgBackend, S>,
    path: &Path,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open vendor file {}", path.display()))?;
    let rows = read_vendor_rows(file)?;

    ensure_schema(executor).await?;
    execute_statement(executor, "BEGIN").await?;

    let mut imported = 0usize;
    for row in rows.iter().filter(|row| row.is_active()) {
        insert_vendor(executor, row).await?;
        imported += 1;
    }
    executor.commit().await?;

    info!(imported, total = rows.len(), "vendor import finished");
    Ok(imported)
}

async fn insert_vendor<S: Sleeper>(
    executor: &ResilientExecutor<PgBackend, S>,
    row: &VendorCsvRow,
) -> Result<(), StoreError> {
    executor
        .run(move |conn| {
            let row = row.clone();
            async move {
                sqlx::query(INSERT_VENDOR_SQL)
                    .bind(row.id)
                    .bind(row.name)
                    .bind(row.address1)
                    .bind(row.address2)
                    .bind(row.address3)
                    .bind(row.city)
                    .bind(row.state)
                    .bind(row.zipcode)
                    .bind(row.country)
                    .bind(row.telephone)
                    .bind(row.vendor_account_group)
                    .bind(row.industry_sector)
                    .bind(row.tax_id)
                    .bind(row.active_vendor.parse::<i32>().unwrap_or(0))
                    .bind(row.file_id)
                    .execute(&mut *conn)
                    .await
                    .map(|_| ())
            }
            .boxed()
        })
        .await
}

async fn execute_statement<S: Sleeper>(
    executor: &ResilientExecutor<PgBackend, S>,
    sql: &'static str,
) -> Result<(), StoreError> {
    executor
        .run(move |conn| {
            async move { sqlx::query(sql).execute(&mut *conn).await.map(|_| ()) }.boxed()
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
VendorID;VendorName;Address1;Address2;Address3;City;State;ZipCode;Country;Telephone;VendorAccountGroup;IndustrySector;TaxID1;ActiveVendor;FileID
2416;Bernhard Group;Brandenburgische Strasse 55;;;Knittelsheim;;76879;DE;;ZP01;TRAD;DE757038244;1;F001
3562;Bosco Ltd;Flotowstr. 65;;;Aschersleben;;06449;DE;;ZP01;TRAD;DE758402667;1;F001
9999;Gone GmbH;Nowhere 1;;;Berlin;;10000;DE;;ZP01;TRAD;DE000000000;0;F001
";

    #[test]
    fn parses_semicolon_delimited_rows() {
        let rows = read_vendor_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, "2416");
        assert_eq!(rows[0].name, "Bernhard Group");
        assert_eq!(rows[0].tax_id, "DE757038244");
        assert_eq!(rows[1].zipcode, "06449");
    }

    #[test]
    fn only_active_rows_are_selected() {
        let rows = read_vendor_rows(SAMPLE.as_bytes()).unwrap();
        let active: Vec<_> = rows.iter().filter(|row| row.is_active()).collect();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|row| row.id != "9999"));
    }

    #[test]
    fn short_rows_are_rejected() {
        let err = read_vendor_rows("VendorID;VendorName\n1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("malformed vendor row 1"));
    }
}
