// src/store/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use tokio_postgres::Row;

use crate::models::address::{CandidateAddress, StructuralQuery};
use crate::store::{CandidateStore, InMemoryCandidateStore};
use crate::utils::db_connect::PgPool;
use crate::utils::matcher_config::is_valid_table_name;

/// Canonical columns normalized to trimmed upper-case text with NULL as ''.
fn candidate_select(table: &str) -> String {
    format!(
        "SELECT hhid::text AS id,
                UPPER(TRIM(COALESCE(house::text, ''))) AS house_number,
                UPPER(TRIM(COALESCE(predir, ''))) AS pre_directional,
                UPPER(TRIM(COALESCE(street, ''))) AS street_name,
                UPPER(TRIM(COALESCE(strtype, ''))) AS street_type,
                UPPER(TRIM(COALESCE(postdir, ''))) AS post_directional,
                UPPER(TRIM(COALESCE(apttype, ''))) AS unit_type,
                UPPER(TRIM(COALESCE(aptnbr::text, ''))) AS unit_number,
                TRIM(COALESCE(address, '')) AS display_address,
                UPPER(TRIM(COALESCE(city, ''))) AS city,
                UPPER(TRIM(COALESCE(state, ''))) AS state,
                TRIM(COALESCE(zip::text, '')) AS zip
           FROM {}
          WHERE hhid IS NOT NULL",
        table
    )
}

fn row_to_candidate(row: &Row) -> CandidateAddress {
    CandidateAddress {
        id: row.get("id"),
        house_number: row.get("house_number"),
        pre_directional: row.get("pre_directional"),
        street_name: row.get("street_name"),
        street_type: row.get("street_type"),
        post_directional: row.get("post_directional"),
        unit_type: row.get("unit_type"),
        unit_number: row.get("unit_number"),
        display_address: row.get("display_address"),
        city: row.get("city"),
        state: row.get("state"),
        zip: row.get("zip"),
    }
}

/// Live Candidate Store over the canonical address table.
#[derive(Clone)]
pub struct PgCandidateStore {
    pool: PgPool,
    table: String,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        if !is_valid_table_name(table) {
            return Err(anyhow::anyhow!("Invalid candidate table name: {}", table));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Reads the whole table into an in-memory snapshot.
    pub async fn load_snapshot(&self) -> Result<InMemoryCandidateStore> {
        info!("📥 Loading canonical addresses from {}...", self.table);
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for candidate snapshot")?;
        let sql = format!("{} ORDER BY id", candidate_select(&self.table));
        let rows = conn
            .query(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to load candidates from {}", self.table))?;
        let candidates: Vec<CandidateAddress> = rows.iter().map(row_to_candidate).collect();
        let store = InMemoryCandidateStore::new(candidates);
        info!(
            "📥 Loaded {} canonical addresses across {} house numbers",
            store.len(),
            store.house_numbers()
        );
        Ok(store)
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn find_by_house_number(&self, house_number: &str) -> Result<Vec<CandidateAddress>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_by_house_number")?;
        let sql = format!(
            "SELECT * FROM ({}) c WHERE c.house_number = $1 ORDER BY c.id",
            candidate_select(&self.table)
        );
        let rows = conn
            .query(sql.as_str(), &[&house_number.trim().to_uppercase()])
            .await
            .context("Failed to query candidates by house number")?;
        debug!("{} candidates for house number {}", rows.len(), house_number);
        Ok(rows.iter().map(row_to_candidate).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CandidateAddress>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_by_id")?;
        let sql = format!(
            "SELECT * FROM ({}) c WHERE c.id = $1 LIMIT 1",
            candidate_select(&self.table)
        );
        let row = conn
            .query_opt(sql.as_str(), &[&id])
            .await
            .context("Failed to query candidate by id")?;
        Ok(row.as_ref().map(row_to_candidate))
    }

    /// Columns are COALESCE'd to '' on the way out, so plain equality is
    /// null-equivalence here.
    async fn find_exact(&self, query: &StructuralQuery) -> Result<Option<CandidateAddress>> {
        if query.house_number.trim().is_empty() {
            return Ok(None);
        }
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_exact")?;
        let sql = format!(
            "SELECT * FROM ({}) c
              WHERE c.house_number = $1
                AND c.pre_directional = $2
                AND c.street_name = $3
                AND c.street_type = $4
                AND c.post_directional = $5
                AND c.unit_type = $6
                AND c.unit_number = $7
                AND ($8::text IS NULL OR c.zip = $8)
              ORDER BY c.id
              LIMIT 1",
            candidate_select(&self.table)
        );
        let zip: Option<String> = query.zip.as_ref().map(|z| z.trim().to_string());
        let row = conn
            .query_opt(
                sql.as_str(),
                &[
                    &query.house_number.trim().to_uppercase(),
                    &query.pre_directional.trim().to_uppercase(),
                    &query.street_name.trim().to_uppercase(),
                    &query.street_type.trim().to_uppercase(),
                    &query.post_directional.trim().to_uppercase(),
                    &query.unit_type.trim().to_uppercase(),
                    &query.unit_number.trim().to_uppercase(),
                    &zip,
                ],
            )
            .await
            .context("Failed to run structural candidate lookup")?;
        Ok(row.as_ref().map(row_to_candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_select_uses_table() {
        let sql = candidate_select("public.raw_addresses");
        assert!(sql.contains("FROM public.raw_addresses"));
        assert!(sql.contains("AS house_number"));
        assert!(sql.contains("AS display_address"));
    }
}
