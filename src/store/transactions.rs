// src/store/transactions.rs - Batch input (parsed transactions) and output (matches) tables
use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio_postgres::types::ToSql;

use crate::models::address::ParsedAddress;
use crate::models::matching::{MatchResult, ParsedTransaction};
use crate::utils::db_connect::PgPool;

const INSERT_BATCH_SIZE: usize = 1000;

/// Reads `parsed_transactions`, optionally capped at `limit` rows.
pub async fn fetch_parsed_transactions(
    pool: &PgPool,
    limit: Option<i64>,
) -> Result<Vec<ParsedTransaction>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_parsed_transactions")?;
    let sql = "SELECT id::text AS id,
                      COALESCE(street_number::text, '') AS street_number,
                      COALESCE(predir, '') AS predir,
                      COALESCE(street_name, '') AS street_name,
                      COALESCE(street_type, '') AS street_type,
                      COALESCE(postdir, '') AS postdir,
                      COALESCE(apt_type, '') AS apt_type,
                      COALESCE(unit::text, '') AS unit,
                      COALESCE(original_address, '') AS original_address,
                      COALESCE(city, '') AS city,
                      COALESCE(state, '') AS state,
                      COALESCE(zip_code::text, '') AS zip_code
                 FROM parsed_transactions
                WHERE id IS NOT NULL
                ORDER BY id
                LIMIT $1";
    let rows = conn
        .query(sql, &[&limit])
        .await
        .context("Failed to query parsed_transactions")?;

    let transactions: Vec<ParsedTransaction> = rows
        .iter()
        .map(|row| ParsedTransaction {
            transaction_id: row.get("id"),
            address: ParsedAddress {
                street_number: row.get("street_number"),
                pre_directional: row.get("predir"),
                street_name: row.get("street_name"),
                street_type: row.get("street_type"),
                post_directional: row.get("postdir"),
                unit_type: row.get("apt_type"),
                unit_number: row.get("unit"),
                original_free_text: row.get("original_address"),
                city: row.get("city"),
                state: row.get("state"),
                zip: row.get("zip_code"),
            }
            .normalized(),
        })
        .collect();
    info!("📥 Loaded {} parsed transactions", transactions.len());
    Ok(transactions)
}

pub async fn ensure_matches_table(pool: &PgPool) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for ensure_matches_table")?;
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS matches (
            run_id TEXT NOT NULL,
            transaction_id TEXT NOT NULL,
            address_id TEXT,
            matched_address TEXT,
            confidence DOUBLE PRECISION NOT NULL,
            match_type TEXT NOT NULL,
            reason TEXT NOT NULL,
            stage_trail JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (run_id, transaction_id)
        )",
    )
    .await
    .context("Failed to create matches table")?;
    Ok(())
}

/// Writes results to `matches` in multi-row INSERTs inside one DB transaction.
pub async fn insert_match_results(pool: &PgPool, run_id: &str, results: &[MatchResult]) -> Result<u64> {
    if results.is_empty() {
        return Ok(0);
    }
    info!("💾 Writing {} match results (run {})", results.len(), run_id);

    let mut conn = pool
        .get()
        .await
        .context("Failed to get DB connection for insert_match_results")?;
    let transaction = conn
        .transaction()
        .await
        .context("Failed to start transaction for match results")?;

    let mut rows_written = 0u64;
    for chunk in results.chunks(INSERT_BATCH_SIZE) {
        let mut values_clause_parts = Vec::with_capacity(chunk.len());
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::with_capacity(chunk.len() * 8);
        let mut param_idx = 1;

        for result in chunk {
            values_clause_parts.push(format!(
                "(${}, ${}, ${}, ${}, ${}, ${}, ${}, ${})",
                param_idx,
                param_idx + 1,
                param_idx + 2,
                param_idx + 3,
                param_idx + 4,
                param_idx + 5,
                param_idx + 6,
                param_idx + 7
            ));
            let trail_json = serde_json::to_value(&result.stage_trail)
                .context("Failed to serialize stage trail")?;
            params.push(Box::new(run_id.to_string()));
            params.push(Box::new(result.transaction_id.clone()));
            params.push(Box::new(result.candidate_id.clone()));
            params.push(Box::new(result.matched_display_address.clone()));
            params.push(Box::new(result.reported_confidence()));
            params.push(Box::new(result.match_type.as_str().to_string()));
            params.push(Box::new(result.reason.clone()));
            params.push(Box::new(trail_json));
            param_idx += 8;
        }

        let insert_sql = format!(
            "INSERT INTO matches (
                run_id, transaction_id, address_id, matched_address,
                confidence, match_type, reason, stage_trail
             ) VALUES {}
             ON CONFLICT (run_id, transaction_id) DO UPDATE SET
                address_id = EXCLUDED.address_id,
                matched_address = EXCLUDED.matched_address,
                confidence = EXCLUDED.confidence,
                match_type = EXCLUDED.match_type,
                reason = EXCLUDED.reason,
                stage_trail = EXCLUDED.stage_trail",
            values_clause_parts.join(", ")
        );
        let params_slice: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        debug!("Executing match insert with {} parameters", params_slice.len());

        rows_written += transaction
            .execute(insert_sql.as_str(), params_slice.as_slice())
            .await
            .map_err(|e| {
                error!("Match results insert SQL error: {}", e);
                e
            })
            .context("Failed to insert match results")?;
    }

    transaction
        .commit()
        .await
        .context("Failed to commit match results")?;
    info!("💾 Wrote {} match rows", rows_written);
    Ok(rows_written)
}
