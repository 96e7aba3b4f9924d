//! Contract store trait and the SQLite implementation.

use crate::error::{StoreError, StoreResult};
use crate::repos::{NotificationFeed, ReplicaRepo, SourceRepo, SyncStatusRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined contract store trait.
#[async_trait]
pub trait ContractStore: SourceRepo + ReplicaRepo + SyncStatusRepo + Send + Sync {
    /// Create the tables this engine owns.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;

    /// Subscribe to a notification channel.
    async fn subscribe(&self, channel: &str) -> StoreResult<Box<dyn NotificationFeed>>;

    /// Close the connection pool, waiting for checked-out connections.
    async fn close(&self);
}

/// SQLite-based contract store.
///
/// Holds the whole contract schema locally. Used for development and tests;
/// it has no notification feed.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite store.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // serializes the replicator's parallel row transactions.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl ContractStore for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Box<dyn NotificationFeed>> {
        Err(StoreError::Config(format!(
            "sqlite stores have no notification feed (channel {channel})"
        )))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use sqlx::{QueryBuilder, SqliteConnection};
    use std::collections::HashMap;
    use time::OffsetDateTime;
    use uuid::Uuid;
    use versync_core::SyncStatus;

    // SQLite has a limit on bound parameters per statement, so large
    // lookups and bulk inserts are split.
    const PARAM_BATCH: usize = 900;

    const SYNC_STATUS_COLUMNS: &str = "id, chain_id, address, verification_id, status, \
         error_message, attempts, created_at, updated_at";

    const VERIFIED_CONTRACT_COLUMNS: &str = "vc.id, vc.deployment_id, vc.compilation_id, \
         vc.creation_match, vc.creation_values, vc.creation_transformations, \
         vc.creation_metadata_match, vc.runtime_match, vc.runtime_values, \
         vc.runtime_transformations, vc.runtime_metadata_match, vc.created_at, vc.updated_at, \
         vc.created_by, vc.updated_by";

    const CLOSURE_QUERY: &str = r#"
    SELECT
        vc.id AS vc_id,
        vc.creation_match AS vc_creation_match,
        vc.creation_values AS vc_creation_values,
        vc.creation_transformations AS vc_creation_transformations,
        vc.creation_metadata_match AS vc_creation_metadata_match,
        vc.runtime_match AS vc_runtime_match,
        vc.runtime_values AS vc_runtime_values,
        vc.runtime_transformations AS vc_runtime_transformations,
        vc.runtime_metadata_match AS vc_runtime_metadata_match,
        vc.created_at AS vc_created_at,
        vc.updated_at AS vc_updated_at,
        vc.created_by AS vc_created_by,
        vc.updated_by AS vc_updated_by,
        cd.id AS cd_id,
        cd.chain_id AS cd_chain_id,
        cd.address AS cd_address,
        cd.transaction_hash AS cd_transaction_hash,
        cd.block_number AS cd_block_number,
        cd.transaction_index AS cd_transaction_index,
        cd.deployer AS cd_deployer,
        c.id AS c_id,
        c.creation_code_hash AS c_creation_code_hash,
        c.runtime_code_hash AS c_runtime_code_hash,
        cc.id AS cc_id,
        cc.compiler AS cc_compiler,
        cc.version AS cc_version,
        cc.language AS cc_language,
        cc.name AS cc_name,
        cc.fully_qualified_name AS cc_fully_qualified_name,
        cc.compiler_settings AS cc_compiler_settings,
        cc.compilation_artifacts AS cc_compilation_artifacts,
        cc.creation_code_hash AS cc_creation_code_hash,
        cc.creation_code_artifacts AS cc_creation_code_artifacts,
        cc.runtime_code_hash AS cc_runtime_code_hash,
        cc.runtime_code_artifacts AS cc_runtime_code_artifacts
    FROM verified_contracts vc
    JOIN contract_deployments cd ON cd.id = vc.deployment_id
    JOIN contracts c ON c.id = cd.contract_id
    JOIN compiled_contracts cc ON cc.id = vc.compilation_id
    WHERE vc.id = ?
    "#;

    fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }

    async fn insert_codes(conn: &mut SqliteConnection, codes: &[CodeRow]) -> StoreResult<u64> {
        let mut inserted = 0;
        for batch in codes.chunks(PARAM_BATCH / 3) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO code (code_hash, code_hash_keccak, code) ",
            );
            builder.push_values(batch, |mut row, code| {
                row.push_bind(&code.code_hash)
                    .push_bind(&code.code_hash_keccak)
                    .push_bind(&code.code);
            });
            builder.push(" ON CONFLICT (code_hash) DO NOTHING");
            inserted += builder.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn insert_sources(
        conn: &mut SqliteConnection,
        sources: &[SourceRow],
    ) -> StoreResult<u64> {
        let mut inserted = 0;
        for batch in sources.chunks(PARAM_BATCH / 3) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO sources (source_hash, source_hash_keccak, content) ",
            );
            builder.push_values(batch, |mut row, source| {
                row.push_bind(&source.source_hash)
                    .push_bind(&source.source_hash_keccak)
                    .push_bind(&source.content);
            });
            builder.push(" ON CONFLICT (source_hash) DO NOTHING");
            inserted += builder.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn upsert_contract_on(
        conn: &mut SqliteConnection,
        contract: &ContractRow,
    ) -> StoreResult<Uuid> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO contracts (id, creation_code_hash, runtime_code_hash)
            VALUES (?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(contract.id)
        .bind(&contract.creation_code_hash)
        .bind(&contract.runtime_code_hash)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM contracts WHERE creation_code_hash IS ? AND runtime_code_hash = ?",
        )
        .bind(&contract.creation_code_hash)
        .bind(&contract.runtime_code_hash)
        .fetch_optional(&mut *conn)
        .await?;
        existing.ok_or_else(|| StoreError::NotFound("contract by code hashes".to_string()))
    }

    async fn upsert_deployment_on(
        conn: &mut SqliteConnection,
        deployment: &DeploymentRow,
    ) -> StoreResult<Uuid> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO contract_deployments
                (id, chain_id, address, transaction_hash, block_number, transaction_index, deployer, contract_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(deployment.id)
        .bind(deployment.chain_id)
        .bind(&deployment.address)
        .bind(&deployment.transaction_hash)
        .bind(deployment.block_number)
        .bind(deployment.transaction_index)
        .bind(&deployment.deployer)
        .bind(deployment.contract_id)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM contract_deployments
            WHERE chain_id = ? AND address = ? AND transaction_hash IS ?
            "#,
        )
        .bind(deployment.chain_id)
        .bind(&deployment.address)
        .bind(&deployment.transaction_hash)
        .fetch_optional(&mut *conn)
        .await?;
        existing.ok_or_else(|| {
            StoreError::NotFound(format!("deployment {}", deployment.location()))
        })
    }

    async fn upsert_compilation_on(
        conn: &mut SqliteConnection,
        compilation: &CompilationRow,
    ) -> StoreResult<Uuid> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO compiled_contracts
                (id, compiler, version, language, name, fully_qualified_name, compiler_settings,
                 compilation_artifacts, creation_code_hash, creation_code_artifacts,
                 runtime_code_hash, runtime_code_artifacts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(compilation.id)
        .bind(&compilation.compiler)
        .bind(&compilation.version)
        .bind(&compilation.language)
        .bind(&compilation.name)
        .bind(&compilation.fully_qualified_name)
        .bind(&compilation.compiler_settings)
        .bind(&compilation.compilation_artifacts)
        .bind(&compilation.creation_code_hash)
        .bind(&compilation.creation_code_artifacts)
        .bind(&compilation.runtime_code_hash)
        .bind(&compilation.runtime_code_artifacts)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM compiled_contracts
            WHERE compiler = ? AND language = ? AND creation_code_hash IS ? AND runtime_code_hash = ?
            "#,
        )
        .bind(&compilation.compiler)
        .bind(&compilation.language)
        .bind(&compilation.creation_code_hash)
        .bind(&compilation.runtime_code_hash)
        .fetch_optional(&mut *conn)
        .await?;
        existing.ok_or_else(|| StoreError::NotFound(format!("compilation {}", compilation.name)))
    }

    async fn insert_compilation_sources(
        conn: &mut SqliteConnection,
        compilation_id: Uuid,
        sources: &[CompilationSourceRow],
    ) -> StoreResult<()> {
        for batch in sources.chunks(PARAM_BATCH / 4) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "INSERT INTO compiled_contracts_sources (id, compilation_id, source_hash, path) ",
            );
            builder.push_values(batch, |mut row, source| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(compilation_id)
                    .push_bind(&source.source_hash)
                    .push_bind(&source.path);
            });
            builder.push(" ON CONFLICT (compilation_id, path) DO NOTHING");
            builder.build().execute(&mut *conn).await?;
        }
        Ok(())
    }

    #[async_trait]
    impl SourceRepo for SqliteStore {
        async fn fetch_code_by_hash(&self, code_hash: &[u8]) -> StoreResult<Option<CodeRow>> {
            let row = sqlx::query_as::<_, CodeRow>(
                "SELECT code_hash, code_hash_keccak, code FROM code WHERE code_hash = ?",
            )
            .bind(code_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn fetch_codes_by_hashes(
            &self,
            code_hashes: &[Vec<u8>],
        ) -> StoreResult<HashMap<Vec<u8>, CodeRow>> {
            let mut result = HashMap::with_capacity(code_hashes.len());

            for batch in code_hashes.chunks(PARAM_BATCH) {
                let query = format!(
                    "SELECT code_hash, code_hash_keccak, code FROM code WHERE code_hash IN ({})",
                    placeholders(batch.len())
                );

                let mut query_builder = sqlx::query_as::<_, CodeRow>(&query);
                for hash in batch {
                    query_builder = query_builder.bind(hash);
                }

                let rows: Vec<CodeRow> = query_builder.fetch_all(&self.pool).await?;
                for row in rows {
                    result.insert(row.code_hash.clone(), row);
                }
            }

            Ok(result)
        }

        async fn fetch_sources_by_hashes(
            &self,
            source_hashes: &[Vec<u8>],
        ) -> StoreResult<HashMap<Vec<u8>, String>> {
            let mut result = HashMap::with_capacity(source_hashes.len());

            for batch in source_hashes.chunks(PARAM_BATCH) {
                let query = format!(
                    "SELECT source_hash, content FROM sources WHERE source_hash IN ({})",
                    placeholders(batch.len())
                );

                let mut query_builder = sqlx::query_as::<_, (Vec<u8>, String)>(&query);
                for hash in batch {
                    query_builder = query_builder.bind(hash);
                }

                result.extend(query_builder.fetch_all(&self.pool).await?);
            }

            Ok(result)
        }

        async fn fetch_compilation_sources(
            &self,
            compilation_id: Uuid,
        ) -> StoreResult<Vec<CompilationSourceRow>> {
            let rows = sqlx::query_as::<_, CompilationSourceRow>(
                r#"
                SELECT ccs.path, s.source_hash, s.source_hash_keccak, s.content
                FROM compiled_contracts_sources ccs
                JOIN sources s ON s.source_hash = ccs.source_hash
                WHERE ccs.compilation_id = ?
                ORDER BY ccs.path
                "#,
            )
            .bind(compilation_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn fetch_closure(
            &self,
            verified_contract_id: i64,
        ) -> StoreResult<Option<VerifiedContractClosure>> {
            let row = sqlx::query_as::<_, ClosureRow>(CLOSURE_QUERY)
                .bind(verified_contract_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(VerifiedContractClosure::from))
        }

        async fn fetch_verified_batch(
            &self,
            cursor: i64,
            limit: u32,
            created_by: &[String],
        ) -> StoreResult<Vec<VerifiedContractRow>> {
            if created_by.is_empty() {
                return Ok(Vec::new());
            }

            let query = format!(
                r#"
                SELECT {VERIFIED_CONTRACT_COLUMNS}
                FROM verified_contracts vc
                JOIN contract_deployments cd ON cd.id = vc.deployment_id
                WHERE vc.id >= ?
                  AND cd.transaction_hash IS NOT NULL
                  AND vc.created_by IN ({})
                ORDER BY vc.id
                LIMIT ?
                "#,
                placeholders(created_by.len())
            );

            let mut query_builder = sqlx::query_as::<_, VerifiedContractRow>(&query).bind(cursor);
            for tag in created_by {
                query_builder = query_builder.bind(tag);
            }
            let rows = query_builder
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn find_verified_contract_id(
            &self,
            chain_id: i64,
            address: &[u8],
            created_by: &[String],
        ) -> StoreResult<Option<i64>> {
            if created_by.is_empty() {
                return Ok(None);
            }

            let query = format!(
                r#"
                SELECT vc.id
                FROM verified_contracts vc
                JOIN contract_deployments cd ON cd.id = vc.deployment_id
                WHERE cd.chain_id = ? AND cd.address = ?
                  AND vc.created_by IN ({})
                ORDER BY vc.id DESC
                LIMIT 1
                "#,
                placeholders(created_by.len())
            );

            let mut query_builder = sqlx::query_scalar::<_, i64>(&query)
                .bind(chain_id)
                .bind(address);
            for tag in created_by {
                query_builder = query_builder.bind(tag);
            }
            let id = query_builder.fetch_optional(&self.pool).await?;
            Ok(id)
        }

        async fn count_verified_contracts(&self) -> StoreResult<i64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verified_contracts")
                .fetch_one(&self.pool)
                .await?;
            Ok(count)
        }
    }

    #[async_trait]
    impl ReplicaRepo for SqliteStore {
        async fn upsert_codes(&self, codes: &[CodeRow]) -> StoreResult<u64> {
            let mut tx = self.pool.begin().await?;
            let inserted = insert_codes(&mut tx, codes).await?;
            tx.commit().await?;
            Ok(inserted)
        }

        async fn upsert_sources(&self, sources: &[SourceRow]) -> StoreResult<u64> {
            let mut tx = self.pool.begin().await?;
            let inserted = insert_sources(&mut tx, sources).await?;
            tx.commit().await?;
            Ok(inserted)
        }

        async fn upsert_contract(&self, contract: &ContractRow) -> StoreResult<Uuid> {
            let mut tx = self.pool.begin().await?;
            let id = upsert_contract_on(&mut tx, contract).await?;
            tx.commit().await?;
            Ok(id)
        }

        async fn upsert_deployment(&self, deployment: &DeploymentRow) -> StoreResult<Uuid> {
            let mut tx = self.pool.begin().await?;
            let id = upsert_deployment_on(&mut tx, deployment).await?;
            tx.commit().await?;
            Ok(id)
        }

        async fn upsert_compilation(&self, compilation: &CompilationRow) -> StoreResult<Uuid> {
            let mut tx = self.pool.begin().await?;
            let id = upsert_compilation_on(&mut tx, compilation).await?;
            tx.commit().await?;
            Ok(id)
        }

        async fn replicate(&self, bundle: &ReplicationBundle) -> StoreResult<ReplicateOutcome> {
            let mut tx = self.pool.begin().await?;

            insert_codes(&mut tx, &bundle.codes).await?;
            let contract_id = upsert_contract_on(&mut tx, &bundle.contract).await?;
            let deployment = DeploymentRow {
                contract_id,
                ..bundle.deployment.clone()
            };
            let deployment_id = upsert_deployment_on(&mut tx, &deployment).await?;
            let compilation_id = upsert_compilation_on(&mut tx, &bundle.compilation).await?;
            insert_sources(&mut tx, &bundle.source_rows()).await?;
            insert_compilation_sources(&mut tx, compilation_id, &bundle.sources).await?;

            let verified = &bundle.verified;
            let inserted: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO verified_contracts
                    (deployment_id, compilation_id, creation_match, creation_values,
                     creation_transformations, creation_metadata_match, runtime_match,
                     runtime_values, runtime_transformations, runtime_metadata_match,
                     created_at, updated_at, created_by, updated_by)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (compilation_id, deployment_id) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(deployment_id)
            .bind(compilation_id)
            .bind(verified.creation_match)
            .bind(&verified.creation_values)
            .bind(&verified.creation_transformations)
            .bind(verified.creation_metadata_match)
            .bind(verified.runtime_match)
            .bind(&verified.runtime_values)
            .bind(&verified.runtime_transformations)
            .bind(verified.runtime_metadata_match)
            .bind(verified.created_at)
            .bind(verified.updated_at)
            .bind(&verified.created_by)
            .bind(&verified.updated_by)
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(verified_contract_id) => {
                    tx.commit().await?;
                    Ok(ReplicateOutcome::Inserted {
                        verified_contract_id,
                    })
                }
                None => {
                    tx.rollback().await?;
                    Ok(ReplicateOutcome::AlreadyPresent)
                }
            }
        }
    }

    #[async_trait]
    impl SyncStatusRepo for SqliteStore {
        async fn get_sync_status(
            &self,
            chain_id: i64,
            address: &[u8],
        ) -> StoreResult<Option<SyncStatusRow>> {
            let row = sqlx::query_as::<_, SyncStatusRow>(&format!(
                "SELECT {SYNC_STATUS_COLUMNS} FROM sourcify_sync WHERE chain_id = ? AND address = ?"
            ))
            .bind(chain_id)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn record_sync_status(&self, update: &SyncStatusUpdate) -> StoreResult<bool> {
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                r#"
                INSERT INTO sourcify_sync
                    (chain_id, address, verification_id, status, error_message, attempts, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (chain_id, address) DO UPDATE SET
                    verification_id = COALESCE(excluded.verification_id, sourcify_sync.verification_id),
                    status = excluded.status,
                    error_message = excluded.error_message,
                    attempts = sourcify_sync.attempts + excluded.attempts,
                    updated_at = excluded.updated_at
                WHERE sourcify_sync.status NOT IN ('verified', 'already_verified')
                "#,
            )
            .bind(update.chain_id)
            .bind(&update.address)
            .bind(&update.verification_id)
            .bind(update.status.as_str())
            .bind(&update.error_message)
            .bind(i32::from(update.counts_attempt))
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn update_sync_status(
            &self,
            id: i64,
            status: SyncStatus,
            error_message: Option<&str>,
        ) -> StoreResult<bool> {
            let result = sqlx::query(
                r#"
                UPDATE sourcify_sync
                SET status = ?, error_message = ?, updated_at = ?
                WHERE id = ? AND status NOT IN ('verified', 'already_verified')
                "#,
            )
            .bind(status.as_str())
            .bind(error_message)
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn list_sync_status(
            &self,
            status: SyncStatus,
            after_id: i64,
            limit: u32,
        ) -> StoreResult<Vec<SyncStatusRow>> {
            let rows = sqlx::query_as::<_, SyncStatusRow>(&format!(
                r#"
                SELECT {SYNC_STATUS_COLUMNS} FROM sourcify_sync
                WHERE status = ? AND id > ?
                ORDER BY id
                LIMIT ?
                "#
            ))
            .bind(status.as_str())
            .bind(after_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn fetch_push_batch(
            &self,
            cursor: i64,
            limit: u32,
            created_by: &[String],
        ) -> StoreResult<Vec<PushCandidate>> {
            if created_by.is_empty() {
                return Ok(Vec::new());
            }

            let query = format!(
                r#"
                SELECT
                    vc.id AS verified_contract_id,
                    cd.chain_id AS chain_id,
                    cd.address AS address,
                    ss.id AS sync_id,
                    ss.status AS sync_status,
                    ss.verification_id AS verification_id
                FROM verified_contracts vc
                JOIN contract_deployments cd ON cd.id = vc.deployment_id
                LEFT JOIN sourcify_sync ss ON ss.chain_id = cd.chain_id AND ss.address = cd.address
                WHERE vc.id >= ?
                  AND cd.transaction_hash IS NOT NULL
                  AND vc.created_by IN ({})
                  AND (ss.id IS NULL OR ss.status IN ('pending', 'submitted'))
                ORDER BY vc.id
                LIMIT ?
                "#,
                placeholders(created_by.len())
            );

            let mut query_builder = sqlx::query_as::<_, PushCandidate>(&query).bind(cursor);
            for tag in created_by {
                query_builder = query_builder.bind(tag);
            }
            let rows = query_builder
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Content-addressed bytecode
CREATE TABLE IF NOT EXISTS code (
    code_hash BLOB PRIMARY KEY,
    code_hash_keccak BLOB NOT NULL,
    code BLOB
);
CREATE INDEX IF NOT EXISTS idx_code_hash_keccak ON code(code_hash_keccak);

CREATE TABLE IF NOT EXISTS contracts (
    id BLOB PRIMARY KEY,
    creation_code_hash BLOB REFERENCES code(code_hash),
    runtime_code_hash BLOB NOT NULL REFERENCES code(code_hash)
);
-- A missing creation code is one key value, not a distinct NULL per row
CREATE UNIQUE INDEX IF NOT EXISTS idx_contracts_code_pair
    ON contracts(ifnull(creation_code_hash, x''), runtime_code_hash);

CREATE TABLE IF NOT EXISTS contract_deployments (
    id BLOB PRIMARY KEY,
    chain_id INTEGER NOT NULL,
    address BLOB NOT NULL,
    transaction_hash BLOB,
    block_number INTEGER,
    transaction_index INTEGER,
    deployer BLOB,
    contract_id BLOB NOT NULL REFERENCES contracts(id)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_contract_deployments_location
    ON contract_deployments(chain_id, address, ifnull(transaction_hash, x''));
CREATE INDEX IF NOT EXISTS idx_contract_deployments_contract ON contract_deployments(contract_id);

CREATE TABLE IF NOT EXISTS compiled_contracts (
    id BLOB PRIMARY KEY,
    compiler TEXT NOT NULL,
    version TEXT NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    fully_qualified_name TEXT NOT NULL,
    compiler_settings TEXT NOT NULL,
    compilation_artifacts TEXT NOT NULL,
    creation_code_hash BLOB REFERENCES code(code_hash),
    creation_code_artifacts TEXT NOT NULL,
    runtime_code_hash BLOB NOT NULL REFERENCES code(code_hash),
    runtime_code_artifacts TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_compiled_contracts_code_pair
    ON compiled_contracts(compiler, language, ifnull(creation_code_hash, x''), runtime_code_hash);

CREATE TABLE IF NOT EXISTS sources (
    source_hash BLOB PRIMARY KEY,
    source_hash_keccak BLOB NOT NULL,
    content TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS compiled_contracts_sources (
    id BLOB PRIMARY KEY,
    compilation_id BLOB NOT NULL REFERENCES compiled_contracts(id),
    source_hash BLOB NOT NULL REFERENCES sources(source_hash),
    path TEXT NOT NULL,
    UNIQUE (compilation_id, path)
);

CREATE TABLE IF NOT EXISTS verified_contracts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    deployment_id BLOB NOT NULL REFERENCES contract_deployments(id),
    compilation_id BLOB NOT NULL REFERENCES compiled_contracts(id),
    creation_match BOOLEAN NOT NULL,
    creation_values TEXT,
    creation_transformations TEXT,
    creation_metadata_match BOOLEAN,
    runtime_match BOOLEAN NOT NULL,
    runtime_values TEXT,
    runtime_transformations TEXT,
    runtime_metadata_match BOOLEAN,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    UNIQUE (compilation_id, deployment_id)
);
CREATE INDEX IF NOT EXISTS idx_verified_contracts_deployment ON verified_contracts(deployment_id);

-- Engine-owned external verification state
CREATE TABLE IF NOT EXISTS sourcify_sync (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chain_id INTEGER NOT NULL,
    address BLOB NOT NULL,
    verification_id TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (chain_id, address)
);
CREATE INDEX IF NOT EXISTS idx_sourcify_sync_status ON sourcify_sync(status, id);
"#;
