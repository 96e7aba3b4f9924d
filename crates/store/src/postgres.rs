//! PostgreSQL-based contract store implementation.

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::repos::{NotificationFeed, ReplicaRepo, SourceRepo, SyncStatusRepo};
use crate::store::ContractStore;
use async_trait::async_trait;
use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgListener, PgPoolOptions, PgSslMode as SqlxPgSslMode,
};
use sqlx::{Pool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;
use versync_core::SyncStatus;
use versync_core::config::PgSslMode;

/// Contract schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// Engine-owned sync status table, created by `migrate`.
const SYNC_STATUS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sourcify_sync (
    id bigserial PRIMARY KEY,
    chain_id numeric NOT NULL,
    address bytea NOT NULL,
    verification_id varchar,
    status varchar NOT NULL DEFAULT 'pending',
    error_message text,
    attempts integer NOT NULL DEFAULT 0,
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now(),
    CONSTRAINT sourcify_sync_pseudo_pkey UNIQUE (chain_id, address)
);
CREATE INDEX IF NOT EXISTS sourcify_sync_status ON sourcify_sync (status, id);
"#;

/// Trigger announcing new verified contracts. Function bodies contain `;`,
/// so these are executed one by one instead of being split.
const NOTIFY_TRIGGER: [&str; 3] = [
    r#"CREATE OR REPLACE FUNCTION notify_new_verified_contract() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('new_verified_contract', json_build_object(
        'id', NEW.id,
        'created_by', NEW.created_by,
        'deployment_id', NEW.deployment_id,
        'compilation_id', NEW.compilation_id
    )::text);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql"#,
    "DROP TRIGGER IF EXISTS new_verified_contract ON verified_contracts",
    r#"CREATE TRIGGER new_verified_contract AFTER INSERT ON verified_contracts
    FOR EACH ROW EXECUTE FUNCTION notify_new_verified_contract()"#,
];

const SYNC_STATUS_COLUMNS: &str = "id, chain_id::bigint AS chain_id, address, verification_id, \
     status, error_message, attempts, created_at, updated_at";

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
    cd.chain_id::bigint AS cd_chain_id,
    cd.address AS cd_address,
    cd.transaction_hash AS cd_transaction_hash,
    cd.block_number::bigint AS cd_block_number,
    cd.transaction_index::bigint AS cd_transaction_index,
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
WHERE vc.id = $1
"#;

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based contract store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    schema: String,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        schema: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, schema, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, e.g. the password via
    /// an environment variable.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        schema: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            schema = schema,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, schema, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        schema: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        // Tables are addressed unqualified; the schema comes from search_path.
        opts = opts.options([("search_path", schema)]);
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            schema: schema.to_string(),
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Create the contract tables and the notification trigger.
    ///
    /// Production stores are provisioned elsewhere; this is for fresh
    /// deployments and tests.
    pub async fn install_schema(&self) -> StoreResult<()> {
        // The name was validated as a plain identifier when the config loaded.
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema))
            .execute(&self.pool)
            .await?;
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        for statement in NOTIFY_TRIGGER {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContractStore for PostgresStore {
    async fn migrate(&self) -> StoreResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(SYNC_STATUS_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Box<dyn NotificationFeed>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(channel).await?;
        tracing::info!(channel = channel, "Subscribed to notification channel");
        Ok(Box::new(PgNotificationFeed { listener }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Notification feed over a dedicated `LISTEN` connection.
///
/// `PgListener` reconnects and re-listens on its own when the connection
/// drops; notifications sent while disconnected are lost.
pub struct PgNotificationFeed {
    listener: PgListener,
}

#[async_trait]
impl NotificationFeed for PgNotificationFeed {
    async fn recv(&mut self) -> StoreResult<String> {
        let notification = self.listener.recv().await?;
        Ok(notification.payload().to_string())
    }

    async fn close(&mut self) -> StoreResult<()> {
        self.listener.unlisten_all().await?;
        Ok(())
    }
}

// =============================================================================
// Connection-level writes shared by the upserts and `replicate`
// =============================================================================

async fn insert_codes(conn: &mut PgConnection, codes: &[CodeRow]) -> StoreResult<u64> {
    if codes.is_empty() {
        return Ok(0);
    }
    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO code (code_hash, code_hash_keccak, code) ");
    builder.push_values(codes, |mut row, code| {
        row.push_bind(&code.code_hash)
            .push_bind(&code.code_hash_keccak)
            .push_bind(&code.code);
    });
    builder.push(" ON CONFLICT (code_hash) DO NOTHING");
    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

async fn insert_sources(conn: &mut PgConnection, sources: &[SourceRow]) -> StoreResult<u64> {
    if sources.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO sources (source_hash, source_hash_keccak, content) ",
    );
    builder.push_values(sources, |mut row, source| {
        row.push_bind(&source.source_hash)
            .push_bind(&source.source_hash_keccak)
            .push_bind(&source.content);
    });
    builder.push(" ON CONFLICT (source_hash) DO NOTHING");
    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

async fn upsert_contract_on(conn: &mut PgConnection, contract: &ContractRow) -> StoreResult<Uuid> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO contracts (id, creation_code_hash, runtime_code_hash)
        VALUES ($1, $2, $3)
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
        "SELECT id FROM contracts \
         WHERE creation_code_hash IS NOT DISTINCT FROM $1 AND runtime_code_hash = $2",
    )
    .bind(&contract.creation_code_hash)
    .bind(&contract.runtime_code_hash)
    .fetch_optional(&mut *conn)
    .await?;
    existing.ok_or_else(|| StoreError::NotFound("contract by code hashes".to_string()))
}

async fn upsert_deployment_on(
    conn: &mut PgConnection,
    deployment: &DeploymentRow,
) -> StoreResult<Uuid> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO contract_deployments
            (id, chain_id, address, transaction_hash, block_number, transaction_index, deployer, contract_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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
        WHERE chain_id = $1 AND address = $2 AND transaction_hash IS NOT DISTINCT FROM $3
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
    conn: &mut PgConnection,
    compilation: &CompilationRow,
) -> StoreResult<Uuid> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO compiled_contracts
            (id, compiler, version, language, name, fully_qualified_name, compiler_settings,
             compilation_artifacts, creation_code_hash, creation_code_artifacts,
             runtime_code_hash, runtime_code_artifacts)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
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
        WHERE compiler = $1 AND language = $2
          AND creation_code_hash IS NOT DISTINCT FROM $3 AND runtime_code_hash = $4
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
    conn: &mut PgConnection,
    compilation_id: Uuid,
    sources: &[CompilationSourceRow],
) -> StoreResult<()> {
    if sources.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO compiled_contracts_sources (id, compilation_id, source_hash, path) ",
    );
    builder.push_values(sources, |mut row, source| {
        row.push_bind(Uuid::new_v4())
            .push_bind(compilation_id)
            .push_bind(&source.source_hash)
            .push_bind(&source.path);
    });
    builder.push(" ON CONFLICT (compilation_id, path) DO NOTHING");
    builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl SourceRepo for PostgresStore {
    async fn fetch_code_by_hash(&self, code_hash: &[u8]) -> StoreResult<Option<CodeRow>> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT code_hash, code_hash_keccak, code FROM code WHERE code_hash = $1",
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
        if code_hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<CodeRow> = sqlx::query_as::<_, CodeRow>(
            "SELECT code_hash, code_hash_keccak, code FROM code WHERE code_hash = ANY($1)",
        )
        .bind(code_hashes)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.code_hash.clone(), row))
            .collect())
    }

    async fn fetch_sources_by_hashes(
        &self,
        source_hashes: &[Vec<u8>],
    ) -> StoreResult<HashMap<Vec<u8>, String>> {
        if source_hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Vec<u8>, String)> = sqlx::query_as(
            "SELECT source_hash, content FROM sources WHERE source_hash = ANY($1)",
        )
        .bind(source_hashes)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
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
            WHERE ccs.compilation_id = $1
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
        let rows = sqlx::query_as::<_, VerifiedContractRow>(&format!(
            r#"
            SELECT {VERIFIED_CONTRACT_COLUMNS}
            FROM verified_contracts vc
            JOIN contract_deployments cd ON cd.id = vc.deployment_id
            WHERE vc.id >= $1
              AND cd.transaction_hash IS NOT NULL
              AND vc.created_by = ANY($2)
            ORDER BY vc.id
            LIMIT $3
            "#
        ))
        .bind(cursor)
        .bind(created_by)
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
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT vc.id
            FROM verified_contracts vc
            JOIN contract_deployments cd ON cd.id = vc.deployment_id
            WHERE cd.chain_id = $1 AND cd.address = $2
              AND vc.created_by = ANY($3)
            ORDER BY vc.id DESC
            LIMIT 1
            "#,
        )
        .bind(chain_id)
        .bind(address)
        .bind(created_by)
        .fetch_optional(&self.pool)
        .await?;
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
impl ReplicaRepo for PostgresStore {
    async fn upsert_codes(&self, codes: &[CodeRow]) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        insert_codes(&mut conn, codes).await
    }

    async fn upsert_sources(&self, sources: &[SourceRow]) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        insert_sources(&mut conn, sources).await
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
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
impl SyncStatusRepo for PostgresStore {
    async fn get_sync_status(
        &self,
        chain_id: i64,
        address: &[u8],
    ) -> StoreResult<Option<SyncStatusRow>> {
        let row = sqlx::query_as::<_, SyncStatusRow>(&format!(
            "SELECT {SYNC_STATUS_COLUMNS} FROM sourcify_sync WHERE chain_id = $1 AND address = $2"
        ))
        .bind(chain_id)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn record_sync_status(&self, update: &SyncStatusUpdate) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sourcify_sync
                (chain_id, address, verification_id, status, error_message, attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (chain_id, address) DO UPDATE SET
                verification_id = COALESCE(EXCLUDED.verification_id, sourcify_sync.verification_id),
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                attempts = sourcify_sync.attempts + EXCLUDED.attempts,
                updated_at = EXCLUDED.updated_at
            WHERE sourcify_sync.status NOT IN ('verified', 'already_verified')
            "#,
        )
        .bind(update.chain_id)
        .bind(&update.address)
        .bind(&update.verification_id)
        .bind(update.status.as_str())
        .bind(&update.error_message)
        .bind(i32::from(update.counts_attempt))
        .bind(OffsetDateTime::now_utc())
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
            SET status = $1, error_message = $2, updated_at = $3
            WHERE id = $4 AND status NOT IN ('verified', 'already_verified')
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
            WHERE status = $1 AND id > $2
            ORDER BY id
            LIMIT $3
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
        let rows = sqlx::query_as::<_, PushCandidate>(
            r#"
            SELECT
                vc.id AS verified_contract_id,
                cd.chain_id::bigint AS chain_id,
                cd.address,
                ss.id AS sync_id,
                ss.status AS sync_status,
                ss.verification_id
            FROM verified_contracts vc
            JOIN contract_deployments cd ON cd.id = vc.deployment_id
            LEFT JOIN sourcify_sync ss ON ss.chain_id = cd.chain_id AND ss.address = cd.address
            WHERE vc.id >= $1
              AND cd.transaction_hash IS NOT NULL
              AND vc.created_by = ANY($2)
              AND (ss.id IS NULL OR ss.status IN ('pending', 'submitted'))
            ORDER BY vc.id
            LIMIT $3
            "#,
        )
        .bind(cursor)
        .bind(created_by)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_cover_contract_tables() {
        let statements = postgres_schema_statements(POSTGRES_SCHEMA);
        assert!(
            statements
                .iter()
                .any(|s| s.contains("CREATE TABLE IF NOT EXISTS verified_contracts"))
        );
        assert!(
            !statements
                .iter()
                .any(|s| s.lines().all(|line| line.trim().starts_with("--")))
        );
    }

    #[test]
    fn test_sync_status_schema_splits_into_two_statements() {
        let statements = postgres_schema_statements(SYNC_STATUS_SCHEMA);
        assert_eq!(statements.len(), 2);
    }
}
