//! Schema and guard triggers
//!
//! The whole persisted layout lives here: tables with their CHECK
//! constraints, unique indexes, and the guard trigger set that makes the
//! append-only tables append-only for every writer, not just well-behaved
//! ones. `migrate` is idempotent; it can run on every startup.
//!
//! Guard triggers are listed by name so the privileged admin handle can
//! drop and recreate them (tamper testing). The runtime principal has no
//! path that executes DDL.

use crate::error::StoreError;
use sqlx::SqlitePool;

pub(crate) const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        account_id TEXT PRIMARY KEY,
        label      TEXT NOT NULL CHECK (length(trim(label)) > 0),
        currency   TEXT NOT NULL CHECK (currency GLOB '[A-Z][A-Z][A-Z]'),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_alias (
        alias      TEXT PRIMARY KEY CHECK (length(trim(alias)) > 0),
        account_id TEXT NOT NULL REFERENCES accounts(account_id),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS idempotency (
        key           TEXT PRIMARY KEY CHECK (length(trim(key)) > 0),
        request_hash  TEXT NOT NULL CHECK (length(request_hash) = 64),
        status        TEXT NOT NULL CHECK (status IN ('RESERVED', 'COMMITTED')),
        tx_id         TEXT,
        response_json TEXT,
        created_at    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_tx (
        tx_id           TEXT PRIMARY KEY,
        external_ref    TEXT NOT NULL UNIQUE CHECK (length(trim(external_ref)) > 0),
        correlation_id  TEXT NOT NULL CHECK (length(trim(correlation_id)) > 0),
        idempotency_key TEXT NOT NULL UNIQUE REFERENCES idempotency(key),
        created_at      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entry (
        entry_id     TEXT PRIMARY KEY,
        tx_id        TEXT NOT NULL REFERENCES ledger_tx(tx_id),
        account_id   TEXT NOT NULL REFERENCES accounts(account_id),
        direction    TEXT NOT NULL CHECK (direction IN ('DEBIT', 'CREDIT')),
        amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
        currency     TEXT NOT NULL CHECK (currency GLOB '[A-Z][A-Z][A-Z]'),
        created_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_entry_account
        ON ledger_entry(account_id, direction)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_entry_tx
        ON ledger_entry(tx_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_log (
        seq               INTEGER PRIMARY KEY,
        event_id          TEXT NOT NULL UNIQUE,
        event_type        TEXT NOT NULL CHECK (length(trim(event_type)) > 0),
        aggregate_type    TEXT NOT NULL CHECK (length(trim(aggregate_type)) > 0),
        aggregate_id      TEXT NOT NULL CHECK (length(trim(aggregate_id)) > 0),
        correlation_id    TEXT NOT NULL CHECK (length(trim(correlation_id)) > 0),
        payload_json      TEXT NOT NULL,
        payload_canonical TEXT NOT NULL CHECK (length(payload_canonical) > 0),
        payload_hash      BLOB NOT NULL CHECK (length(payload_hash) = 32),
        prev_hash         BLOB NOT NULL,
        hash              BLOB NOT NULL CHECK (length(hash) = 32),
        created_at        TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chain_head (
        id        INTEGER PRIMARY KEY CHECK (id = 0),
        last_seq  INTEGER NOT NULL,
        last_hash BLOB NOT NULL
    )
    "#,
    r#"
    INSERT OR IGNORE INTO chain_head(id, last_seq, last_hash) VALUES (0, 0, x'')
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS valuation_snapshot (
        snapshot_id              TEXT PRIMARY KEY,
        ingestion_correlation_id TEXT NOT NULL CHECK (length(trim(ingestion_correlation_id)) > 0),
        asset_type               TEXT NOT NULL CHECK (length(trim(asset_type)) > 0),
        asset_id                 TEXT NOT NULL CHECK (length(trim(asset_id)) > 0),
        as_of                    TEXT NOT NULL,
        price                    TEXT NOT NULL,
        currency                 TEXT NOT NULL CHECK (currency GLOB '[A-Z][A-Z][A-Z]'),
        source                   TEXT NOT NULL CHECK (length(trim(source)) > 0),
        confidence               INTEGER NOT NULL CHECK (confidence BETWEEN 0 AND 100),
        payload_json             TEXT NOT NULL,
        payload_canonical        TEXT NOT NULL CHECK (length(payload_canonical) > 0),
        payload_hash             BLOB NOT NULL CHECK (length(payload_hash) = 32),
        created_at               TEXT NOT NULL,
        UNIQUE (asset_type, asset_id, as_of, source, payload_hash)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS liquidity_snapshot (
        snapshot_id              TEXT PRIMARY KEY,
        ingestion_correlation_id TEXT NOT NULL CHECK (length(trim(ingestion_correlation_id)) > 0),
        asset_type               TEXT NOT NULL CHECK (length(trim(asset_type)) > 0),
        asset_id                 TEXT NOT NULL CHECK (length(trim(asset_id)) > 0),
        as_of                    TEXT NOT NULL,
        haircut_bps              INTEGER NOT NULL CHECK (haircut_bps BETWEEN 0 AND 10000),
        time_to_cash_seconds     INTEGER NOT NULL CHECK (time_to_cash_seconds >= 0),
        source                   TEXT NOT NULL CHECK (length(trim(source)) > 0),
        payload_json             TEXT NOT NULL,
        payload_canonical        TEXT NOT NULL CHECK (length(payload_canonical) > 0),
        payload_hash             BLOB NOT NULL CHECK (length(payload_hash) = 32),
        created_at               TEXT NOT NULL,
        UNIQUE (asset_type, asset_id, as_of, source, payload_hash)
    )
    "#,
];

/// Guard trigger set: (name, DDL). Names are what `drop_guards` removes.
pub(crate) const GUARD_TRIGGERS: &[(&str, &str)] = &[
    (
        "guard_accounts_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_accounts_no_update
           BEFORE UPDATE ON accounts
           BEGIN SELECT RAISE(ABORT, 'accounts is append-only'); END"#,
    ),
    (
        "guard_accounts_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_accounts_no_delete
           BEFORE DELETE ON accounts
           BEGIN SELECT RAISE(ABORT, 'accounts is append-only'); END"#,
    ),
    (
        "guard_account_alias_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_account_alias_no_update
           BEFORE UPDATE ON account_alias
           BEGIN SELECT RAISE(ABORT, 'account_alias is append-only'); END"#,
    ),
    (
        "guard_account_alias_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_account_alias_no_delete
           BEFORE DELETE ON account_alias
           BEGIN SELECT RAISE(ABORT, 'account_alias is append-only'); END"#,
    ),
    (
        "guard_ledger_tx_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_ledger_tx_no_update
           BEFORE UPDATE ON ledger_tx
           BEGIN SELECT RAISE(ABORT, 'ledger_tx is append-only'); END"#,
    ),
    (
        "guard_ledger_tx_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_ledger_tx_no_delete
           BEFORE DELETE ON ledger_tx
           BEGIN SELECT RAISE(ABORT, 'ledger_tx is append-only'); END"#,
    ),
    (
        "guard_ledger_entry_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_ledger_entry_no_update
           BEFORE UPDATE ON ledger_entry
           BEGIN SELECT RAISE(ABORT, 'ledger_entry is append-only'); END"#,
    ),
    (
        "guard_ledger_entry_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_ledger_entry_no_delete
           BEFORE DELETE ON ledger_entry
           BEGIN SELECT RAISE(ABORT, 'ledger_entry is append-only'); END"#,
    ),
    (
        "guard_event_log_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_event_log_no_update
           BEFORE UPDATE ON event_log
           BEGIN SELECT RAISE(ABORT, 'event_log is append-only'); END"#,
    ),
    (
        "guard_event_log_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_event_log_no_delete
           BEFORE DELETE ON event_log
           BEGIN SELECT RAISE(ABORT, 'event_log is append-only'); END"#,
    ),
    (
        "guard_valuation_snapshot_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_valuation_snapshot_no_update
           BEFORE UPDATE ON valuation_snapshot
           BEGIN SELECT RAISE(ABORT, 'valuation_snapshot is append-only'); END"#,
    ),
    (
        "guard_valuation_snapshot_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_valuation_snapshot_no_delete
           BEFORE DELETE ON valuation_snapshot
           BEGIN SELECT RAISE(ABORT, 'valuation_snapshot is append-only'); END"#,
    ),
    (
        "guard_liquidity_snapshot_no_update",
        r#"CREATE TRIGGER IF NOT EXISTS guard_liquidity_snapshot_no_update
           BEFORE UPDATE ON liquidity_snapshot
           BEGIN SELECT RAISE(ABORT, 'liquidity_snapshot is append-only'); END"#,
    ),
    (
        "guard_liquidity_snapshot_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_liquidity_snapshot_no_delete
           BEFORE DELETE ON liquidity_snapshot
           BEGIN SELECT RAISE(ABORT, 'liquidity_snapshot is append-only'); END"#,
    ),
    (
        "guard_idempotency_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_idempotency_no_delete
           BEFORE DELETE ON idempotency
           BEGIN SELECT RAISE(ABORT, 'idempotency rows cannot be deleted'); END"#,
    ),
    (
        "guard_idempotency_frozen",
        r#"CREATE TRIGGER IF NOT EXISTS guard_idempotency_frozen
           BEFORE UPDATE ON idempotency
           FOR EACH ROW WHEN OLD.status = 'COMMITTED'
           BEGIN SELECT RAISE(ABORT, 'idempotency row is frozen once COMMITTED'); END"#,
    ),
    (
        "guard_idempotency_transition",
        r#"CREATE TRIGGER IF NOT EXISTS guard_idempotency_transition
           BEFORE UPDATE ON idempotency
           FOR EACH ROW WHEN NOT (
               OLD.status = 'RESERVED'
               AND NEW.status = 'COMMITTED'
               AND NEW.key = OLD.key
               AND NEW.request_hash = OLD.request_hash
               AND NEW.created_at = OLD.created_at
               AND NEW.tx_id IS NOT NULL
               AND NEW.response_json IS NOT NULL
           )
           BEGIN SELECT RAISE(ABORT, 'idempotency transition must be RESERVED -> COMMITTED with bound tx'); END"#,
    ),
    (
        "guard_chain_head_no_delete",
        r#"CREATE TRIGGER IF NOT EXISTS guard_chain_head_no_delete
           BEFORE DELETE ON chain_head
           BEGIN SELECT RAISE(ABORT, 'chain head cannot be deleted'); END"#,
    ),
    (
        "guard_chain_head_monotonic",
        r#"CREATE TRIGGER IF NOT EXISTS guard_chain_head_monotonic
           BEFORE UPDATE ON chain_head
           FOR EACH ROW WHEN NEW.last_seq <> OLD.last_seq + 1
           BEGIN SELECT RAISE(ABORT, 'chain head must advance by exactly one'); END"#,
    ),
];

/// Apply the full schema. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    create_guards(pool).await?;
    tracing::info!("schema migrated");
    Ok(())
}

pub(crate) async fn create_guards(pool: &SqlitePool) -> Result<(), StoreError> {
    for (_, ddl) in GUARD_TRIGGERS {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

pub(crate) async fn drop_guards(pool: &SqlitePool) -> Result<(), StoreError> {
    for (name, _) in GUARD_TRIGGERS {
        sqlx::query(&format!("DROP TRIGGER IF EXISTS {}", name))
            .execute(pool)
            .await?;
    }
    Ok(())
}
