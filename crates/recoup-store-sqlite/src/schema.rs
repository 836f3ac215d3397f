//! SQL schema for the recoup SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS customers (
    customer_id TEXT PRIMARY KEY,
    tenant      TEXT NOT NULL,
    email       TEXT NOT NULL,   -- normalised; natural key within tenant
    upstream_id TEXT,
    first_name  TEXT,
    last_name   TEXT,
    metadata    TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (tenant, email)
);

-- Carts are never deleted. Status only moves forward; every status change
-- is a conditional UPDATE guarded on the current status.
CREATE TABLE IF NOT EXISTS carts (
    cart_id            TEXT PRIMARY KEY,
    tenant             TEXT NOT NULL,
    upstream_cart_id   TEXT NOT NULL,
    customer_id        TEXT REFERENCES customers(customer_id) ON DELETE SET NULL,
    email              TEXT,
    total              TEXT NOT NULL,   -- decimal string
    currency           TEXT NOT NULL,
    items              TEXT NOT NULL DEFAULT '[]',
    status             TEXT NOT NULL,
    metadata           TEXT NOT NULL DEFAULT '{}',
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    recovered_at       TEXT,
    recovered_order_id TEXT,
    UNIQUE (tenant, upstream_cart_id),
    CHECK  (status IN ('pending', 'abandoned', 'email_sent', 'recovered'))
);

-- Raw interaction log written by the chat collaborator.
CREATE TABLE IF NOT EXISTS interaction_sessions (
    conversation_id TEXT PRIMARY KEY,
    tenant          TEXT NOT NULL,
    customer_email  TEXT,
    status          TEXT NOT NULL,
    summary         TEXT,
    transcript      TEXT,
    metadata        TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Exactly one inquiry per conversation.
CREATE TABLE IF NOT EXISTS inquiries (
    conversation_id TEXT PRIMARY KEY,
    tenant          TEXT NOT NULL,
    customer_email  TEXT,
    cart_id         TEXT,
    cart_value      TEXT,            -- decimal string
    currency        TEXT,
    summary         TEXT NOT NULL,
    full_transcript TEXT,
    status          TEXT NOT NULL,
    response        TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS carts_recovery_idx    ON carts(tenant, email, status);
CREATE INDEX IF NOT EXISTS carts_customer_idx    ON carts(customer_id);
CREATE INDEX IF NOT EXISTS sessions_status_idx   ON interaction_sessions(status);
CREATE INDEX IF NOT EXISTS inquiries_tenant_idx  ON inquiries(tenant);

PRAGMA user_version = 1;
";
