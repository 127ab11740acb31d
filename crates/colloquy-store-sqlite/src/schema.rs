//! SQL schema for the Colloquy SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS chats (
    owner       TEXT NOT NULL,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'AI' | 'Single' | 'Group'
    user        TEXT NOT NULL,
    model       TEXT,            -- bound model backend, NULL = default
    PRIMARY KEY (owner, name)
);

CREATE TABLE IF NOT EXISTS messages (
    owner          TEXT NOT NULL,
    name           TEXT NOT NULL,
    created_at     TEXT NOT NULL,   -- RFC 3339 UTC, fixed millisecond width
    user           TEXT NOT NULL,
    chat           TEXT NOT NULL,
    author         TEXT NOT NULL,   -- user name or 'AI'
    reply_to       TEXT,            -- 'owner/name' | 'Welcome' | NULL
    text           TEXT NOT NULL DEFAULT '',
    vector_scores  TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (owner, name)
);

CREATE TABLE IF NOT EXISTS stores (
    owner            TEXT NOT NULL,
    name             TEXT NOT NULL,
    is_default       INTEGER NOT NULL DEFAULT 0,
    welcome          TEXT NOT NULL DEFAULT '',
    prompt           TEXT NOT NULL DEFAULT '',
    memory_limit     INTEGER NOT NULL,
    limit_minutes    INTEGER NOT NULL,
    frequency        INTEGER NOT NULL,
    knowledge_limit  INTEGER NOT NULL,
    PRIMARY KEY (owner, name)
);

CREATE TABLE IF NOT EXISTS knowledge (
    id          TEXT PRIMARY KEY,
    scope       TEXT NOT NULL,
    text        TEXT NOT NULL,
    embedding   TEXT NOT NULL,   -- JSON array of f32
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_chat_idx   ON messages(owner, chat, created_at);
CREATE INDEX IF NOT EXISTS messages_author_idx ON messages(author, created_at);
CREATE INDEX IF NOT EXISTS knowledge_scope_idx ON knowledge(scope);

PRAGMA user_version = 1;
";
