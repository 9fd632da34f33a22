use crate::errors::{DatabaseError, Result};
use rusqlite::Connection;

/// Initialize the database schema
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    // Enable WAL mode and foreign keys
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    log::info!("Creating database schema...");

    // Create all objects at once
    conn.execute_batch(FULL_SCHEMA)
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    log::info!("Database schema created successfully");
    Ok(())
}

// Complete database schema - all tables, indexes and views
const FULL_SCHEMA: &str = r#"
-- Stock tracking database schema
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys = ON;

-- Registered stocks, one row per ticker
CREATE TABLE IF NOT EXISTS stocks (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol       TEXT NOT NULL UNIQUE,   -- ticker, stored uppercase
    name         TEXT NOT NULL,          -- company name
    created_at   INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))  -- epoch seconds
);

-- Daily OHLCV bars, one row per stock per trading day
CREATE TABLE IF NOT EXISTS stock_prices (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    stock_id      INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
    date          DATE NOT NULL,         -- ISO-8601 (YYYY-MM-DD)
    opening_price REAL NOT NULL,
    closing_price REAL NOT NULL,
    highest_price REAL NOT NULL,
    lowest_price  REAL NOT NULL,
    volume        INTEGER NOT NULL,      -- shares traded
    recorded_at   INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(stock_id, date)
);

-- User portfolios
CREATE TABLE IF NOT EXISTS portfolios (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL,
    created_at   INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Holdings, one row per (portfolio, stock) pair
CREATE TABLE IF NOT EXISTS portfolio_stocks (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id   INTEGER NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
    stock_id       INTEGER NOT NULL REFERENCES stocks(id) ON DELETE CASCADE,
    quantity       INTEGER NOT NULL DEFAULT 1,
    purchase_price REAL NOT NULL,
    purchase_date  DATE NOT NULL,
    added_at       INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(portfolio_id, stock_id)
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_stock_prices_date ON stock_prices(date);
CREATE INDEX IF NOT EXISTS idx_stock_prices_stock ON stock_prices(stock_id);
CREATE INDEX IF NOT EXISTS idx_portfolio_stocks_portfolio ON portfolio_stocks(portfolio_id);
CREATE INDEX IF NOT EXISTS idx_portfolio_stocks_stock ON portfolio_stocks(stock_id);

-- ========== VIEWS ==========

-- Holdings joined with their portfolio and stock rows
CREATE VIEW IF NOT EXISTS v_portfolio_details AS
SELECT
    p.id   AS portfolio_id,
    p.name AS portfolio_name,
    s.symbol,
    s.name AS stock_name,
    ps.quantity,
    ps.purchase_price,
    ps.purchase_date
FROM portfolios p
JOIN portfolio_stocks ps ON ps.portfolio_id = p.id
JOIN stocks s ON s.id = ps.stock_id;
"#;
