use crate::errors::{DatabaseError, Result};
use crate::migrations::apply_migrations;
use crate::types::{Holding, Portfolio, PortfolioDetail, Stock, StockPrice, StockPriceInput};
use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Main database manager
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Create a new database instance at the default path
    pub async fn new() -> Result<Self> {
        let path = crate::get_database_path();
        let db = Self::open_at_path(path).await?;
        Ok(db)
    }

    /// Create a database instance at a specific path
    pub async fn open_at_path(path: PathBuf) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Opening database at: {:?}", path);

        // Open connection with proper flags
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        // Apply migrations
        if let Err(e) = apply_migrations(&conn) {
            log::error!("Failed to apply migrations: {}", e);
            return Err(e);
        }

        let db = Database {
            connection: Arc::new(Mutex::new(conn)),
            path,
        };

        log::info!("Database initialized successfully");
        Ok(db)
    }

    /// Create an in-memory database instance for testing
    pub async fn new_in_memory() -> Result<Self> {
        log::info!("Creating in-memory database for testing");

        let conn = Connection::open_in_memory()?;

        if let Err(e) = apply_migrations(&conn) {
            log::error!("Failed to apply migrations to in-memory database: {}", e);
            return Err(e);
        }

        let db = Database {
            connection: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };

        Ok(db)
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Health check - ensure database is accessible
    pub async fn health_check(&self) -> Result<()> {
        let conn = self.connection.lock().await;
        match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("Health check failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Execute a closure with database connection
    pub async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let conn = self.connection.lock().await;
        f(&*conn)
    }

    /// Execute a transaction
    pub async fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send,
        R: Send,
    {
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction()?;

        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Get current UNIX timestamp
    pub fn current_timestamp() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    // ========== Stock Methods ==========

    /// Register a stock. The symbol is trimmed and stored uppercase;
    /// registering an already-known symbol fails with `DuplicateKey`.
    pub async fn create_stock(&self, symbol: &str, name: &str) -> Result<Stock> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DatabaseError::Validation(
                "stock symbol must not be empty".to_string(),
            ));
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DatabaseError::Validation(
                "stock name must not be empty".to_string(),
            ));
        }

        let now = Self::current_timestamp();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO stocks (symbol, name, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![symbol, name, now],
            )?;
            let id = conn.last_insert_rowid();

            log::info!("Registered stock {} (id {})", symbol, id);
            Ok(Stock {
                id,
                symbol,
                name,
                created_at: now,
            })
        })
        .await
    }

    /// Get a stock by its id
    pub async fn get_stock(&self, stock_id: i64) -> Result<Stock> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, name, created_at FROM stocks WHERE id = ?1",
            )?;
            let stock = stmt
                .query_row([stock_id], map_stock)
                .optional()?
                .ok_or_else(|| DatabaseError::StockNotFound(stock_id.to_string()))?;
            Ok(stock)
        })
        .await
    }

    /// Get a stock by its ticker symbol (case-insensitive)
    pub async fn get_stock_by_symbol(&self, symbol: &str) -> Result<Stock> {
        let symbol = symbol.trim().to_uppercase();

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, name, created_at FROM stocks WHERE symbol = ?1",
            )?;
            let stock = stmt
                .query_row([&symbol], map_stock)
                .optional()?
                .ok_or(DatabaseError::StockNotFound(symbol))?;
            Ok(stock)
        })
        .await
    }

    /// List all stocks, ordered by symbol
    pub async fn list_stocks(&self) -> Result<Vec<Stock>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, name, created_at FROM stocks ORDER BY symbol",
            )?;
            let stocks = stmt
                .query_map([], map_stock)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(stocks)
        })
        .await
    }

    /// Update a stock's symbol and name. Uniqueness of the new symbol is
    /// re-checked by the store and surfaces as `DuplicateKey`.
    pub async fn update_stock(&self, stock_id: i64, symbol: &str, name: &str) -> Result<Stock> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DatabaseError::Validation(
                "stock symbol must not be empty".to_string(),
            ));
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DatabaseError::Validation(
                "stock name must not be empty".to_string(),
            ));
        }

        self.with_connection(move |conn| {
            let updated = conn.execute(
                "UPDATE stocks SET symbol = ?1, name = ?2 WHERE id = ?3",
                rusqlite::params![symbol, name, stock_id],
            )?;

            if updated == 0 {
                return Err(DatabaseError::StockNotFound(stock_id.to_string()));
            }

            let mut stmt = conn.prepare(
                "SELECT id, symbol, name, created_at FROM stocks WHERE id = ?1",
            )?;
            let stock = stmt.query_row([stock_id], map_stock)?;

            log::info!("Updated stock {} (id {})", stock.symbol, stock_id);
            Ok(stock)
        })
        .await
    }

    /// Delete a stock. Price history and holdings referencing it are
    /// removed by the store's cascade rules.
    pub async fn delete_stock(&self, stock_id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let deleted = conn.execute("DELETE FROM stocks WHERE id = ?1", [stock_id])?;

            if deleted == 0 {
                return Err(DatabaseError::StockNotFound(stock_id.to_string()));
            }

            log::info!("Deleted stock {} and its dependent rows", stock_id);
            Ok(())
        })
        .await
    }

    // ========== Price Methods ==========

    /// Record a daily bar for a stock. Re-recording the same (stock, date)
    /// overwrites the existing row instead of failing on the unique
    /// constraint, so quote feeds can be re-ingested safely.
    pub async fn record_price(&self, stock_id: i64, input: StockPriceInput) -> Result<StockPrice> {
        if input.volume < 0 {
            return Err(DatabaseError::Validation(format!(
                "volume must be non-negative, got {}",
                input.volume
            )));
        }

        let now = Self::current_timestamp();

        self.transaction(move |conn| {
            conn.execute(
                "INSERT INTO stock_prices (
                    stock_id, date, opening_price, closing_price,
                    highest_price, lowest_price, volume, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(stock_id, date) DO UPDATE SET
                    opening_price = excluded.opening_price,
                    closing_price = excluded.closing_price,
                    highest_price = excluded.highest_price,
                    lowest_price = excluded.lowest_price,
                    volume = excluded.volume,
                    recorded_at = excluded.recorded_at",
                rusqlite::params![
                    stock_id,
                    input.date,
                    input.opening_price,
                    input.closing_price,
                    input.highest_price,
                    input.lowest_price,
                    input.volume,
                    now
                ],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, stock_id, date, opening_price, closing_price,
                        highest_price, lowest_price, volume, recorded_at
                 FROM stock_prices
                 WHERE stock_id = ?1 AND date = ?2",
            )?;
            let price = stmt.query_row(rusqlite::params![stock_id, input.date], map_price)?;

            log::info!("Recorded price for stock {} on {}", stock_id, input.date);
            Ok(price)
        })
        .await
    }

    /// Get the price history for a stock, ordered by date ascending.
    /// Both range bounds are optional and inclusive.
    pub async fn get_price_history(
        &self,
        stock_id: i64,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<StockPrice>> {
        self.with_connection(move |conn| {
            let mut query = String::from(
                "SELECT id, stock_id, date, opening_price, closing_price,
                        highest_price, lowest_price, volume, recorded_at
                 FROM stock_prices
                 WHERE stock_id = ?",
            );
            let mut params: Vec<&dyn ToSql> = vec![&stock_id];

            if let Some(ref start) = start_date {
                query.push_str(" AND date >= ?");
                params.push(start);
            }

            if let Some(ref end) = end_date {
                query.push_str(" AND date <= ?");
                params.push(end);
            }

            query.push_str(" ORDER BY date ASC");

            let mut stmt = conn.prepare(&query)?;
            let prices = stmt
                .query_map(&params[..], map_price)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(prices)
        })
        .await
    }

    /// Get the most recent bar recorded for a stock
    pub async fn get_latest_price(&self, stock_id: i64) -> Result<StockPrice> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, stock_id, date, opening_price, closing_price,
                        highest_price, lowest_price, volume, recorded_at
                 FROM stock_prices
                 WHERE stock_id = ?1
                 ORDER BY date DESC
                 LIMIT 1",
            )?;
            let price = stmt
                .query_row([stock_id], map_price)
                .optional()?
                .ok_or(DatabaseError::PriceNotFound(stock_id))?;
            Ok(price)
        })
        .await
    }

    // ========== Portfolio Methods ==========

    /// Create a portfolio
    pub async fn create_portfolio(&self, name: &str) -> Result<Portfolio> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DatabaseError::Validation(
                "portfolio name must not be empty".to_string(),
            ));
        }

        let now = Self::current_timestamp();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO portfolios (name, created_at) VALUES (?1, ?2)",
                rusqlite::params![name, now],
            )?;
            let id = conn.last_insert_rowid();

            log::info!("Created portfolio '{}' (id {})", name, id);
            Ok(Portfolio {
                id,
                name,
                created_at: now,
            })
        })
        .await
    }

    /// Get a portfolio by its id
    pub async fn get_portfolio(&self, portfolio_id: i64) -> Result<Portfolio> {
        self.with_connection(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM portfolios WHERE id = ?1")?;
            let portfolio = stmt
                .query_row([portfolio_id], map_portfolio)
                .optional()?
                .ok_or(DatabaseError::PortfolioNotFound(portfolio_id))?;
            Ok(portfolio)
        })
        .await
    }

    /// List all portfolios, ordered by name
    pub async fn list_portfolios(&self) -> Result<Vec<Portfolio>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, created_at FROM portfolios ORDER BY name, id")?;
            let portfolios = stmt
                .query_map([], map_portfolio)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(portfolios)
        })
        .await
    }

    /// Delete a portfolio and its holdings. Stocks and price history
    /// are left untouched.
    pub async fn delete_portfolio(&self, portfolio_id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let deleted = conn.execute("DELETE FROM portfolios WHERE id = ?1", [portfolio_id])?;

            if deleted == 0 {
                return Err(DatabaseError::PortfolioNotFound(portfolio_id));
            }

            log::info!("Deleted portfolio {} and its holdings", portfolio_id);
            Ok(())
        })
        .await
    }

    // ========== Holding Methods ==========

    /// Add a stock to a portfolio, or update the existing holding if the
    /// portfolio already holds it. `added_at` is preserved across updates.
    pub async fn add_or_update_holding(
        &self,
        portfolio_id: i64,
        stock_id: i64,
        quantity: i64,
        purchase_price: f64,
        purchase_date: NaiveDate,
    ) -> Result<Holding> {
        if quantity <= 0 {
            return Err(DatabaseError::Validation(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let now = Self::current_timestamp();

        self.transaction(move |conn| {
            conn.execute(
                "INSERT INTO portfolio_stocks (
                    portfolio_id, stock_id, quantity, purchase_price, purchase_date, added_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(portfolio_id, stock_id) DO UPDATE SET
                    quantity = excluded.quantity,
                    purchase_price = excluded.purchase_price,
                    purchase_date = excluded.purchase_date",
                rusqlite::params![
                    portfolio_id,
                    stock_id,
                    quantity,
                    purchase_price,
                    purchase_date,
                    now
                ],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, portfolio_id, stock_id, quantity, purchase_price, purchase_date, added_at
                 FROM portfolio_stocks
                 WHERE portfolio_id = ?1 AND stock_id = ?2",
            )?;
            let holding =
                stmt.query_row(rusqlite::params![portfolio_id, stock_id], map_holding)?;

            log::info!(
                "Upserted holding: portfolio {}, stock {}, quantity {}",
                portfolio_id,
                stock_id,
                quantity
            );
            Ok(holding)
        })
        .await
    }

    /// Remove a stock from a portfolio
    pub async fn remove_holding(&self, portfolio_id: i64, stock_id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM portfolio_stocks WHERE portfolio_id = ?1 AND stock_id = ?2",
                rusqlite::params![portfolio_id, stock_id],
            )?;

            if deleted == 0 {
                return Err(DatabaseError::HoldingNotFound {
                    portfolio_id,
                    stock_id,
                });
            }

            log::info!(
                "Removed holding: portfolio {}, stock {}",
                portfolio_id,
                stock_id
            );
            Ok(())
        })
        .await
    }

    /// Get the detail rows for a portfolio from the v_portfolio_details
    /// view, one per holding, ordered by symbol.
    pub async fn get_portfolio_details(&self, portfolio_id: i64) -> Result<Vec<PortfolioDetail>> {
        self.with_connection(move |conn| {
            let exists = conn
                .query_row(
                    "SELECT id FROM portfolios WHERE id = ?1",
                    [portfolio_id],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Err(DatabaseError::PortfolioNotFound(portfolio_id));
            }

            let mut stmt = conn.prepare(
                "SELECT portfolio_id, portfolio_name, symbol, stock_name,
                        quantity, purchase_price, purchase_date
                 FROM v_portfolio_details
                 WHERE portfolio_id = ?1
                 ORDER BY symbol",
            )?;
            let details = stmt
                .query_map([portfolio_id], map_detail)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(details)
        })
        .await
    }
}

// ========== Row Mappers ==========

fn map_stock(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stock> {
    Ok(Stock {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_price(row: &rusqlite::Row<'_>) -> rusqlite::Result<StockPrice> {
    Ok(StockPrice {
        id: row.get(0)?,
        stock_id: row.get(1)?,
        date: row.get(2)?,
        opening_price: row.get(3)?,
        closing_price: row.get(4)?,
        highest_price: row.get(5)?,
        lowest_price: row.get(6)?,
        volume: row.get(7)?,
        recorded_at: row.get(8)?,
    })
}

fn map_portfolio(row: &rusqlite::Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn map_holding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        id: row.get(0)?,
        portfolio_id: row.get(1)?,
        stock_id: row.get(2)?,
        quantity: row.get(3)?,
        purchase_price: row.get(4)?,
        purchase_date: row.get(5)?,
        added_at: row.get(6)?,
    })
}

fn map_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<PortfolioDetail> {
    Ok(PortfolioDetail {
        portfolio_id: row.get(0)?,
        portfolio_name: row.get(1)?,
        symbol: row.get(2)?,
        stock_name: row.get(3)?,
        quantity: row.get(4)?,
        purchase_price: row.get(5)?,
        purchase_date: row.get(6)?,
    })
}
