use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ========== Stock Types ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub created_at: i64,
}

// ========== Price Types ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPrice {
    pub id: i64,
    pub stock_id: i64,
    pub date: NaiveDate,
    pub opening_price: f64,
    pub closing_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub volume: i64,
    pub recorded_at: i64,
}

/// One daily bar as supplied by the caller; the row id and `recorded_at`
/// are assigned by the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPriceInput {
    pub date: NaiveDate,
    pub opening_price: f64,
    pub closing_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub volume: i64,
}

// ========== Portfolio Types ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub id: i64,
    pub portfolio_id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    pub purchase_price: f64,
    pub purchase_date: NaiveDate,
    pub added_at: i64,
}

/// Row of the v_portfolio_details view: a holding joined with its
/// portfolio and stock rows. Never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDetail {
    pub portfolio_id: i64,
    pub portfolio_name: String,
    pub symbol: String,
    pub stock_name: String,
    pub quantity: i64,
    pub purchase_price: f64,
    pub purchase_date: NaiveDate,
}
