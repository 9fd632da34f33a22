#[cfg(test)]
mod portfolio_tests {
    use chrono::NaiveDate;
    use stocktrack_db::{Database, DatabaseError, StockPriceInput};
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("bad test date")
    }

    /// Helper to build a daily bar for tests
    fn sample_bar(date: &str, open: f64, close: f64, high: f64, low: f64, volume: i64) -> StockPriceInput {
        StockPriceInput {
            date: d(date),
            opening_price: open,
            closing_price: close,
            highest_price: high,
            lowest_price: low,
            volume,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("stocks.db");

        let db = Database::open_at_path(db_path.clone())
            .await
            .expect("first open failed");
        let stock = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        drop(db);

        // Re-opening re-applies the schema against existing objects
        let db = Database::open_at_path(db_path)
            .await
            .expect("second open failed");
        let found = db.get_stock(stock.id).await.unwrap();
        assert_eq!(found.symbol, "AAPL");
        assert_eq!(db.list_stocks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_price_upserts_instead_of_duplicating() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("AAPL", "Apple Inc.").await.unwrap();

        db.record_price(stock.id, sample_bar("2024-01-02", 185.0, 186.5, 187.0, 184.5, 50_000_000))
            .await
            .unwrap();

        // Second recording for the same day overwrites the first
        let second = db
            .record_price(stock.id, sample_bar("2024-01-02", 185.5, 188.0, 188.5, 185.0, 61_000_000))
            .await
            .unwrap();
        assert_eq!(second.closing_price, 188.0);

        let history = db.get_price_history(stock.id, None, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].closing_price, 188.0);
        assert_eq!(history[0].volume, 61_000_000);
    }

    #[tokio::test]
    async fn test_price_history_sorted_by_date() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("TSLA", "Tesla, Inc.").await.unwrap();

        // Insert out of order
        for date in ["2024-01-04", "2024-01-02", "2024-01-03"] {
            db.record_price(stock.id, sample_bar(date, 240.0, 242.0, 243.0, 238.0, 90_000_000))
                .await
                .unwrap();
        }

        let history = db.get_price_history(stock.id, None, None).await.unwrap();
        let dates: Vec<_> = history.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d("2024-01-02"), d("2024-01-03"), d("2024-01-04")]);
    }

    #[tokio::test]
    async fn test_price_history_range_bounds_are_inclusive() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("NVDA", "NVIDIA Corporation").await.unwrap();

        for date in ["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"] {
            db.record_price(stock.id, sample_bar(date, 500.0, 505.0, 510.0, 495.0, 40_000_000))
                .await
                .unwrap();
        }

        let history = db
            .get_price_history(stock.id, Some(d("2024-01-03")), Some(d("2024-01-04")))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, d("2024-01-03"));
        assert_eq!(history[1].date, d("2024-01-04"));
    }

    #[tokio::test]
    async fn test_latest_price_picks_max_date() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("AMZN", "Amazon.com, Inc.").await.unwrap();

        db.record_price(stock.id, sample_bar("2024-01-05", 150.0, 151.0, 152.0, 149.0, 30_000_000))
            .await
            .unwrap();
        db.record_price(stock.id, sample_bar("2024-01-02", 145.0, 146.0, 147.0, 144.0, 28_000_000))
            .await
            .unwrap();

        let latest = db.get_latest_price(stock.id).await.unwrap();
        assert_eq!(latest.date, d("2024-01-05"));

        // No rows at all is a miss
        let empty = db.create_stock("META", "Meta Platforms, Inc.").await.unwrap();
        let err = db.get_latest_price(empty.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::PriceNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_stock_cascades_to_prices_and_holdings() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        let portfolio = db.create_portfolio("Growth").await.unwrap();

        db.record_price(stock.id, sample_bar("2024-01-02", 185.0, 186.5, 187.0, 184.5, 50_000_000))
            .await
            .unwrap();
        db.add_or_update_holding(portfolio.id, stock.id, 10, 186.5, d("2024-01-02"))
            .await
            .unwrap();

        db.delete_stock(stock.id).await.unwrap();

        let err = db.get_stock(stock.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::StockNotFound(_)));
        assert!(db.get_price_history(stock.id, None, None).await.unwrap().is_empty());
        assert!(db.get_portfolio_details(portfolio.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_portfolio_leaves_stock_data() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("MSFT", "Microsoft Corporation").await.unwrap();
        let portfolio = db.create_portfolio("Tech").await.unwrap();

        db.record_price(stock.id, sample_bar("2024-01-02", 370.0, 372.0, 373.0, 369.0, 20_000_000))
            .await
            .unwrap();
        db.add_or_update_holding(portfolio.id, stock.id, 5, 372.0, d("2024-01-02"))
            .await
            .unwrap();

        db.delete_portfolio(portfolio.id).await.unwrap();

        let err = db.get_portfolio(portfolio.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::PortfolioNotFound(_)));

        // Stock and its history survive
        assert!(db.get_stock(stock.id).await.is_ok());
        assert_eq!(db.get_price_history(stock.id, None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_holding_upsert_keeps_single_row() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("GOOG", "Alphabet Inc.").await.unwrap();
        let portfolio = db.create_portfolio("Core").await.unwrap();

        let first = db
            .add_or_update_holding(portfolio.id, stock.id, 10, 140.0, d("2024-01-02"))
            .await
            .unwrap();
        let second = db
            .add_or_update_holding(portfolio.id, stock.id, 25, 141.5, d("2024-01-03"))
            .await
            .unwrap();

        // Same row updated in place
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 25);
        assert_eq!(second.added_at, first.added_at);

        let details = db.get_portfolio_details(portfolio.id).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].quantity, 25);
        assert_eq!(details[0].purchase_price, 141.5);
    }

    #[tokio::test]
    async fn test_portfolio_details_joins_holdings() {
        let db = Database::new_in_memory().await.unwrap();
        let aapl = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        let msft = db.create_stock("MSFT", "Microsoft Corporation").await.unwrap();
        let portfolio = db.create_portfolio("Balanced").await.unwrap();

        db.add_or_update_holding(portfolio.id, msft.id, 5, 372.0, d("2024-01-03"))
            .await
            .unwrap();
        db.add_or_update_holding(portfolio.id, aapl.id, 10, 186.5, d("2024-01-02"))
            .await
            .unwrap();

        let details = db.get_portfolio_details(portfolio.id).await.unwrap();
        assert_eq!(details.len(), 2);

        // Ordered by symbol, with joined stock fields
        assert_eq!(details[0].symbol, "AAPL");
        assert_eq!(details[0].stock_name, "Apple Inc.");
        assert_eq!(details[0].quantity, 10);
        assert_eq!(details[1].symbol, "MSFT");
        assert_eq!(details[1].portfolio_name, "Balanced");
    }

    #[tokio::test]
    async fn test_retirement_scenario() {
        let db = Database::new_in_memory().await.unwrap();

        let stock = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        db.record_price(stock.id, sample_bar("2024-01-02", 185.0, 186.5, 187.0, 184.5, 50_000_000))
            .await
            .unwrap();

        let portfolio = db.create_portfolio("Retirement").await.unwrap();
        db.add_or_update_holding(portfolio.id, stock.id, 10, 186.5, d("2024-01-02"))
            .await
            .unwrap();

        let details = db.get_portfolio_details(portfolio.id).await.unwrap();
        assert_eq!(details.len(), 1);
        let row = &details[0];
        assert_eq!(row.symbol, "AAPL");
        assert_eq!(row.stock_name, "Apple Inc.");
        assert_eq!(row.quantity, 10);
        assert_eq!(row.purchase_price, 186.5);
        assert_eq!(row.purchase_date, d("2024-01-02"));
    }

    #[tokio::test]
    async fn test_writes_against_unknown_parents_fail() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolio = db.create_portfolio("Solo").await.unwrap();

        let err = db
            .record_price(9999, sample_bar("2024-01-02", 1.0, 1.0, 1.0, 1.0, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingReference(_)));

        let err = db
            .add_or_update_holding(portfolio.id, 9999, 1, 10.0, d("2024-01-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingReference(_)));

        let err = db
            .add_or_update_holding(9999, 9999, 1, 10.0, d("2024-01-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingReference(_)));
    }

    #[tokio::test]
    async fn test_domain_validation() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("IBM", "International Business Machines").await.unwrap();
        let portfolio = db.create_portfolio("Value").await.unwrap();

        let err = db.create_stock("", "Nameless").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));

        let err = db
            .record_price(stock.id, sample_bar("2024-01-02", 1.0, 1.0, 1.0, 1.0, -5))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));

        let err = db
            .add_or_update_holding(portfolio.id, stock.id, 0, 10.0, d("2024-01-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_remove_holding() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("ORCL", "Oracle Corporation").await.unwrap();
        let portfolio = db.create_portfolio("Legacy").await.unwrap();

        db.add_or_update_holding(portfolio.id, stock.id, 3, 110.0, d("2024-01-02"))
            .await
            .unwrap();
        db.remove_holding(portfolio.id, stock.id).await.unwrap();
        assert!(db.get_portfolio_details(portfolio.id).await.unwrap().is_empty());

        // Removing again is a miss
        let err = db.remove_holding(portfolio.id, stock.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::HoldingNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_stock_rechecks_uniqueness() {
        let db = Database::new_in_memory().await.unwrap();
        let a = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        db.create_stock("MSFT", "Microsoft Corporation").await.unwrap();

        let renamed = db.update_stock(a.id, "AAPL", "Apple").await.unwrap();
        assert_eq!(renamed.name, "Apple");

        let err = db.update_stock(a.id, "MSFT", "Apple").await.unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_detail_rows_serialize_for_api_consumers() {
        let db = Database::new_in_memory().await.unwrap();
        let stock = db.create_stock("AAPL", "Apple Inc.").await.unwrap();
        let portfolio = db.create_portfolio("Retirement").await.unwrap();
        db.add_or_update_holding(portfolio.id, stock.id, 10, 186.5, d("2024-01-02"))
            .await
            .unwrap();

        let details = db.get_portfolio_details(portfolio.id).await.unwrap();
        let json = serde_json::to_value(&details[0]).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["stock_name"], "Apple Inc.");
        assert_eq!(json["quantity"], 10);
        assert_eq!(json["purchase_date"], "2024-01-02");
    }
}
