use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE pending_registrations (
                email           TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                password_hash   TEXT NOT NULL,
                code            TEXT NOT NULL,
                expires_at      TEXT NOT NULL
            );

            CREATE TABLE orders (
                id              TEXT PRIMARY KEY,
                trade_mode      TEXT NOT NULL,
                amount          REAL NOT NULL,
                crypto_amount   REAL NOT NULL,
                currency        TEXT NOT NULL,
                total_usd       REAL NOT NULL,
                grow_id         TEXT NOT NULL,
                world_name      TEXT NOT NULL,
                is_safe_mode    INTEGER NOT NULL DEFAULT 0,
                is_guest        INTEGER NOT NULL DEFAULT 0,
                owner_id        TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'PENDING',
                tx_hash         TEXT,
                payout_address  TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                completed_at    TEXT
            );

            CREATE INDEX idx_orders_owner ON orders(owner_id, created_at);

            CREATE TABLE order_destinations (
                order_id        TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL,
                grow_id         TEXT NOT NULL,
                world_name      TEXT NOT NULL,
                amount          REAL NOT NULL,
                PRIMARY KEY (order_id, position)
            );

            CREATE TABLE rates (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                buy_rate        REAL NOT NULL,
                sell_rate       REAL NOT NULL
            );

            CREATE TABLE wallets (
                currency        TEXT PRIMARY KEY,
                address         TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE settings (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL
            );

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                role            TEXT NOT NULL,
                text            TEXT NOT NULL,
                user_id         TEXT NOT NULL,
                user_name       TEXT NOT NULL,
                is_error        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_thread ON messages(user_id, created_at);

            -- Desk defaults
            INSERT INTO rates (id, buy_rate, sell_rate) VALUES (1, 0.35, 0.28);
            INSERT INTO wallets (currency) VALUES ('BTC'), ('ETH'), ('LTC'), ('USDT');
            INSERT INTO settings (key, value) VALUES
                ('drop_world_name', 'MARKET123'),
                ('live_support', 'false');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}
