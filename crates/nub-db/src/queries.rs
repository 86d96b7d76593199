use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, types::Type};

use nub_types::models::{
    AllocatedDestination, ChatMessage, CryptoCurrency, GLOBAL_THREAD, MarketSettings, Order, OrderStatus,
    RateInfo, WalletConfig,
};

use crate::Database;
use crate::models::{PendingRegistrationRow, UserRow};

const ORDER_COLUMNS: &str = "id, trade_mode, amount, crypto_amount, currency, total_usd, grow_id, world_name,
     is_safe_mode, is_guest, owner_id, status, tx_hash, payout_address, created_at, updated_at, completed_at";

impl Database {
    // -- Users --

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, email, password_hash, created_at FROM users ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Pending registrations --

    /// Store a sign-up awaiting verification. A second sign-up for the same email replaces the first.
    pub fn upsert_pending_registration(&self, pending: &PendingRegistrationRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_registrations (email, username, password_hash, code, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO UPDATE SET
                    username = excluded.username,
                    password_hash = excluded.password_hash,
                    code = excluded.code,
                    expires_at = excluded.expires_at",
                rusqlite::params![
                    pending.email,
                    pending.username,
                    pending.password_hash,
                    pending.code,
                    pending.expires_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_pending_registration(&self, email: &str) -> Result<Option<PendingRegistrationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, username, password_hash, code, expires_at
                 FROM pending_registrations WHERE email = ?1",
                [email],
                |row| {
                    Ok(PendingRegistrationRow {
                        email: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        code: row.get(3)?,
                        expires_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Turn a verified sign-up into an account in one transaction.
    pub fn complete_registration(&self, user: &UserRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user.id, user.username, user.email, user.password_hash, user.created_at],
            )?;
            tx.execute("DELETE FROM pending_registrations WHERE email = ?1", [&user.email])?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_pending_registration(&self, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM pending_registrations WHERE email = ?1", [email])?;
            Ok(())
        })
    }

    /// Drop sign-ups whose code expired before `now`. Returns how many were removed.
    pub fn purge_expired_registrations(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM pending_registrations WHERE expires_at < ?1", [now])?;
            Ok(removed)
        })
    }

    // -- Orders --

    pub fn insert_order(&self, order: &Order) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO orders ({ORDER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                rusqlite::params![
                    order.id,
                    order.trade_mode.as_str(),
                    order.amount,
                    order.crypto_amount,
                    order.currency.ticker(),
                    order.total_usd,
                    order.grow_id,
                    order.world_name,
                    order.is_safe_mode,
                    order.is_guest,
                    order.owner_id,
                    order.status.as_str(),
                    order.tx_hash,
                    order.payout_address,
                    order.created_at,
                    order.updated_at,
                    order.completed_at,
                ],
            )?;
            for (position, dest) in order.destinations.iter().enumerate() {
                tx.execute(
                    "INSERT INTO order_destinations (order_id, position, grow_id, world_name, amount)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![order.id, position as i64, dest.grow_id, dest.world_name, dest.amount],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Option<Order>> {
        self.with_conn(|conn| {
            let order = conn
                .query_row(
                    &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                    [id],
                    order_from_row,
                )
                .optional()?;
            match order {
                Some(mut order) => {
                    order.destinations = query_destinations(conn, &order.id)?;
                    Ok(Some(order))
                }
                None => Ok(None),
            }
        })
    }

    /// Newest first. `owner` restricts the list to one customer or guest session.
    pub fn list_orders(&self, owner: Option<&str>) -> Result<Vec<Order>> {
        self.with_conn(|conn| {
            let mut orders = match owner {
                Some(owner) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = ?1 ORDER BY created_at DESC"
                    ))?;
                    stmt.query_map([owner], order_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"))?;
                    stmt.query_map([], order_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            for order in orders.iter_mut().filter(|o| o.is_safe_mode) {
                order.destinations = query_destinations(conn, &order.id)?;
            }
            Ok(orders)
        })
    }

    /// Persist the lifecycle fields of an order after a status change.
    ///
    /// The write only lands while the stored status is still `expected`. `false` means the order is
    /// gone or another update got there first.
    pub fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE orders SET status = ?1, updated_at = ?2, completed_at = ?3
                 WHERE id = ?4 AND status = ?5",
                rusqlite::params![
                    order.status.as_str(),
                    order.updated_at,
                    order.completed_at,
                    order.id,
                    expected.as_str()
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Store the buyer's payment hash while the order is still pending.
    pub fn set_order_tx_hash(&self, order: &Order) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE orders SET tx_hash = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                rusqlite::params![order.tx_hash, order.updated_at, order.id, OrderStatus::Pending.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Market configuration --

    pub fn get_rates(&self) -> Result<RateInfo> {
        self.with_conn(|conn| {
            let rates = conn
                .query_row("SELECT buy_rate, sell_rate FROM rates WHERE id = 1", [], |row| {
                    Ok(RateInfo {
                        buy_rate: row.get(0)?,
                        sell_rate: row.get(1)?,
                    })
                })
                .optional()?;
            Ok(rates.unwrap_or_default())
        })
    }

    pub fn set_rates(&self, rates: &RateInfo) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rates (id, buy_rate, sell_rate) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET buy_rate = excluded.buy_rate, sell_rate = excluded.sell_rate",
                rusqlite::params![rates.buy_rate, rates.sell_rate],
            )?;
            Ok(())
        })
    }

    pub fn get_wallets(&self) -> Result<WalletConfig> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT currency, address FROM wallets")?;
            let rows = stmt
                .query_map([], |row| Ok((parse_column::<CryptoCurrency>(row, 0)?, row.get::<_, String>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut wallets = WalletConfig::default();
            for (currency, address) in rows {
                wallets.set_address(currency, address);
            }
            Ok(wallets)
        })
    }

    pub fn set_wallets(&self, wallets: &WalletConfig) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for currency in CryptoCurrency::ALL {
                tx.execute(
                    "INSERT INTO wallets (currency, address) VALUES (?1, ?2)
                     ON CONFLICT(currency) DO UPDATE SET address = excluded.address",
                    rusqlite::params![currency.ticker(), wallets.address(currency).trim()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_settings(&self) -> Result<MarketSettings> {
        self.with_conn(|conn| {
            let mut settings = MarketSettings::default();
            let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for (key, value) in rows {
                match key.as_str() {
                    "drop_world_name" => settings.drop_world_name = value,
                    "live_support" => settings.live_support = value == "true",
                    _ => {}
                }
            }
            Ok(settings)
        })
    }

    pub fn set_settings(&self, settings: &MarketSettings) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let live_support = if settings.live_support { "true" } else { "false" };
            for (key, value) in [
                ("drop_world_name", settings.drop_world_name.as_str()),
                ("live_support", live_support),
            ] {
                tx.execute(
                    "INSERT INTO settings (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    [key, value],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, role, text, user_id, user_name, is_error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    message.role.as_str(),
                    message.text,
                    message.user_id,
                    message.user_name,
                    message.is_error,
                    message.timestamp,
                ],
            )?;
            Ok(())
        })
    }

    /// Every message, oldest first.
    pub fn list_messages(&self) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, text, user_id, user_name, is_error, created_at
                 FROM messages ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One thread plus the global broadcasts, oldest first.
    pub fn list_thread_messages(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, text, user_id, user_name, is_error, created_at
                 FROM messages WHERE user_id = ?1 OR user_id = ?2
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([user_id, GLOBAL_THREAD], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Guest session ids that have posted, in order of their first message.
    pub fn list_guest_threads(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM messages WHERE user_id LIKE 'sess\\_%' ESCAPE '\\'
                 GROUP BY user_id ORDER BY MIN(rowid)",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE email = ?1 COLLATE NOCASE",
    )?;

    let row = stmt.query_row([email], user_from_row).optional()?;

    Ok(row)
}

fn query_destinations(conn: &Connection, order_id: &str) -> Result<Vec<AllocatedDestination>> {
    let mut stmt = conn.prepare(
        "SELECT grow_id, world_name, amount FROM order_destinations WHERE order_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([order_id], |row| {
            Ok(AllocatedDestination {
                grow_id: row.get(0)?,
                world_name: row.get(1)?,
                amount: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        trade_mode: parse_column(row, 1)?,
        amount: row.get(2)?,
        crypto_amount: row.get(3)?,
        currency: parse_column(row, 4)?,
        total_usd: row.get(5)?,
        grow_id: row.get(6)?,
        world_name: row.get(7)?,
        is_safe_mode: row.get(8)?,
        is_guest: row.get(9)?,
        destinations: Vec::new(),
        owner_id: row.get(10)?,
        status: parse_column::<OrderStatus>(row, 11)?,
        tx_hash: row.get(12)?,
        payout_address: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        completed_at: row.get(16)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: parse_column(row, 0)?,
        role: parse_column(row, 1)?,
        text: row.get(2)?,
        user_id: row.get(3)?,
        user_name: row.get(4)?,
        is_error: row.get(5)?,
        timestamp: row.get(6)?,
    })
}

/// Read a TEXT column and parse it with `FromStr`.
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
