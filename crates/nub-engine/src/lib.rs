//! Nub.market trading engine
//!
//! Pure, synchronous rules behind the trading desk. Nothing in here touches the network or the
//! database; callers inject rates, prices and the current time.
//!
//! * [`rates`] converts between DL quantities, USD totals and crypto amounts.
//! * [`prices`] holds the latest crypto spot prices.
//! * [`split`] divides a safe-mode order across several delivery worlds.
//! * [`txid`] checks the shape of pasted transaction hashes and payout addresses.
//! * [`order`] validates order forms, builds orders and drives the status machine.
//! * [`payment`] turns an order into wallet payment instructions.
//! * [`chat`] and [`support`] hold the support chat rules and the LockBot responder.
//! * [`locks`] converts between the in-game lock denominations.
pub mod chat;
pub mod locks;
pub mod order;
pub mod payment;
pub mod prices;
pub mod rates;
pub mod split;
pub mod support;
pub mod txid;

pub use order::{OrderError, OrderForm, build_order};
pub use prices::PriceBook;
pub use rates::RateEngine;
pub use split::{SplitError, allocate};
