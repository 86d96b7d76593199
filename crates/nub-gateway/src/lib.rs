//! Live event stream for the trading desk: chat messages and order status changes pushed over
//! WebSocket, each connection seeing only what its session may see.
pub mod connection;
pub mod dispatcher;
