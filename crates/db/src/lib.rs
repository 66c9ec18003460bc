pub mod connection;
pub mod ledger;
pub mod migrations;

pub use connection::{connect, connect_with_settings, DbPool};
pub use ledger::{InMemoryOrderLedger, LedgerError, OrderLedger, RecordedLine, SqlOrderLedger};
