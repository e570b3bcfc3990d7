pub mod clock;
pub mod command;
pub mod compactor;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod shell;
pub mod store;
pub mod wal;
