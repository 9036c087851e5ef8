mod lookup;
mod server;

pub use lookup::{LookupError, OrderLookup};
pub use server::{configure, run_server, AppState, HttpSettings};
