//! Domain layer: value objects for money, quotes, limits, orders and pending
//! transactions, plus the ports through which the engine talks to the backend.

pub mod limits;
pub mod money;
pub mod order;
pub mod ports;
pub mod quote;
pub mod transaction;
