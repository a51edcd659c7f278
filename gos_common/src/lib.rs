mod address;
mod money;

pub mod op;

pub use address::Address;
pub use money::{Money, MoneyConversionError};
