pub mod comparison;
pub mod dilution;
pub mod equity_returns;
pub mod resolver;
