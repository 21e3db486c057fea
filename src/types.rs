use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, NaiveDate, Utc};

pub type Id = uuid::Uuid;
pub type Time = DateTime<Utc>;
pub type Date = NaiveDate;

/// Fractional digits carried by every monetary amount.
pub const MONEY_SCALE: i64 = 2;

/// Quantize an amount to the ledger's fixed two-digit scale.
pub fn to_money(amount: &BigDecimal) -> BigDecimal {
	amount.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

/// Generate a ledger reference such as `TXN-4F2A91BC`.
pub(crate) fn new_reference(prefix: &str) -> String {
	let hex = uuid::Uuid::new_v4().simple().to_string();
	format!("{}-{}", prefix, hex[..8].to_uppercase())
}
