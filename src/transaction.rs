use bigdecimal::{BigDecimal, Signed};
use chrono::Utc;
use log::info;
use strum_macros::{Display, EnumString};

use crate::savings::{Error, ErrorKind, Result};
use crate::store::{self, Store};
use crate::types::{to_money, Id, Time};

/// One balance-affecting event recorded against an account.
/// Immutable once recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
	pub id: Id,
	pub account_id: Id,
	pub transaction_type: TransactionType,
	pub amount: BigDecimal,
	pub description: String,
	pub status: TransactionStatus,
	pub initiated_by: Id,
	pub recipient: Option<Id>,
	pub related_loan: Option<Id>,
	/// Account balance captured immediately before the entry completed.
	pub balance_before: BigDecimal,
	/// Balance the completing mutation left behind.
	pub balance_after: BigDecimal,
	pub reference_number: String,
	pub created_at: Time,
	pub processed_at: Option<Time>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
	Contribution,
	Withdrawal,
	LoanDisbursement,
	LoanRepayment,
	Transfer,
	Fee,
	Refund,
}

/// Which way a completed entry moves the account balance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
	Credit,
	Debit,
}

impl TransactionType {
	/// Sign convention. Transfers are bookkeeping entries and carry no
	/// balance effect.
	pub fn direction(&self) -> Option<Direction> {
		match self {
			TransactionType::Contribution | TransactionType::LoanRepayment | TransactionType::Refund => {
				Some(Direction::Credit)
			}
			TransactionType::Withdrawal | TransactionType::LoanDisbursement | TransactionType::Fee => {
				Some(Direction::Debit)
			}
			TransactionType::Transfer => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
	Pending,
	Completed,
	Failed,
	Cancelled,
}

/// Parameter object for posting one completed ledger entry.
#[derive(Debug)]
pub struct RecordTransaction<'a> {
	pub account_id: &'a Id,
	pub transaction_type: TransactionType,
	pub amount: &'a BigDecimal,
	pub description: &'a str,
	pub initiated_by: &'a Id,
	pub recipient: Option<Id>,
	pub related_loan: Option<Id>,
}

/// Read-side queries over the ledger.
pub struct Repo {
	store: Store,
}

impl Repo {
	pub fn new(store: Store) -> Self {
		Repo { store }
	}

	pub fn find_by_reference(&self, reference: &str) -> store::Result<Transaction> {
		self.store
			.transactions_where(|t| t.reference_number == reference)?
			.into_iter()
			.next()
			.ok_or(store::Error::RecordNotFound)
	}

	/// Entries for one account in creation order, optionally narrowed by type.
	pub fn for_account(
		&self,
		account_id: &Id,
		transaction_type: Option<TransactionType>,
	) -> store::Result<Vec<Transaction>> {
		self.store.transactions_where(|t| {
			t.account_id == *account_id && transaction_type.map_or(true, |k| t.transaction_type == k)
		})
	}

	pub fn initiated_by(&self, user_id: &Id) -> store::Result<Vec<Transaction>> {
		self.store.transactions_where(|t| t.initiated_by == *user_id)
	}

	pub fn for_loan(&self, loan_id: &Id) -> store::Result<Vec<Transaction>> {
		self.store.transactions_where(|t| t.related_loan == Some(*loan_id))
	}
}

/// Posts completed ledger entries; the only writer of account balances.
pub struct Recorder {
	store: Store,
}

impl Recorder {
	pub fn new(store: Store) -> Self {
		Recorder { store }
	}

	/// Post a completed entry as its own serialization unit for the account.
	pub fn record(&self, req: RecordTransaction) -> Result<Transaction> {
		let account_id = *req.account_id;
		self.store.serialize_on(&account_id, || self.record_in_unit(req))
	}

	/// Post a completed entry from inside an enclosing serialization unit
	/// for the same account.
	///
	/// Every fallible step happens before the balance moves: validation,
	/// the capacity of the debit, and the reference reservation. Once those
	/// pass, the balance write and the ledger append land as one step.
	pub(crate) fn record_in_unit(&self, req: RecordTransaction) -> Result<Transaction> {
		if !req.amount.is_positive() {
			return Err(Error::new(ErrorKind::Validation(format!(
				"transaction amount must be positive, got {}",
				req.amount
			))));
		}
		let amount = to_money(req.amount);

		let account = match self.store.account(req.account_id) {
			Ok(account) => account,
			Err(store::Error::RecordNotFound) => return Err(Error::new(ErrorKind::NotFound("account"))),
			Err(e) => return Err(e.into()),
		};
		let balance_before = account.balance.clone();
		let balance_after = match req.transaction_type.direction() {
			Some(Direction::Credit) => &balance_before + &amount,
			Some(Direction::Debit) => {
				let after = &balance_before - &amount;
				if after.is_negative() {
					return Err(Error::new(ErrorKind::InadequateFunds));
				}
				after
			}
			None => balance_before.clone(),
		};

		let reference_number = match self.store.reserve_new_reference("TXN") {
			Ok(reference) => reference,
			Err(store::Error::RecordAlreadyExists) => {
				return Err(Error::new(ErrorKind::Conflict(
					"transaction reference generation exhausted its retries".to_string(),
				)))
			}
			Err(e) => return Err(e.into()),
		};

		let now = Utc::now();
		let transaction = Transaction {
			id: Id::new_v4(),
			account_id: account.id,
			transaction_type: req.transaction_type,
			amount,
			description: req.description.to_string(),
			status: TransactionStatus::Completed,
			initiated_by: *req.initiated_by,
			recipient: req.recipient,
			related_loan: req.related_loan,
			balance_before,
			balance_after,
			reference_number,
			created_at: now,
			processed_at: Some(now),
		};
		let transaction = self.store.apply_completed(transaction)?;
		info!(
			target: "savings::ledger",
			"{} {} {} on account {} ({} -> {})",
			transaction.reference_number,
			transaction.transaction_type,
			transaction.amount,
			transaction.account_id,
			transaction.balance_before,
			transaction.balance_after,
		);
		Ok(transaction)
	}
}
