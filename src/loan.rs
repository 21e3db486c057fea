use bigdecimal::{BigDecimal, Zero};
use strum_macros::{Display, EnumString};

use crate::store::{self, Store};
use crate::types::{to_money, Date, Id, Time};

/// Interest-free credit extended from an account's pooled balance to one
/// borrowing member.
#[derive(Clone, Debug, PartialEq)]
pub struct Loan {
	pub id: Id,
	pub account_id: Id,
	pub borrower_id: Id,
	pub amount: BigDecimal,
	pub purpose: String,
	pub status: LoanStatus,
	pub term_months: u32,
	/// amount / term_months, fixed at creation and never recomputed.
	pub monthly_payment: BigDecimal,
	pub amount_paid: BigDecimal,
	/// Always amount - amount_paid; monotonically non-increasing.
	pub remaining_balance: BigDecimal,
	pub requested_at: Time,
	pub approved_at: Option<Time>,
	pub approved_by: Option<Id>,
	pub approval_notes: String,
	pub disbursed_at: Option<Time>,
	/// Disbursement date + 30 x term_months days.
	pub due_date: Option<Date>,
	pub repaid_at: Option<Time>,
	pub reference_number: String,
	pub notes: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoanStatus {
	#[default]
	Pending,
	Approved,
	Active,
	Repaid,
	Overdue,
	Defaulted,
	Cancelled,
}

impl LoanStatus {
	/// Terminal states accept no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, LoanStatus::Repaid | LoanStatus::Defaulted | LoanStatus::Cancelled)
	}
}

#[derive(Debug)]
pub struct NewLoan<'a> {
	pub account_id: &'a Id,
	pub borrower_id: &'a Id,
	pub amount: &'a BigDecimal,
	pub purpose: &'a str,
	pub term_months: u32,
	pub requested_at: Time,
}

/// Display projection of one loan.
#[derive(Clone, Debug, PartialEq)]
pub struct LoanSummary {
	pub id: Id,
	pub reference_number: String,
	pub amount: BigDecimal,
	pub purpose: String,
	pub status: LoanStatus,
	pub borrower: String,
	pub term_months: u32,
	pub monthly_payment: BigDecimal,
	pub amount_paid: BigDecimal,
	pub remaining_balance: BigDecimal,
	pub due_date: Option<Date>,
	pub requested_at: Time,
}

pub struct Repo {
	store: Store,
}

impl Repo {
	pub fn new(store: Store) -> Self {
		Repo { store }
	}

	/// Insert a pending loan. The monthly payment and the reference are
	/// derived here, once; the division keeps no remainder correction.
	pub fn create(&self, new_loan: NewLoan) -> store::Result<Loan> {
		let amount = to_money(new_loan.amount);
		let monthly_payment = to_money(&(&amount / &BigDecimal::from(new_loan.term_months)));
		let reference_number = self.store.reserve_new_reference("LOAN")?;
		let loan = Loan {
			id: Id::new_v4(),
			account_id: *new_loan.account_id,
			borrower_id: *new_loan.borrower_id,
			remaining_balance: amount.clone(),
			amount_paid: to_money(&BigDecimal::zero()),
			amount,
			purpose: new_loan.purpose.to_string(),
			status: LoanStatus::default(),
			term_months: new_loan.term_months,
			monthly_payment,
			requested_at: new_loan.requested_at,
			approved_at: None,
			approved_by: None,
			approval_notes: String::new(),
			disbursed_at: None,
			due_date: None,
			repaid_at: None,
			reference_number,
			notes: String::new(),
		};
		self.store.insert_loan(loan)
	}

	pub fn find_by_id(&self, id: &Id) -> store::Result<Loan> {
		self.store.loan(id)
	}

	pub fn find_by_reference(&self, reference: &str) -> store::Result<Loan> {
		self.store
			.loans_where(|l| l.reference_number == reference)?
			.into_iter()
			.next()
			.ok_or(store::Error::RecordNotFound)
	}

	/// (borrower, status) access path.
	pub fn for_borrower(&self, borrower_id: &Id, status: Option<LoanStatus>) -> store::Result<Vec<Loan>> {
		self.store
			.loans_where(|l| l.borrower_id == *borrower_id && status.map_or(true, |s| l.status == s))
	}

	/// (account, status) access path.
	pub fn for_account(&self, account_id: &Id, status: Option<LoanStatus>) -> store::Result<Vec<Loan>> {
		self.store
			.loans_where(|l| l.account_id == *account_id && status.map_or(true, |s| l.status == s))
	}

	/// (due_date, status) access path: active loans strictly past due.
	pub fn due_before(&self, as_of: Date) -> store::Result<Vec<Loan>> {
		self.store.loans_where(|l| {
			l.status == LoanStatus::Active && l.due_date.map_or(false, |due| due < as_of)
		})
	}

	pub(crate) fn update<F>(&self, id: &Id, f: F) -> store::Result<Loan>
	where
		F: FnOnce(&mut Loan),
	{
		self.store.update_loan(id, f)
	}
}
