use bigdecimal::{BigDecimal, Signed};
use chrono::{Duration, Utc};
use log::info;

use crate::account::{self, AccountStatus, Membership, Permissions, SharedAccount};
use crate::loan::{self, Loan, LoanStatus, LoanSummary, NewLoan};
use crate::store::{self, Store};
use crate::transaction::{RecordTransaction, Recorder, Transaction, TransactionType};
use crate::types::{to_money, Date, Id, Time};
use crate::user::{self, UserKey};

use super::error::{Error, ErrorKind};
use super::Result;

/// Gets the current moment; implementations may pin it for tests.
pub trait Calendar {
	fn now(&self) -> Time {
		Utc::now()
	}

	fn today(&self) -> Date {
		self.now().date_naive()
	}
}

/// Calendar reading the system clock.
pub struct SystemCalendar;

impl Calendar for SystemCalendar {}

/// Service for operating on shared savings accounts
pub struct Service<'a> {
	store: Store,
	user_repo: &'a user::Repo,
	account_repo: &'a account::Repo,
	membership_repo: &'a account::MembershipRepo,
	loan_repo: &'a loan::Repo,
	recorder: &'a Recorder,
	calendar: &'a dyn Calendar,
}

/// Parameter object for creating a new Service
pub struct NewService<'a> {
	pub store: Store,
	pub user_repo: &'a user::Repo,
	pub account_repo: &'a account::Repo,
	pub membership_repo: &'a account::MembershipRepo,
	pub loan_repo: &'a loan::Repo,
	pub recorder: &'a Recorder,
	pub calendar: &'a dyn Calendar,
}

impl<'a> Service<'a> {
	pub fn new(v: NewService<'a>) -> Self {
		Service {
			store: v.store,
			user_repo: v.user_repo,
			account_repo: v.account_repo,
			membership_repo: v.membership_repo,
			loan_repo: v.loan_repo,
			recorder: v.recorder,
			calendar: v.calendar,
		}
	}

	/// Contribute funds to the pooled balance
	///
	/// # Arguments
	/// * `account_id` - account the funds are pooled into
	/// * `member_id` - contributing member
	/// * `amount` - amount contributed; must meet the account minimum
	pub fn contribute(&self, account_id: &Id, member_id: &Id, amount: &BigDecimal) -> Result<Transaction> {
		let account = self.active_account(account_id)?;
		self.member_with(account_id, member_id, |p| p.can_contribute, "contributing")?;
		if amount.lt(&account.min_contribution) {
			return Err(Error::new(ErrorKind::Validation(format!(
				"contribution {} is below the account minimum {}",
				amount, account.min_contribution
			))));
		}

		self.recorder.record(RecordTransaction {
			account_id,
			transaction_type: TransactionType::Contribution,
			amount,
			description: "member contribution",
			initiated_by: member_id,
			recipient: None,
			related_loan: None,
		})
	}

	/// Withdraw funds from the pooled balance
	///
	/// The recorder re-checks the balance inside the account's unit, so a
	/// race with another debit cannot overdraw the account.
	pub fn withdraw(&self, account_id: &Id, member_id: &Id, amount: &BigDecimal) -> Result<Transaction> {
		let account = self.active_account(account_id)?;
		self.member_with(account_id, member_id, |p| p.can_manage, "withdrawing pooled funds")?;
		if account.balance.lt(amount) {
			return Err(Error::new(ErrorKind::InadequateFunds));
		}

		self.recorder.record(RecordTransaction {
			account_id,
			transaction_type: TransactionType::Withdrawal,
			amount,
			description: "member withdrawal",
			initiated_by: member_id,
			recipient: Some(*member_id),
			related_loan: None,
		})
	}

	/// Record a transfer entry between members
	///
	/// Transfers are bookkeeping entries; they carry no balance effect.
	pub fn transfer(
		&self,
		account_id: &Id,
		member_id: &Id,
		recipient_id: &Id,
		amount: &BigDecimal,
	) -> Result<Transaction> {
		self.active_account(account_id)?;
		self.member_with(account_id, member_id, |p| p.can_contribute, "transferring")?;
		self.user_repo.find(UserKey::ID(*recipient_id)).map_err(missing("user"))?;

		self.recorder.record(RecordTransaction {
			account_id,
			transaction_type: TransactionType::Transfer,
			amount,
			description: "member transfer",
			initiated_by: member_id,
			recipient: Some(*recipient_id),
			related_loan: None,
		})
	}

	/// Charge a fee against the pooled balance
	pub fn assess_fee(
		&self,
		account_id: &Id,
		manager_id: &Id,
		amount: &BigDecimal,
		description: &str,
	) -> Result<Transaction> {
		self.active_account(account_id)?;
		self.member_with(account_id, manager_id, |p| p.can_manage, "assessing fees")?;

		self.recorder.record(RecordTransaction {
			account_id,
			transaction_type: TransactionType::Fee,
			amount,
			description,
			initiated_by: manager_id,
			recipient: None,
			related_loan: None,
		})
	}

	/// Return funds to the pooled balance
	pub fn refund(
		&self,
		account_id: &Id,
		manager_id: &Id,
		recipient_id: &Id,
		amount: &BigDecimal,
		description: &str,
	) -> Result<Transaction> {
		self.active_account(account_id)?;
		self.member_with(account_id, manager_id, |p| p.can_manage, "issuing refunds")?;
		self.user_repo.find(UserKey::ID(*recipient_id)).map_err(missing("user"))?;

		self.recorder.record(RecordTransaction {
			account_id,
			transaction_type: TransactionType::Refund,
			amount,
			description,
			initiated_by: manager_id,
			recipient: Some(*recipient_id),
			related_loan: None,
		})
	}

	/// Request a loan against the pooled balance
	///
	/// The capacity check here is advisory; it runs again at disbursement
	/// time against the balance of that moment.
	///
	/// # Arguments
	/// * `account_id` - account the loan draws on
	/// * `borrower_id` - requesting member
	/// * `amount` - principal requested
	/// * `purpose` - what the loan is for
	/// * `term_months` - repayment term
	pub fn request_loan(
		&self,
		account_id: &Id,
		borrower_id: &Id,
		amount: &BigDecimal,
		purpose: &str,
		term_months: u32,
	) -> Result<Loan> {
		self.active_account(account_id)?;
		self.member_with(account_id, borrower_id, |p| p.can_borrow, "borrowing")?;
		if !amount.is_positive() {
			return Err(Error::new(ErrorKind::Validation(format!(
				"loan amount must be positive, got {}",
				amount
			))));
		}
		if term_months == 0 {
			return Err(Error::new(ErrorKind::Validation(
				"loan term must be at least one month".to_string(),
			)));
		}
		if !self.account_repo.can_borrow(account_id, amount)? {
			return Err(Error::new(ErrorKind::InadequateFunds));
		}

		let loan = self.loan_repo.create(NewLoan {
			account_id,
			borrower_id,
			amount,
			purpose,
			term_months,
			requested_at: self.calendar.now(),
		})?;
		info!(
			target: "savings::loans",
			"loan {} requested: {} over {} months on account {}",
			loan.reference_number, loan.amount, loan.term_months, account_id,
		);
		Ok(loan)
	}

	/// Approve a pending loan. No balance effect.
	pub fn approve_loan(&self, loan_id: &Id, approver_id: &Id, notes: &str) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		self.member_with(&loan.account_id, approver_id, |p| p.can_manage, "approving loans")?;

		let account_id = loan.account_id;
		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if loan.status != LoanStatus::Pending {
				return Err(invalid_transition(&loan, "approve"));
			}
			let now = self.calendar.now();
			self.loan_repo
				.update(loan_id, |l| {
					l.status = LoanStatus::Approved;
					l.approved_by = Some(*approver_id);
					l.approval_notes = notes.to_string();
					l.approved_at = Some(now);
				})
				.map_err(Into::into)
		})
	}

	/// Disburse an approved loan to its borrower
	///
	/// Capacity is re-checked at this moment, inside the account's
	/// serialization unit; the status transition and the ledger entry land
	/// as one unit, with every fallible step before the loan record moves.
	pub fn disburse_loan(&self, loan_id: &Id) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		let account_id = loan.account_id;

		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if loan.status != LoanStatus::Approved {
				return Err(invalid_transition(&loan, "disburse"));
			}
			self.active_account(&account_id)?;
			if !self.account_repo.can_borrow(&account_id, &loan.amount)? {
				return Err(Error::new(ErrorKind::InadequateFunds));
			}

			let now = self.calendar.now();
			let due_date = now.date_naive() + Duration::days(30 * i64::from(loan.term_months));
			let transaction = self.recorder.record_in_unit(RecordTransaction {
				account_id: &account_id,
				transaction_type: TransactionType::LoanDisbursement,
				amount: &loan.amount,
				description: &format!("loan disbursement for {}", loan.purpose),
				initiated_by: &loan.borrower_id,
				recipient: Some(loan.borrower_id),
				related_loan: Some(loan.id),
			})?;
			let loan = self.loan_repo.update(loan_id, |l| {
				l.status = LoanStatus::Active;
				l.disbursed_at = Some(now);
				l.due_date = Some(due_date);
			})?;
			info!(
				target: "savings::loans",
				"loan {} disbursed as {}, due {}",
				loan.reference_number, transaction.reference_number, due_date,
			);
			Ok(loan)
		})
	}

	/// Make a payment towards an active or overdue loan
	///
	/// Reaching a zero remaining balance settles the loan.
	pub fn make_payment(&self, loan_id: &Id, amount: &BigDecimal) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		let account_id = loan.account_id;

		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if !matches!(loan.status, LoanStatus::Active | LoanStatus::Overdue) {
				return Err(invalid_transition(&loan, "pay"));
			}
			if !amount.is_positive() {
				return Err(Error::new(ErrorKind::Validation(format!(
					"payment amount must be positive, got {}",
					amount
				))));
			}
			let amount = to_money(amount);
			if amount.gt(&loan.remaining_balance) {
				return Err(Error::new(ErrorKind::InadequateFunds));
			}

			let now = self.calendar.now();
			let transaction = self.recorder.record_in_unit(RecordTransaction {
				account_id: &account_id,
				transaction_type: TransactionType::LoanRepayment,
				amount: &amount,
				description: &format!("loan repayment for {}", loan.reference_number),
				initiated_by: &loan.borrower_id,
				recipient: None,
				related_loan: Some(loan.id),
			})?;
			let loan = self.loan_repo.update(loan_id, |l| {
				l.amount_paid = to_money(&(&l.amount_paid + &amount));
				l.remaining_balance = to_money(&(&l.remaining_balance - &amount));
				if !l.remaining_balance.is_positive() {
					l.status = LoanStatus::Repaid;
					l.repaid_at = Some(now);
				}
			})?;
			info!(
				target: "savings::loans",
				"loan {} payment {} recorded as {}, remaining {}",
				loan.reference_number, amount, transaction.reference_number, loan.remaining_balance,
			);
			Ok(loan)
		})
	}

	/// Cancel a loan that has not yet been disbursed
	///
	/// The borrower may cancel their own request; anyone else needs manage
	/// rights.
	pub fn cancel_loan(&self, loan_id: &Id, cancelled_by: &Id) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		if loan.borrower_id != *cancelled_by {
			self.member_with(&loan.account_id, cancelled_by, |p| p.can_manage, "cancelling loans")?;
		}

		let account_id = loan.account_id;
		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if !matches!(loan.status, LoanStatus::Pending | LoanStatus::Approved) {
				return Err(invalid_transition(&loan, "cancel"));
			}
			self.loan_repo
				.update(loan_id, |l| l.status = LoanStatus::Cancelled)
				.map_err(Into::into)
		})
	}

	/// Flag an active loan whose due date has passed
	pub fn mark_overdue(&self, loan_id: &Id) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		let account_id = loan.account_id;
		let today = self.calendar.today();

		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if loan.status != LoanStatus::Active {
				return Err(invalid_transition(&loan, "flag overdue"));
			}
			match loan.due_date {
				Some(due) if due < today => self
					.loan_repo
					.update(loan_id, |l| l.status = LoanStatus::Overdue)
					.map_err(Into::into),
				_ => Err(Error::new(ErrorKind::Validation(format!(
					"loan {} is not past due",
					loan.reference_number
				)))),
			}
		})
	}

	/// Sweep active loans past their due date into overdue
	pub fn flag_overdue_loans(&self) -> Result<Vec<Loan>> {
		let today = self.calendar.today();
		let due = self.loan_repo.due_before(today)?;

		let mut flagged = Vec::with_capacity(due.len());
		for loan in due {
			let account_id = loan.account_id;
			let updated: Loan = self.store.serialize_on(&account_id, || {
				self.loan_repo
					.update(&loan.id, |l| {
						// a payment may have settled the loan since the scan
						if l.status == LoanStatus::Active {
							l.status = LoanStatus::Overdue;
						}
					})
					.map_err(Error::from)
			})?;
			if updated.status == LoanStatus::Overdue {
				flagged.push(updated);
			}
		}
		Ok(flagged)
	}

	/// Write off an overdue loan
	pub fn mark_defaulted(&self, loan_id: &Id) -> Result<Loan> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		let account_id = loan.account_id;

		self.store.serialize_on(&account_id, || {
			let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
			if loan.status != LoanStatus::Overdue {
				return Err(invalid_transition(&loan, "default"));
			}
			self.loan_repo
				.update(loan_id, |l| l.status = LoanStatus::Defaulted)
				.map_err(Into::into)
		})
	}

	/// Display projection of one loan; takes no account unit.
	pub fn loan_summary(&self, loan_id: &Id) -> Result<LoanSummary> {
		let loan = self.loan_repo.find_by_id(loan_id).map_err(missing("loan"))?;
		let borrower = self.user_repo.find(UserKey::ID(loan.borrower_id)).map_err(missing("user"))?;
		Ok(LoanSummary {
			id: loan.id,
			reference_number: loan.reference_number,
			amount: loan.amount,
			purpose: loan.purpose,
			status: loan.status,
			borrower: borrower.full_name(),
			term_months: loan.term_months,
			monthly_payment: loan.monthly_payment,
			amount_paid: loan.amount_paid,
			remaining_balance: loan.remaining_balance,
			due_date: loan.due_date,
			requested_at: loan.requested_at,
		})
	}

	fn active_account(&self, account_id: &Id) -> Result<SharedAccount> {
		let account = self.account_repo.find_by_id(account_id).map_err(missing("account"))?;
		if account.status != AccountStatus::Active {
			return Err(Error::new(ErrorKind::Validation(format!(
				"account {} is {}",
				account.id, account.status
			))));
		}
		Ok(account)
	}

	fn member_with(
		&self,
		account_id: &Id,
		user_id: &Id,
		allowed: fn(&Permissions) -> bool,
		action: &'static str,
	) -> Result<Membership> {
		let membership = match self.membership_repo.find(account_id, user_id) {
			Ok(membership) => membership,
			Err(store::Error::RecordNotFound) => {
				return Err(Error::new(ErrorKind::PermissionDenied(format!(
					"user {} is not a member of account {}",
					user_id, account_id
				))))
			}
			Err(e) => return Err(e.into()),
		};
		if !allowed(&membership.permissions) {
			return Err(Error::new(ErrorKind::PermissionDenied(format!(
				"{} requires a role with more rights than {}",
				action, membership.role
			))));
		}
		Ok(membership)
	}
}

fn invalid_transition(loan: &Loan, action: &str) -> Error {
	Error::new(ErrorKind::InvalidTransition(format!(
		"cannot {} loan {} in status {}",
		action, loan.reference_number, loan.status
	)))
}

fn missing(what: &'static str) -> impl Fn(store::Error) -> Error {
	move |e| match e {
		store::Error::RecordNotFound => Error::new(ErrorKind::NotFound(what)),
		other => other.into(),
	}
}
