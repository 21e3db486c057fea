use bigdecimal::{BigDecimal, Signed, Zero};
use chrono::Utc;
use strum_macros::{Display, EnumString};

use crate::loan::LoanStatus;
use crate::savings::{self, Error, ErrorKind};
use crate::store::{self, Store};
use crate::transaction::{TransactionStatus, TransactionType};
use crate::types::{to_money, Id, Time};

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AccountType {
	Family,
	Friends,
	Business,
}

/// Soft lifecycle; accounts are never hard-deleted while loans or
/// transactions reference them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AccountStatus {
	Active,
	Inactive,
	Suspended,
}

/// Pooled savings account owned collectively by its members.
#[derive(Clone, Debug, PartialEq)]
pub struct SharedAccount {
	pub id: Id,
	pub name: String,
	pub description: String,
	pub account_type: AccountType,
	pub status: AccountStatus,
	/// Derived exclusively from completed ledger entries; never negative.
	pub balance: BigDecimal,
	pub target_amount: Option<BigDecimal>,
	pub created_by: Id,
	pub allow_loans: bool,
	pub max_loan_amount: Option<BigDecimal>,
	pub min_contribution: BigDecimal,
	pub created_at: Time,
	pub updated_at: Time,
}

#[derive(Debug)]
pub struct NewAccount<'a> {
	pub name: &'a str,
	pub description: &'a str,
	pub account_type: AccountType,
	pub created_by: Id,
	pub target_amount: Option<BigDecimal>,
	pub allow_loans: bool,
	pub max_loan_amount: Option<BigDecimal>,
	pub min_contribution: BigDecimal,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
	Owner,
	Admin,
	Member,
	Viewer,
}

/// Per-member capabilities, a pure function of the member's role.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Permissions {
	pub can_contribute: bool,
	pub can_borrow: bool,
	pub can_invite: bool,
	pub can_manage: bool,
}

impl Permissions {
	/// Rederived on every role write; the flags are never set independently.
	pub fn for_role(role: Role) -> Permissions {
		match role {
			Role::Owner | Role::Admin => Permissions {
				can_contribute: true,
				can_borrow: true,
				can_invite: true,
				can_manage: true,
			},
			Role::Member => Permissions {
				can_contribute: true,
				can_borrow: true,
				can_invite: false,
				can_manage: false,
			},
			Role::Viewer => Permissions {
				can_contribute: false,
				can_borrow: false,
				can_invite: false,
				can_manage: false,
			},
		}
	}
}

/// A user's role within one shared account. Unique per (account, user).
#[derive(Clone, Debug, PartialEq)]
pub struct Membership {
	pub id: Id,
	pub account_id: Id,
	pub user_id: Id,
	pub role: Role,
	pub permissions: Permissions,
	pub joined_at: Time,
	pub updated_at: Time,
}

pub struct Repo {
	store: Store,
}

impl Repo {
	pub fn new(store: Store) -> Self {
		Repo { store }
	}

	/// Create the account with a zero balance and seed the owner membership.
	pub fn create(&self, new_account: NewAccount) -> savings::Result<SharedAccount> {
		if new_account.name.trim().is_empty() {
			return Err(Error::new(ErrorKind::Validation("account name must not be empty".to_string())));
		}
		if !new_account.min_contribution.is_positive() {
			return Err(Error::new(ErrorKind::Validation(format!(
				"minimum contribution must be positive, got {}",
				new_account.min_contribution
			))));
		}
		for (field, amount) in [
			("target amount", &new_account.target_amount),
			("maximum loan amount", &new_account.max_loan_amount),
		] {
			if let Some(amount) = amount {
				if amount.is_negative() {
					return Err(Error::new(ErrorKind::Validation(format!(
						"{} must not be negative, got {}",
						field, amount
					))));
				}
			}
		}

		let now = Utc::now();
		let account = SharedAccount {
			id: Id::new_v4(),
			name: new_account.name.to_string(),
			description: new_account.description.to_string(),
			account_type: new_account.account_type,
			status: AccountStatus::Active,
			balance: to_money(&BigDecimal::zero()),
			target_amount: new_account.target_amount.as_ref().map(to_money),
			created_by: new_account.created_by,
			allow_loans: new_account.allow_loans,
			max_loan_amount: new_account.max_loan_amount.as_ref().map(to_money),
			min_contribution: to_money(&new_account.min_contribution),
			created_at: now,
			updated_at: now,
		};
		let owner = Membership {
			id: Id::new_v4(),
			account_id: account.id,
			user_id: new_account.created_by,
			role: Role::Owner,
			permissions: Permissions::for_role(Role::Owner),
			joined_at: now,
			updated_at: now,
		};
		self.store.insert_account(account, owner).map_err(Into::into)
	}

	pub fn find_by_id(&self, id: &Id) -> store::Result<SharedAccount> {
		self.store.account(id)
	}

	pub fn find_for_user(&self, user_id: &Id) -> store::Result<Vec<SharedAccount>> {
		let memberships = self.store.memberships_of_user(user_id)?;
		let mut accounts = Vec::with_capacity(memberships.len());
		for membership in memberships {
			accounts.push(self.store.account(&membership.account_id)?);
		}
		Ok(accounts)
	}

	pub fn set_status(&self, id: &Id, status: AccountStatus) -> store::Result<SharedAccount> {
		self.store.update_account(id, |account| {
			account.status = status;
			account.updated_at = Utc::now();
		})
	}

	/// Total of completed contribution entries for this account.
	pub fn total_contributions(&self, account_id: &Id) -> store::Result<BigDecimal> {
		let entries = self.store.transactions_where(|t| {
			t.account_id == *account_id
				&& t.transaction_type == TransactionType::Contribution
				&& t.status == TransactionStatus::Completed
		})?;
		let mut total = BigDecimal::zero();
		for entry in entries {
			total = total + entry.amount;
		}
		Ok(to_money(&total))
	}

	/// Principal currently out on this account's active loans.
	pub fn active_loan_total(&self, account_id: &Id) -> store::Result<BigDecimal> {
		let loans = self
			.store
			.loans_where(|l| l.account_id == *account_id && l.status == LoanStatus::Active)?;
		let mut total = BigDecimal::zero();
		for loan in loans {
			total = total + loan.amount;
		}
		Ok(to_money(&total))
	}

	/// Capacity left to lend: balance minus active loan principal.
	pub fn available_balance(&self, account_id: &Id) -> store::Result<BigDecimal> {
		let account = self.store.account(account_id)?;
		let loaned = self.active_loan_total(account_id)?;
		Ok(to_money(&(&account.balance - &loaned)))
	}

	/// Whether the account can fund a loan of `amount` right now.
	pub fn can_borrow(&self, account_id: &Id, amount: &BigDecimal) -> store::Result<bool> {
		let account = self.store.account(account_id)?;
		if !account.allow_loans {
			return Ok(false);
		}
		if amount.gt(&self.available_balance(account_id)?) {
			return Ok(false);
		}
		if let Some(max) = &account.max_loan_amount {
			if amount.gt(max) {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

pub struct MembershipRepo {
	store: Store,
}

impl MembershipRepo {
	pub fn new(store: Store) -> Self {
		MembershipRepo { store }
	}

	/// Idempotent: an existing membership is returned untouched.
	pub fn add_member(&self, account_id: &Id, user_id: &Id, role: Role) -> store::Result<Membership> {
		match self.store.membership(account_id, user_id) {
			Ok(existing) => return Ok(existing),
			Err(store::Error::RecordNotFound) => {}
			Err(e) => return Err(e),
		}
		let now = Utc::now();
		let membership = Membership {
			id: Id::new_v4(),
			account_id: *account_id,
			user_id: *user_id,
			role,
			permissions: Permissions::for_role(role),
			joined_at: now,
			updated_at: now,
		};
		match self.store.insert_membership(membership) {
			// lost a race to another add; the pair is unique, return theirs
			Err(store::Error::RecordAlreadyExists) => self.store.membership(account_id, user_id),
			other => other,
		}
	}

	/// Returns whether a removal occurred.
	pub fn remove_member(&self, account_id: &Id, user_id: &Id) -> store::Result<bool> {
		self.store.remove_membership(account_id, user_id)
	}

	pub fn find(&self, account_id: &Id, user_id: &Id) -> store::Result<Membership> {
		self.store.membership(account_id, user_id)
	}

	/// Rewrite the member's role; permissions are rederived, never patched.
	pub fn set_role(&self, account_id: &Id, user_id: &Id, role: Role) -> store::Result<Membership> {
		self.store.update_membership(account_id, user_id, |membership| {
			membership.role = role;
			membership.permissions = Permissions::for_role(role);
			membership.updated_at = Utc::now();
		})
	}

	pub fn members_of(&self, account_id: &Id) -> store::Result<Vec<Membership>> {
		self.store.memberships_of_account(account_id)
	}
}
