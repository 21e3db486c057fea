use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;

use crate::loan::LoanStatus;
use crate::store::{self, Store};
use crate::types::{to_money, Id, Time};

/// A person known to the system; identity itself lives with the identity
/// provider, this is the slice the ledger needs.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
	pub id: Id,
	pub email: String,
	pub first_name: String,
	pub family_name: String,
	pub phone_number: Option<String>,
	pub created_at: Time,
}

impl User {
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.family_name).trim().to_string()
	}
}

#[derive(Debug)]
pub struct NewUser<'a> {
	pub email: &'a str,
	pub first_name: &'a str,
	pub family_name: &'a str,
	pub phone_number: Option<&'a str>,
}

pub enum UserKey<'a> {
	ID(Id),
	Email(&'a str),
}

pub struct Repo {
	store: Store,
}

impl Repo {
	pub fn new(store: Store) -> Self {
		Repo { store }
	}

	pub fn create(&self, new_user: NewUser) -> store::Result<User> {
		let user = User {
			id: Id::new_v4(),
			email: new_user.email.to_string(),
			first_name: new_user.first_name.to_string(),
			family_name: new_user.family_name.to_string(),
			phone_number: new_user.phone_number.map(str::to_string),
			created_at: Utc::now(),
		};
		self.store.insert_user(user)
	}

	pub fn find(&self, key: UserKey) -> store::Result<User> {
		match key {
			UserKey::ID(id) => self.store.user(&id),
			UserKey::Email(email) => self.store.user_by_email(email),
		}
	}

	/// Sum of balances across accounts where the user is a member.
	pub fn total_savings(&self, user_id: &Id) -> store::Result<BigDecimal> {
		let memberships = self.store.memberships_of_user(user_id)?;
		let mut total = BigDecimal::zero();
		for membership in memberships {
			total = total + self.store.account(&membership.account_id)?.balance;
		}
		Ok(to_money(&total))
	}

	/// Sum of the user's active loan principal.
	pub fn total_loans(&self, user_id: &Id) -> store::Result<BigDecimal> {
		let loans = self
			.store
			.loans_where(|l| l.borrower_id == *user_id && l.status == LoanStatus::Active)?;
		let mut total = BigDecimal::zero();
		for loan in loans {
			total = total + loan.amount;
		}
		Ok(to_money(&total))
	}
}
