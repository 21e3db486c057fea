#![allow(dead_code)]

use std::str::FromStr;

pub use bigdecimal::BigDecimal;

pub use savings_api::*;

pub fn dec(s: &str) -> BigDecimal {
	BigDecimal::from_str(s).unwrap()
}

/// Calendar pinned to a fixed moment.
pub struct FixedCalendar(pub Time);

impl Calendar for FixedCalendar {
	fn now(&self) -> Time {
		self.0
	}
}

pub struct Fixture {
	pub store: Store,
	pub user_factory: UserFactory,
	pub account_factory: AccountFactory,
}

impl Fixture {
	pub fn new() -> Self {
		let _ = pretty_env_logger::try_init();
		let store = Store::new();
		Fixture {
			user_factory: UserFactory::new(store.clone()),
			account_factory: AccountFactory::new(store.clone()),
			store,
		}
	}

	pub fn store(&self) -> Store {
		self.store.clone()
	}
}

pub struct Suite {
	pub user_repo: user::Repo,
	pub account_repo: account::Repo,
	pub membership_repo: account::MembershipRepo,
	pub loan_repo: loan::Repo,
	pub transaction_repo: transaction::Repo,
	pub recorder: Recorder,
	pub store: Store,
}

impl Suite {
	pub fn setup(fixture: &Fixture) -> Self {
		Suite::with_store(fixture.store())
	}

	pub fn with_store(store: Store) -> Self {
		Suite {
			user_repo: user::Repo::new(store.clone()),
			account_repo: account::Repo::new(store.clone()),
			membership_repo: account::MembershipRepo::new(store.clone()),
			loan_repo: loan::Repo::new(store.clone()),
			transaction_repo: transaction::Repo::new(store.clone()),
			recorder: Recorder::new(store.clone()),
			store,
		}
	}

	pub fn service<'a>(&'a self, calendar: &'a dyn Calendar) -> Service<'a> {
		Service::new(NewService {
			store: self.store.clone(),
			user_repo: &self.user_repo,
			account_repo: &self.account_repo,
			membership_repo: &self.membership_repo,
			loan_repo: &self.loan_repo,
			recorder: &self.recorder,
			calendar,
		})
	}
}

pub struct UserFactory {
	store: Store,
}

impl<'a> UserFactory {
	fn new(store: Store) -> Self {
		UserFactory { store }
	}

	pub fn defaults() -> NewUser<'a> {
		NewUser {
			email: "default@gmail.com",
			first_name: "Default",
			family_name: "Default",
			phone_number: None,
		}
	}

	pub fn user(&self, new_user: NewUser) -> User {
		user::Repo::new(self.store.clone()).create(new_user).unwrap()
	}

	pub fn bob(&self) -> User {
		self.user(NewUser {
			email: "bob@gmail.com",
			first_name: "Bob",
			family_name: "Roberts",
			..UserFactory::defaults()
		})
	}

	pub fn lucy(&self) -> User {
		self.user(NewUser {
			email: "lucy@gmail.com",
			first_name: "Lucy",
			family_name: "Luke",
			..UserFactory::defaults()
		})
	}
}

pub struct AccountFactory {
	store: Store,
}

impl AccountFactory {
	pub fn new(store: Store) -> Self {
		AccountFactory { store }
	}

	pub fn account(&self, new_account: NewAccount) -> SharedAccount {
		account::Repo::new(self.store.clone()).create(new_account).unwrap()
	}

	pub fn family_account(&self, owner_id: Id) -> SharedAccount {
		self.account(NewAccount {
			name: "family pool",
			description: "",
			account_type: AccountType::Family,
			created_by: owner_id,
			target_amount: None,
			allow_loans: true,
			max_loan_amount: None,
			min_contribution: dec("10.00"),
		})
	}

	pub fn add_member(&self, account_id: &Id, user_id: &Id, role: Role) -> Membership {
		account::MembershipRepo::new(self.store.clone())
			.add_member(account_id, user_id, role)
			.unwrap()
	}
}
