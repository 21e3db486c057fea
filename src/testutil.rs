use std::str::FromStr;

pub use bigdecimal::BigDecimal;

use crate::account::{self, AccountType, NewAccount};
use crate::loan;
use crate::store::Store;
use crate::transaction;
use crate::types::Id;
use crate::user::{self, NewUser, User};

pub fn dec(s: &str) -> BigDecimal {
	BigDecimal::from_str(s).unwrap()
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
}

pub struct Suite {
	pub user_repo: user::Repo,
	pub account_repo: account::Repo,
	pub loan_repo: loan::Repo,
	pub transaction_repo: transaction::Repo,
	pub recorder: transaction::Recorder,
}

impl Suite {
	pub fn setup(fixture: &Fixture) -> Self {
		let store = fixture.store.clone();
		Suite {
			user_repo: user::Repo::new(store.clone()),
			account_repo: account::Repo::new(store.clone()),
			loan_repo: loan::Repo::new(store.clone()),
			transaction_repo: transaction::Repo::new(store.clone()),
			recorder: transaction::Recorder::new(store),
		}
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
	fn new(store: Store) -> Self {
		AccountFactory { store }
	}

	pub fn family_account(&self, owner_id: Id) -> account::SharedAccount {
		account::Repo::new(self.store.clone())
			.create(NewAccount {
				name: "family pool",
				description: "",
				account_type: AccountType::Family,
				created_by: owner_id,
				target_amount: None,
				allow_loans: true,
				max_loan_amount: None,
				min_contribution: dec("10.00"),
			})
			.unwrap()
	}
}
