use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::account::{Membership, SharedAccount};
use crate::loan::Loan;
use crate::transaction::Transaction;
use crate::types::{self, Id};
use crate::user::User;

pub type Result<T> = std::result::Result<T, Error>;

/// Attempts at generating a fresh reference before giving up.
const MAX_REFERENCE_ATTEMPTS: usize = 8;

/// Error that can occur when operating on the ledger store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	RecordAlreadyExists,
	RecordNotFound,
	/// A table lock was poisoned by a panicking writer
	Poisoned,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::RecordAlreadyExists => write!(f, "record violates a unique constraint"),
			Error::RecordNotFound => write!(f, "record does not exist"),
			Error::Poisoned => write!(f, "a store lock was poisoned"),
		}
	}
}

impl std::error::Error for Error {}

/// In-process ledger store shared by every repo.
///
/// Tables are coarse `RwLock`s over plain collections; the ledger itself is
/// append-only and preserves transaction creation order. Cloning a `Store`
/// shares the underlying tables.
#[derive(Clone, Default)]
pub struct Store {
	inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
	users: RwLock<HashMap<Id, User>>,
	/// Unique index: user email -> user id.
	emails: RwLock<HashMap<String, Id>>,
	accounts: RwLock<HashMap<Id, SharedAccount>>,
	/// Unique (account, user) pairs.
	memberships: RwLock<HashMap<(Id, Id), Membership>>,
	loans: RwLock<HashMap<Id, Loan>>,
	ledger: RwLock<Vec<Transaction>>,
	/// Every reference number ever issued, loan and transaction alike.
	references: Mutex<HashSet<String>>,
	units: Mutex<HashMap<Id, Arc<Mutex<()>>>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
	lock.read().map_err(|_| Error::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
	lock.write().map_err(|_| Error::Poisoned)
}

impl Store {
	pub fn new() -> Self {
		Store::default()
	}

	/// Run `f` as the exclusive unit of work for one account.
	///
	/// Units for distinct accounts never contend; check-mutate-record
	/// sequences against the same account serialize here.
	pub fn serialize_on<T, E, F>(&self, account_id: &Id, f: F) -> std::result::Result<T, E>
	where
		F: FnOnce() -> std::result::Result<T, E>,
		E: From<Error>,
	{
		let unit = {
			let mut units = self.inner.units.lock().map_err(|_| E::from(Error::Poisoned))?;
			units
				.entry(*account_id)
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.clone()
		};
		let _guard = unit.lock().map_err(|_| E::from(Error::Poisoned))?;
		f()
	}

	pub fn insert_user(&self, user: User) -> Result<User> {
		let mut emails = write(&self.inner.emails)?;
		if emails.contains_key(&user.email) {
			return Err(Error::RecordAlreadyExists);
		}
		let mut users = write(&self.inner.users)?;
		emails.insert(user.email.clone(), user.id);
		users.insert(user.id, user.clone());
		Ok(user)
	}

	pub fn user(&self, id: &Id) -> Result<User> {
		read(&self.inner.users)?.get(id).cloned().ok_or(Error::RecordNotFound)
	}

	pub fn user_by_email(&self, email: &str) -> Result<User> {
		let id = *read(&self.inner.emails)?.get(email).ok_or(Error::RecordNotFound)?;
		self.user(&id)
	}

	/// Insert the account together with its owner membership.
	pub fn insert_account(&self, account: SharedAccount, owner: Membership) -> Result<SharedAccount> {
		let mut accounts = write(&self.inner.accounts)?;
		if accounts.contains_key(&account.id) {
			return Err(Error::RecordAlreadyExists);
		}
		let mut memberships = write(&self.inner.memberships)?;
		memberships.insert((owner.account_id, owner.user_id), owner);
		accounts.insert(account.id, account.clone());
		Ok(account)
	}

	pub fn account(&self, id: &Id) -> Result<SharedAccount> {
		read(&self.inner.accounts)?.get(id).cloned().ok_or(Error::RecordNotFound)
	}

	/// Apply `f` to the account record and return the updated row.
	///
	/// `f` must not touch `balance`; completed ledger entries are the only
	/// balance writer (`apply_completed`).
	pub fn update_account<F>(&self, id: &Id, f: F) -> Result<SharedAccount>
	where
		F: FnOnce(&mut SharedAccount),
	{
		let mut accounts = write(&self.inner.accounts)?;
		let account = accounts.get_mut(id).ok_or(Error::RecordNotFound)?;
		f(account);
		Ok(account.clone())
	}

	pub fn membership(&self, account_id: &Id, user_id: &Id) -> Result<Membership> {
		read(&self.inner.memberships)?
			.get(&(*account_id, *user_id))
			.cloned()
			.ok_or(Error::RecordNotFound)
	}

	pub fn insert_membership(&self, membership: Membership) -> Result<Membership> {
		let mut memberships = write(&self.inner.memberships)?;
		let key = (membership.account_id, membership.user_id);
		if memberships.contains_key(&key) {
			return Err(Error::RecordAlreadyExists);
		}
		memberships.insert(key, membership.clone());
		Ok(membership)
	}

	pub fn update_membership<F>(&self, account_id: &Id, user_id: &Id, f: F) -> Result<Membership>
	where
		F: FnOnce(&mut Membership),
	{
		let mut memberships = write(&self.inner.memberships)?;
		let membership = memberships
			.get_mut(&(*account_id, *user_id))
			.ok_or(Error::RecordNotFound)?;
		f(membership);
		Ok(membership.clone())
	}

	pub fn remove_membership(&self, account_id: &Id, user_id: &Id) -> Result<bool> {
		let mut memberships = write(&self.inner.memberships)?;
		Ok(memberships.remove(&(*account_id, *user_id)).is_some())
	}

	pub fn memberships_of_account(&self, account_id: &Id) -> Result<Vec<Membership>> {
		let memberships = read(&self.inner.memberships)?;
		let mut matches = Vec::new();
		for membership in memberships.values() {
			if membership.account_id == *account_id {
				matches.push(membership.clone());
			}
		}
		matches.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
		Ok(matches)
	}

	pub fn memberships_of_user(&self, user_id: &Id) -> Result<Vec<Membership>> {
		let memberships = read(&self.inner.memberships)?;
		let mut matches = Vec::new();
		for membership in memberships.values() {
			if membership.user_id == *user_id {
				matches.push(membership.clone());
			}
		}
		matches.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
		Ok(matches)
	}

	pub fn insert_loan(&self, loan: Loan) -> Result<Loan> {
		let mut loans = write(&self.inner.loans)?;
		if loans.contains_key(&loan.id) {
			return Err(Error::RecordAlreadyExists);
		}
		loans.insert(loan.id, loan.clone());
		Ok(loan)
	}

	pub fn loan(&self, id: &Id) -> Result<Loan> {
		read(&self.inner.loans)?.get(id).cloned().ok_or(Error::RecordNotFound)
	}

	pub fn update_loan<F>(&self, id: &Id, f: F) -> Result<Loan>
	where
		F: FnOnce(&mut Loan),
	{
		let mut loans = write(&self.inner.loans)?;
		let loan = loans.get_mut(id).ok_or(Error::RecordNotFound)?;
		f(loan);
		Ok(loan.clone())
	}

	pub fn loans_where<P>(&self, mut predicate: P) -> Result<Vec<Loan>>
	where
		P: FnMut(&Loan) -> bool,
	{
		let loans = read(&self.inner.loans)?;
		let mut matches = Vec::new();
		for loan in loans.values() {
			if predicate(loan) {
				matches.push(loan.clone());
			}
		}
		matches.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then_with(|| a.id.cmp(&b.id)));
		Ok(matches)
	}

	/// Ledger entries matching `predicate`, in creation order.
	pub fn transactions_where<P>(&self, mut predicate: P) -> Result<Vec<Transaction>>
	where
		P: FnMut(&Transaction) -> bool,
	{
		let ledger = read(&self.inner.ledger)?;
		let mut matches = Vec::new();
		for transaction in ledger.iter() {
			if predicate(transaction) {
				matches.push(transaction.clone());
			}
		}
		Ok(matches)
	}

	/// Move the account balance to the entry's `balance_after` and append
	/// the entry, as one step under the table locks.
	///
	/// The single balance writer in the crate.
	pub(crate) fn apply_completed(&self, transaction: Transaction) -> Result<Transaction> {
		let mut accounts = write(&self.inner.accounts)?;
		let account = accounts.get_mut(&transaction.account_id).ok_or(Error::RecordNotFound)?;
		let mut ledger = write(&self.inner.ledger)?;
		account.balance = transaction.balance_after.clone();
		account.updated_at = transaction.created_at;
		ledger.push(transaction.clone());
		Ok(transaction)
	}

	pub fn reserve_reference(&self, reference: &str) -> Result<()> {
		let mut references = self.inner.references.lock().map_err(|_| Error::Poisoned)?;
		if !references.insert(reference.to_string()) {
			return Err(Error::RecordAlreadyExists);
		}
		Ok(())
	}

	/// Reserve a fresh `PREFIX-XXXXXXXX` reference, regenerating on
	/// collision a bounded number of times.
	pub fn reserve_new_reference(&self, prefix: &str) -> Result<String> {
		for _ in 0..MAX_REFERENCE_ATTEMPTS {
			let reference = types::new_reference(prefix);
			match self.reserve_reference(&reference) {
				Ok(()) => return Ok(reference),
				Err(Error::RecordAlreadyExists) => continue,
				Err(e) => return Err(e),
			}
		}
		Err(Error::RecordAlreadyExists)
	}
}
