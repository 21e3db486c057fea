pub mod account;
pub mod loan;
pub mod savings;
pub mod store;
pub mod transaction;
pub mod types;
pub mod user;

#[cfg(test)]
mod testutil;

pub use account::{AccountStatus, AccountType, Membership, NewAccount, Permissions, Role, SharedAccount};
pub use loan::{Loan, LoanStatus, LoanSummary, NewLoan};
pub use savings::{Calendar, Error, ErrorKind, NewService, Result, Service, SystemCalendar};
pub use store::Store;
pub use transaction::{
	Direction, RecordTransaction, Recorder, Transaction, TransactionStatus, TransactionType,
};
pub use types::{Date, Id, Time};
pub use user::{NewUser, User, UserKey};
