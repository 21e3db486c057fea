use std::error;
use std::fmt;

use crate::store;

/// An error that can occur when operating on shared savings accounts
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
	kind: ErrorKind,
}

impl Error {
	pub fn new(kind: ErrorKind) -> Error {
		Error { kind }
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}
}

/// The kind of an error that can occur.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
	/// Malformed input, rejected before any shared state is touched
	Validation(String),
	/// A state-machine transition attempted from a state that does not
	/// permit it
	InvalidTransition(String),
	/// Business-rule rejection: not enough capacity for the requested amount
	InadequateFunds,
	/// The acting member lacks the permission the operation requires
	PermissionDenied(String),
	/// Referenced record absent
	NotFound(&'static str),
	/// Unique-constraint or concurrent-update conflict
	Conflict(String),
	/// Storage-layer failure
	Store(store::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			ErrorKind::Validation(msg) => write!(f, "validation: {}", msg),
			ErrorKind::InvalidTransition(msg) => write!(f, "invalid transition: {}", msg),
			ErrorKind::InadequateFunds => write!(f, "not enough funds in account"),
			ErrorKind::PermissionDenied(msg) => write!(f, "permission denied: {}", msg),
			ErrorKind::NotFound(what) => write!(f, "{} does not exist", what),
			ErrorKind::Conflict(msg) => write!(f, "conflict: {}", msg),
			ErrorKind::Store(e) => write!(f, "store error: {}", e),
		}
	}
}

impl error::Error for Error {}

impl From<store::Error> for Error {
	fn from(e: store::Error) -> Self {
		match e {
			store::Error::RecordNotFound => Error::new(ErrorKind::NotFound("record")),
			store::Error::RecordAlreadyExists => {
				Error::new(ErrorKind::Conflict("record violates a unique constraint".to_string()))
			}
			store::Error::Poisoned => Error::new(ErrorKind::Store(store::Error::Poisoned)),
		}
	}
}
