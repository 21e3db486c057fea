pub mod error;
pub mod service;

pub use error::{Error, ErrorKind};
pub use service::{Calendar, NewService, Service, SystemCalendar};

pub type Result<T> = std::result::Result<T, Error>;
