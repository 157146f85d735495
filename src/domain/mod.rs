mod gpa;
mod ledger;
mod message;
mod money;
mod session;
mod user;

pub use gpa::*;
pub use ledger::*;
pub use message::*;
pub use money::*;
pub use session::*;
pub use user::*;
