pub mod password;
pub mod session;

pub use session::{get_session, Session};
