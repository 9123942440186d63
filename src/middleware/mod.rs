mod session;

pub use session::{SESSION_COOKIE, get_current_user, require_user};
