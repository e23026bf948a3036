mod login;
mod profile;
mod register;
pub mod types;

pub use login::{login, logout};
pub use profile::{get_current_user, update_profile};
pub use register::register;
