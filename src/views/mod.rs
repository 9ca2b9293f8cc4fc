//! Login and registration view controllers.
//!
//! Each view drives its own recording session and submission and keeps the
//! one outcome it displays. Rendering lives in `ui`.

pub mod controller;
pub mod login;
pub mod register;

pub use controller::{Outcome, Phase, Status, ViewController};
pub use login::LoginView;
pub use register::RegisterView;
