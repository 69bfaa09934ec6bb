pub mod api;
pub mod participant;
pub mod question;


pub use api::*;
pub use participant::*;
pub use question::*;
