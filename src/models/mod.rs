pub mod issue;
pub mod repository;
pub mod user;

pub use issue::*;
pub use repository::*;
pub use user::*;
