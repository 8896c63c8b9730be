//! Database entities

pub mod branch;
pub mod driver;
pub mod movement;
pub mod product;
pub mod user;

pub use movement::MovementStatus;
pub use user::UserProfile;
