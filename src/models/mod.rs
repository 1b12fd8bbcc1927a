pub mod trip;
pub mod user;
