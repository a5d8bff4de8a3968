pub mod admins;
pub mod auth;
pub mod categories;
pub mod health;
pub mod portal;
pub mod posts;
