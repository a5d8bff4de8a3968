pub mod admin;
pub mod category;
pub mod post;
