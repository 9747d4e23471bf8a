pub mod admin;
pub mod auth;
pub mod categories;
pub mod items;
pub mod orders;
pub mod purchase;
pub mod users;
