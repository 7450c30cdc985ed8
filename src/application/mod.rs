//! Application services: the workflows behind each page.

pub mod auth;
pub mod error;
pub mod groups;
pub mod mail;
pub mod pagination;
pub mod posts;
pub mod repos;
