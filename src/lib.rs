//! Yatube: a small community blog built on axum, askama and sqlx.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
