pub mod assignments;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod environment;
pub mod errors;
pub mod gamification;
pub mod glossary;
pub mod lifecycle;
pub mod media;
pub mod profile;
pub mod recording;
pub mod routes;
pub mod store;
pub mod user;
