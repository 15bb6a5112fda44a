pub mod auth;
pub mod config;
pub mod corridas;
pub mod db;
pub mod error;
pub mod extractors;
pub mod motoristas;
pub mod resource;
pub mod usuarios;
pub mod web_server;
