//! # Stockroom API Server Library
//!
//! HTTP surface of the Stockroom backend: teams, memberships, products and
//! report templates behind token authentication and policy checks.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error type and HTTP mapping
//! - `middleware`: guard adapters and security headers
//! - `response`: the response envelope
//! - `routes`: route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
