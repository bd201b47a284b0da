//! Emporium Storefront library.
//!
//! The REST API behind the shop's single-page client, plus the supplier
//! catalog sync the CLI drives. Exposed as a library so the CLI and tests can
//! reuse the repositories, services and sync sources.
//!
//! # Modules
//!
//! - [`routes`] - JSON handlers under `/api`
//! - [`services`] - Cart, checkout, payments, referrals, auth and chat logic
//! - [`db`] - `PostgreSQL` repositories
//! - [`sync`] - Supplier feeds (Rakuten, Wholesale2b, sample catalog, page scraper)
//! - [`stripe`], [`gemini`] - Third-party API clients

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
pub mod sync;
