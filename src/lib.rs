//! Photo Strip Generation Service
//!
//! Accepts a user photo over HTTP, builds a photo-strip prompt from the chosen
//! layout and styling, fans the request out to the configured image providers
//! (FAL, Replicate, Gemini) and exposes a polling endpoint for the results.
//! Finished strips can optionally be published to a Postgres-backed gallery.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
