//! Dentsync core: the tooth-state reconciliation engine.
//!
//! Consultations, treatments, and appointments evolve independently and
//! reference a patient's teeth with varying completeness. This crate
//! keeps each tooth's canonical status and display color consistent with
//! those records, resolves weak linkage deterministically, repairs
//! historical drift in idempotent batch passes, and fans change
//! notifications out to live chart viewers.

pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod overview;
pub mod publisher;
pub mod rules;
