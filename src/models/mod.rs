//! Core data models for the animal records service.
//!
//! `Animal` maps to the `animals` table via `sqlx::FromRow` and serializes
//! as JSON via `serde`. `AnimalForm` is the bound, validated input of the
//! create and edit actions.

pub mod animal;
