//! # IO Module
//!
//! Adapter layer between HTTP callers and the domain services. Requests are
//! mapped from the `shared` DTOs to domain commands, and every
//! [`GuardianError`](crate::domain::GuardianError) is translated to a status
//! code plus a `{ "error", "code" }` JSON body.

pub mod rest;
