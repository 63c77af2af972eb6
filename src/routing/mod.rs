//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → redirect.rs (legacy path? → 301)
//!     → table.rs (longest-prefix lookup)
//!     → Return: Forward(route), CanonicalSlash, or no match
//!
//! Route compilation (at startup):
//!     RouteConfig[]
//!     → Sort by prefix length, longest first
//!     → Parse injected headers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - The table is built once at startup and never mutated
//! - Plain prefix comparison in the hot path, no regex
//! - Deterministic: same path always matches same route
//! - Redirects are checked before the table, mirroring how the
//!   startup chain validation walks them

pub mod redirect;
pub mod table;

pub use redirect::RedirectPolicy;
pub use table::{RouteEntry, RouteMatch, RouteTable};
