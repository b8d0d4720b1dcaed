//! menud - dish explanation daemon.
//!
//! Resolves dish explanations through a fuzzy-matched corpus cache with an
//! AI generator behind it, fronted by an origin/rate governor and per-caller
//! generation quotas.

pub mod config;
pub mod generator;
pub mod governor;
pub mod matcher;
pub mod prompts;
pub mod quota;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod store;
