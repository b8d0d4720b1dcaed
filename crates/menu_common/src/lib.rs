//! Menu Common - shared types and matching primitives for WhatTheMenu.
//!
//! Leaf crate: no I/O, no async. Holds the display-language and dish types,
//! the text normalizer, the similarity strategies, and the menu-language
//! heuristic shared by the daemon and the CLI client.

pub mod language;
pub mod normalize;
pub mod similarity;
pub mod types;

pub use types::*;
