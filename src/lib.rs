//! translate-mode
//!
//! Interactive translation overlay over a live document tree: decodes translation
//! markers embedded in text and attributes, rewrites them to plain text, and keeps a
//! registry of every translatable term on screen as the tree mutates.

pub mod config;
pub mod hash;
pub mod link;
pub mod marker;
pub mod panel;
pub mod reconcile;
pub mod scanner;
pub mod session;
pub mod tree;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use session::{
    SessionError,
    TranslateSession,
};
