#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod bounded;
pub mod error;
pub mod ids;
pub mod model;
pub mod ports;
pub mod text;
