pub mod candidates;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod mutator;
pub mod oracle;
pub mod process;
pub mod selector;
pub mod store;
pub mod sync;
// cmd and reports are modules of the binary crate (main.rs).
