//! State machines built on `statig`.

pub mod connection_sm;
