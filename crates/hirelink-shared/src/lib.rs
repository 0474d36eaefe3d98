//! # hirelink-shared
//!
//! Types shared between the Hirelink server and client crates: identity
//! newtypes, the gateway wire protocol, bearer-token authentication, and
//! common constants.

pub mod auth;
pub mod constants;
pub mod protocol;
pub mod types;
