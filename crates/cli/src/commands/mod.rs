//! Command implementations for the Vantage CLI.
//!
//! `add` registers targets into the sealed registry, `run` drives the
//! whole pipeline from session handshake through report persistence, and
//! `status` inspects the registry without touching it.

pub mod add;
pub mod run;
pub mod status;
