//! # Credibil Exchange
//!
//! An SDK for driving identity agents (credential issuance, proof
//! presentation, DID exchange) through their HTTP admin API and correlating
//! the webhook notifications the agents send as exchanges progress.
//!
//! The crate holds no protocol state of its own. All state lives in the
//! agents; the crate sends requests, waits for the agents to report the
//! resulting state changes, and returns the records they report.
//!
//! # Design
//!
//! ** Exchange Client **
//!
//! A [`Client`] pairs an [`Agent`] (the HTTP seam) with a [`Broker`] that
//! receives the agent's notifications. Besides plain request/response calls
//! it offers [`Client::await_notification`]: suspend until a notification on
//! a topic satisfies a [`Predicate`], or time out. Each notification is
//! delivered to at most one waiter, first match wins, in arrival order.
//!
//! Notifications reach the broker through the axum router built by
//! [`webhook::router`], mounted wherever the agent's webhook URL points.
//!
//! ** Exchange Driver **
//!
//! The [`Driver`] encodes multi-step exchanges as send → await confirming
//! notification → send next, for DID exchange, issue credential 1.0/2.0 and
//! present proof 2.0. A step that does not see its confirming notification
//! in time, or sees the exchange fail or regress, aborts the exchange.
//!
//! ** Provider **
//!
//! All agent traffic goes through the [`Agent`] trait, so a [`Client`] never
//! depends on a particular transport. [`http::HttpAgent`] implements it over
//! the agent's admin API with `reqwest`; tests script it in-process.
//!
//! # Example
//!
//! See `demos/harness` for a binary that connects two agents, issues a
//! credential and presents it, exiting non-zero if verification fails.

pub mod broker;
pub mod client;
pub mod config;
pub mod driver;
mod error;
pub mod http;
pub mod notification;
pub mod protocol;
pub mod provider;
pub mod webhook;

pub use broker::Broker;
pub use client::Client;
pub use config::Config;
pub use driver::{Driver, DriverConfig};
pub use error::{Error, Result};
pub use notification::{Filter, Notification, Predicate};
pub use protocol::Record;
pub use provider::{Agent, Method};
