//! Relay core library: WhatsApp webhook gateway, reply pipelines, in-memory conversation
//! stores, and the admin API used by the CLI.

pub mod actions;
pub mod auto_respond;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod monitoring;
pub mod pipeline;
pub mod responder;
pub mod session;
