pub mod auth;
pub mod chat;
pub mod helix;
pub mod irc;
pub mod loopback;
