mod chat;
mod config;
