//! ABOUTME: Repository modules providing database operations
//! ABOUTME: Auth data lives here; host models bring their own repositories

pub mod users;
