//! ABOUTME: Host application models stored next to the auth tables
//! ABOUTME: Stuffs and their repository

pub mod stuff;

pub use stuff::{NewStuff, Status, Stuff, StuffRepository};
