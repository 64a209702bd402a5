pub mod conductors;
pub mod config;
pub mod constructors;
pub mod controllers;
pub mod entities;
pub mod error;
pub mod identity;
pub mod presenters;
pub mod realtime;
pub mod repositories;
pub mod session;
pub mod surfaces;
pub(crate) mod utils;
