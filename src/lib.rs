pub mod server;
pub mod storage;
pub mod security;
pub mod identity;
pub mod error;
pub mod locales;
