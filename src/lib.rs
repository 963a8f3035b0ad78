pub mod bridge;
pub mod cloner;
pub mod config;
pub mod matcher;
pub mod project;
pub mod request;
pub mod scanner;
pub mod session;
pub mod settings;

#[cfg(test)]
pub(crate) mod testutil;

/// Audio file extensions we recognise
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "aif", "aiff"];

/// Application name for XDG paths
pub const APP_NAME: &str = "eventforge";
