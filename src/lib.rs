// Desktop shell library - exposes all core modules for testing

pub mod config;
pub mod config_io;
pub mod environment;
pub mod host;
pub mod ipc;
pub mod protocol;
pub mod services;
pub mod themes;
pub mod window;
