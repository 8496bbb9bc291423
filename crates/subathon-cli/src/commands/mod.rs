pub mod config;
pub mod event;
pub mod parse;
pub mod run;
pub mod timer;
