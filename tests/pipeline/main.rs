#[path = "../support/mod.rs"]
mod support;

mod http_dashboard;
mod runner;
