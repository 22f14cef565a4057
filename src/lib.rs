pub mod client;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod job;
pub mod structs;
pub mod web;

pub use client::{Client, JobsApi};
pub use credentials::Credentials;
pub use directory::JobDirectory;
pub use error::BaqmanError;
pub use job::{Job, JobPage, Pricing};
