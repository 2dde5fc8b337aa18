//! aesop-pubmed — PubMed E-utilities client.

pub mod client;
pub mod models;
mod xml;

pub use client::{PubMedClient, PubMedError};
pub use models::Paper;
