//! bowtieacquire - safety-incident acquisition and bowtie risk extraction.
//!
//! Discovers CSB and BSEE incident reports, downloads and extracts their text,
//! structures it into bowtie JSON with an LLM, and reconciles the CSV
//! manifests that track each stage.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod extraction;
pub mod llm;
pub mod manifest;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod validation;

#[cfg(test)]
mod test_support;
