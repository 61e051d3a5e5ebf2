//! Google Drive credential tooling for clipdrive.
//!
//! This crate covers the authentication side of the clipping archive:
//! environment configuration, the stored OAuth token artifact, the
//! interactive consent flow used to (re)generate it, a Drive v3 REST client,
//! upload helpers for clipping output files, and setup diagnostics.
//!
//! # Design Principles
//! - Token scope is fixed at issuance: widening access means deleting the
//!   artifact and running the consent flow again
//! - All network operations are async
//! - Diagnostics never mutate state; remediation is always explicit

pub mod auth;
pub mod client;
pub mod config;
pub mod consent;
pub mod doctor;
pub mod token;
pub mod upload;

pub use auth::{AuthConfig, AuthManager, TokenManager};
pub use client::{DriveClient, DriveFile, DriveUser};
pub use config::Settings;
pub use consent::ConsentFlow;
pub use token::{TokenArtifact, TokenSource, TokenStore};
