//! Manpower — agency onboarding core: auth, the subscription wizard and the
//! home dashboard, over pluggable identity, document and file backends.

pub mod auth;
pub mod blobs;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod packages;
pub mod store;
pub mod subscription;
pub mod uploads;
pub mod wizard;
