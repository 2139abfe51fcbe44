//! Logic Module - supervisory loop, detection, containment, audit
//!
//! `lifecycle` is the boundary surface; everything else backs it.

pub mod audit;
pub mod capture;
pub mod config;
pub mod detection;
pub mod lifecycle;
pub mod media;
pub mod notify;
pub mod response;
pub mod supervisor;
