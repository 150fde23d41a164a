//! Clients for the external lookup services.
//!
//! Each submodule wraps one third-party oracle:
//!
//! - [`cymru`]: Team Cymru's DNS TXT IP-to-ASN lookup service
//! - [`ipapi`]: ip-api.com's batch geolocation endpoint
//! - [`ipinfo`]: ipinfo.io's per-address endpoint
//! - [`ripestat`]: RIPEstat's AS overview and neighbour endpoints

pub mod cymru;
pub mod ipapi;
pub mod ipinfo;
pub mod ripestat;

pub use crate::datasets::cymru::*;
pub use crate::datasets::ipapi::*;
pub use crate::datasets::ipinfo::*;
pub use crate::datasets::ripestat::*;
