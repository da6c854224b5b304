//! Lifecycle transitions of s390x devices: DASD and zFCP storage, OSA
//! network devices, FC LUNs, the channel subsystem ignore list and tapes.
//!
//! Every operation takes a [`host::Host`], which decides where OS paths
//! resolve and how external tools run.

pub mod config;
pub mod constants;
pub mod entity;
pub mod errors;
pub mod host;
pub mod ifcfg;
pub mod ignore;
pub mod lunscan;
pub mod network;
pub mod parse;
pub mod persist;
pub mod sanity;
pub mod storage;
pub mod sysfs;
pub mod tape;
pub mod task;
pub mod transition;
pub mod utils;
pub mod zfcp;
pub mod zipl;
