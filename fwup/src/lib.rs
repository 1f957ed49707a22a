// Licensed under the Apache-2.0 license

//! PLDM firmware update protocol engine for a root-of-trust device.
//!
//! The engine plays both protocol roles: as a firmware device it answers an
//! update agent's inventory and update commands and stages inbound payloads
//! into flash; as an update agent it issues those commands to peer devices
//! and assembles the returned descriptors and component parameters.
//!
//! The engine is single-threaded and never blocks: each invocation consumes
//! one inbound message ([`dispatcher::CmdInterface::process_message`]) or one
//! timer tick ([`dispatcher::CmdInterface::tick`]) and returns. Transport,
//! flash drivers and the device registry are collaborators reached through
//! traits.

#![cfg_attr(not(test), no_std)]

pub mod component;
pub mod config;
pub mod device_manager;
pub mod dispatcher;
pub mod error;
pub mod fd;
pub mod flash_map;
pub mod instance_id;
pub mod multipart;
pub mod session;
pub mod state_machine;
pub mod ua;
