// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The driver abstraction layer.
//!
//! The daemon never talks to the device model or to SwitchAPI directly.  It
//! drives them through the [`DriverOps`] trait, which each backend in the
//! `asic` crate implements: one backed by the vendor BMv2/SwitchAPI
//! libraries, and an in-process stand-in used for development and testing.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The identifier the device model uses for a single emulated switch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct DeviceId(pub u8);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DeviceId> for i32 {
    fn from(dev: DeviceId) -> Self {
        i32::from(dev.0)
    }
}

/// We only ever manage a single emulated switch, which is always registered
/// with the device model as device 0.
pub const DEFAULT_DEVICE_ID: DeviceId = DeviceId(0);

/// The resource count handed to SwitchAPI at initialization time, unless the
/// operator asks for something else.
pub const DEFAULT_MAX_PORTS: u32 = 256;

/// A specialized Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Error type conveying additional information about driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// A vendor library call returned a failure status.  `ctx` names the
    /// call, `status` is the raw value it returned.
    #[error("{ctx} failed with status {status}")]
    Status { ctx: String, status: i32 },
    /// An argument passed to the driver layer is invalid or inappropriate.
    /// This indicates misbehavior from the caller.
    #[error("Invalid argument: {}", .0)]
    InvalidArg(String),
    /// A driver function was called before the layer it depends on was
    /// initialized.  Indicates misbehavior from the caller.
    #[error("driver layer uninitialized: {}", .0)]
    Uninitialized(String),
    /// A caller is trying to start something that is already running.
    #[error("Already running: {}", .0)]
    AlreadyRunning(String),
    /// The driver layer failed while interacting with the operating system.
    #[error("IO error: {ctx}: {err}")]
    Io { ctx: String, err: std::io::Error },
    /// An error derived from a purposely triggered synthetic fault for
    /// testing purposes.
    #[error("Synthetic driver error: {}", .0)]
    Synthetic(String),
}

/// The `DriverOps` trait covers everything the daemon asks of the device
/// model, SwitchAPI, and the SwitchAPI RPC server.
///
/// The daemon calls these in a fixed order at startup:
/// [`pd_init`](DriverOps::pd_init), [`pd_dc_init`](DriverOps::pd_dc_init),
/// [`assign_device`](DriverOps::assign_device),
/// [`switch_api_init`](DriverOps::switch_api_init), and finally
/// [`rpc_server_start`](DriverOps::rpc_server_start).
pub trait DriverOps {
    /// A short name for the backend, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Initialize the device model's PD layer.
    fn pd_init(&self) -> DriverResult<()>;

    /// Initialize the PD layer of the "dc" P4 program loaded in the device
    /// model.
    fn pd_dc_init(&self) -> DriverResult<()>;

    /// Bind `device` to the running device model, reachable over thrift at
    /// `thrift_port` and publishing notifications on `notifications_addr`.
    fn assign_device(
        &self,
        device: DeviceId,
        notifications_addr: &str,
        thrift_port: u16,
    ) -> DriverResult<()>;

    /// Initialize SwitchAPI for `device`, sized for `max_ports`.
    fn switch_api_init(
        &self,
        device: DeviceId,
        max_ports: u32,
    ) -> DriverResult<()>;

    /// Start the RPC server exposing SwitchAPI, listening on `port`.  The
    /// server runs in the background once this returns.
    fn rpc_server_start(&self, port: u16) -> DriverResult<()>;

    /// Stop the RPC server, if the backend is able to.
    fn rpc_server_stop(&self);
}
