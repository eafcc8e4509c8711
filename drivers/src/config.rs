// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Configuration for `drivers`.

use aal::DeviceId;
use asic::DriverConfig;
use common::logging::LogFormat;

use crate::types::{DriversError, DriversResult};

pub(crate) const RPC_PORT_ARG: &str = "switchapi-rpc-port";
pub(crate) const THRIFT_PORT_ARG: &str = "bmv2-thrift-port";
pub(crate) const MAX_PORTS_ARG: &str = "max-ports";

/// The Config structure captures all of the run-time settings, after they
/// have been validated.
#[derive(Debug)]
pub struct Config {
    /// Port on which the SwitchAPI RPC server listens.
    pub rpc_port: u16,

    /// Thrift port of the running BMv2 device model.
    pub thrift_port: u16,

    /// Endpoint on which BMv2 publishes notifications.  Passed through to the
    /// device model untouched.
    pub ipc_address: String,

    /// The device id under which the switch is registered.
    pub device_id: DeviceId,

    /// Resource count handed to SwitchAPI.
    pub max_ports: u32,

    /// If set, where the log should be written.  If not set, the log goes to
    /// stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: LogFormat,

    /// Backend-specific settings.
    pub driver_config: DriverConfig,
}

// A port argument must be a positive integer that fits in a TCP port.
fn parse_port(arg: &'static str, value: &str) -> DriversResult<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(DriversError::InvalidArgument(arg)),
    }
}

#[cfg(all(feature = "stub-config", not(feature = "bmv2")))]
fn load_driver_config(path: &Option<String>) -> DriversResult<DriverConfig> {
    let Some(path) = path else {
        return Ok(DriverConfig::default());
    };
    let txt = std::fs::read_to_string(path).map_err(|e| {
        DriversError::Config(format!("failed to read {path}: {e}"))
    })?;
    toml::from_str(&txt).map_err(|e| {
        DriversError::Config(format!("failed to parse {path}: {e}"))
    })
}

/// Validate the command line and build the Config used for the rest of the
/// daemon's life.  The RPC port is checked before the thrift port, and
/// nothing outside this process is touched here.
pub(crate) fn build_config(opts: &crate::Opt) -> DriversResult<Config> {
    let rpc_port = parse_port(RPC_PORT_ARG, &opts.switchapi_rpc_port)?;
    let thrift_port = parse_port(THRIFT_PORT_ARG, &opts.bmv2_thrift_port)?;

    let max_ports = match opts.max_ports {
        Some(0) => return Err(DriversError::InvalidArgument(MAX_PORTS_ARG)),
        Some(n) => n,
        None => aal::DEFAULT_MAX_PORTS,
    };

    #[cfg(all(feature = "stub-config", not(feature = "bmv2")))]
    let driver_config = load_driver_config(&opts.stub_config)?;
    #[cfg(not(all(feature = "stub-config", not(feature = "bmv2"))))]
    let driver_config = DriverConfig::default();

    Ok(Config {
        rpc_port,
        thrift_port,
        ipc_address: opts.bmv2_ipc_address.clone(),
        device_id: aal::DEFAULT_DEVICE_ID,
        max_ports,
        log_file: opts.log_file.clone(),
        log_format: opts.log_format.unwrap_or_default(),
        driver_config,
    })
}
