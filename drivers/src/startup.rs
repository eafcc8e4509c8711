// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Bring-up and tear-down of the driver stack.
//!
//! Startup is a fixed chain: the device model's PD layer, the PD layer of
//! the "dc" program, registration of the device with the running model,
//! SwitchAPI, and finally the SwitchAPI RPC server.  The first failure ends
//! the chain; nothing is retried and nothing later in the chain is attempted.

use slog::{error, info};

use aal::{DeviceId, DriverError, DriverOps, DriverResult};

use crate::config::Config;
use crate::types::{DriversError, DriversResult};

/// The values handed to the driver during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupParams<'a> {
    pub device: DeviceId,
    pub notifications_addr: &'a str,
    pub thrift_port: u16,
    pub max_ports: u32,
    pub rpc_port: u16,
}

impl<'a> From<&'a Config> for StartupParams<'a> {
    fn from(config: &'a Config) -> Self {
        StartupParams {
            device: config.device_id,
            notifications_addr: &config.ipc_address,
            thrift_port: config.thrift_port,
            max_ports: config.max_ports,
            rpc_port: config.rpc_port,
        }
    }
}

// Log the outcome of one step of the chain, classifying any failure.
fn step(
    log: &slog::Logger,
    name: &str,
    result: DriverResult<()>,
    kind: fn(DriverError) -> DriversError,
) -> DriversResult<()> {
    match result {
        Ok(()) => {
            info!(log, "{name} complete");
            Ok(())
        }
        Err(e) => {
            error!(log, "{name} failed"; "error" => %e);
            Err(kind(e))
        }
    }
}

/// Run the startup chain against `driver`.
pub fn start<D: DriverOps + ?Sized>(
    log: &slog::Logger,
    driver: &D,
    params: &StartupParams,
) -> DriversResult<()> {
    info!(log, "starting driver stack";
        "backend" => driver.backend_name(),
        "device" => %params.device,
        "notifications_addr" => params.notifications_addr,
        "thrift_port" => params.thrift_port,
        "max_ports" => params.max_ports,
        "rpc_port" => params.rpc_port);

    step(log, "pd_init", driver.pd_init(), DriversError::DeviceModel)?;
    step(log, "pd_dc_init", driver.pd_dc_init(), DriversError::DeviceModel)?;
    step(
        log,
        "assign_device",
        driver.assign_device(
            params.device,
            params.notifications_addr,
            params.thrift_port,
        ),
        DriversError::DeviceModel,
    )?;
    step(
        log,
        "switch_api_init",
        driver.switch_api_init(params.device, params.max_ports),
        DriversError::SwitchApiInit,
    )?;
    step(
        log,
        "rpc_server_start",
        driver.rpc_server_start(params.rpc_port),
        DriversError::RpcServerStart,
    )
}

/// Stop the services started by [`start`] that the backend can stop.
pub fn shutdown<D: DriverOps + ?Sized>(log: &slog::Logger, driver: &D) {
    info!(log, "stopping rpc server");
    driver.rpc_server_stop();
}
