// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::ffi::CString;
use std::sync::Mutex;

use libc::{c_int, c_uint};
use serde::{Deserialize, Serialize};
use slog::{error, info, o, warn};

use aal::{DeviceId, DriverError, DriverOps, DriverResult};

mod pd;

use pd::*;

/// The bmv2 backend has no tunables of its own.  Everything it needs arrives
/// through the `DriverOps` calls.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DriverConfig {}

// `api_rpc_port` is process-global state owned by the SwitchAPI library.
// Writes to it, and the server start that reads it, happen under this lock.
static RPC_PORT_LOCK: Mutex<()> = Mutex::new(());

fn check_pd(ctx: &str, status: p4_pd_status_t) -> DriverResult<()> {
    match status {
        P4_PD_SUCCESS => Ok(()),
        status => Err(DriverError::Status {
            ctx: ctx.to_string(),
            status,
        }),
    }
}

// SwitchAPI and its RPC server report failure with negative values.
fn check_switch(ctx: &str, status: c_int) -> DriverResult<()> {
    if status < 0 {
        Err(DriverError::Status {
            ctx: ctx.to_string(),
            status,
        })
    } else {
        Ok(())
    }
}

pub struct Bmv2Handle {
    log: slog::Logger,
    // The device handed to the PD layer, so it can be removed at shutdown.
    device: Mutex<Option<DeviceId>>,
}

impl Bmv2Handle {
    pub fn new(
        log: &slog::Logger,
        _config: &DriverConfig,
    ) -> DriverResult<Self> {
        Ok(Bmv2Handle {
            log: log.new(o!("unit" => "bmv2")),
            device: Mutex::new(None),
        })
    }

    pub fn fini(&self) {
        if let Some(device) = self.device.lock().unwrap().take() {
            let rc = unsafe { p4_pd_dc_remove_device(device.into()) };
            if let Err(e) = check_pd("p4_pd_dc_remove_device", rc) {
                error!(self.log, "failed to remove device";
                    "device" => %device, "error" => %e);
            }
        }
        if let Err(e) = check_pd("p4_pd_cleanup", unsafe { p4_pd_cleanup() })
        {
            error!(self.log, "pd cleanup failed"; "error" => %e);
        }
        info!(self.log, "bmv2 driver finalized");
    }
}

impl DriverOps for Bmv2Handle {
    fn backend_name(&self) -> &'static str {
        "bmv2"
    }

    fn pd_init(&self) -> DriverResult<()> {
        check_pd("p4_pd_init", unsafe { p4_pd_init() })
    }

    fn pd_dc_init(&self) -> DriverResult<()> {
        check_pd("p4_pd_dc_init", unsafe { p4_pd_dc_init() })
    }

    fn assign_device(
        &self,
        device: DeviceId,
        notifications_addr: &str,
        thrift_port: u16,
    ) -> DriverResult<()> {
        let addr = CString::new(notifications_addr).map_err(|e| {
            DriverError::InvalidArg(format!(
                "notifications address {notifications_addr:?}: {e}"
            ))
        })?;
        let rc = unsafe {
            p4_pd_dc_assign_device(
                device.into(),
                addr.as_ptr(),
                c_int::from(thrift_port),
            )
        };
        check_pd("p4_pd_dc_assign_device", rc)?;
        *self.device.lock().unwrap() = Some(device);
        Ok(())
    }

    fn switch_api_init(
        &self,
        device: DeviceId,
        max_ports: u32,
    ) -> DriverResult<()> {
        let rc =
            unsafe { switch_api_init(device.into(), max_ports as c_uint) };
        check_switch("switch_api_init", rc)
    }

    fn rpc_server_start(&self, port: u16) -> DriverResult<()> {
        let _guard = RPC_PORT_LOCK.lock().unwrap();
        let rc = unsafe {
            api_rpc_port = c_int::from(port);
            start_switch_api_rpc_server()
        };
        check_switch("start_switch_api_rpc_server", rc)
    }

    fn rpc_server_stop(&self) {
        // The thrift server offers no way to stop it.  It goes away with the
        // process.
        warn!(self.log, "SwitchAPI RPC server runs until the process exits");
    }
}
