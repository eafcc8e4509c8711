// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use slog::{info, o, warn};

use aal::{DeviceId, DriverError, DriverOps, DriverResult};

pub mod chaos;
mod rpc;

pub use chaos::{Chaos, DriverChaos};

/// Settings for the stub backend, typically loaded from a TOML file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Address the stand-in RPC server binds, combined with the RPC port
    /// given at startup.
    pub rpc_listen_ip: IpAddr,
    /// Fault injection for each operation.
    pub chaos: DriverChaos,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            rpc_listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            chaos: DriverChaos::default(),
        }
    }
}

/// One call made into the stub, in the order it was made.  Calls are recorded
/// whether or not they succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DriverEvent {
    PdInit,
    PdDcInit,
    AssignDevice {
        device: DeviceId,
        notifications_addr: String,
        thrift_port: u16,
    },
    SwitchApiInit {
        device: DeviceId,
        max_ports: u32,
    },
    RpcServerStart {
        port: u16,
    },
    RpcServerStop,
}

/// The device the stub has been told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedDevice {
    pub device: DeviceId,
    pub notifications_addr: String,
    pub thrift_port: u16,
}

/// What the stand-in RPC server reports to every client.
#[derive(Debug, Clone, Serialize)]
struct DriverStatus<'a> {
    backend: &'static str,
    device: &'a AssignedDevice,
    max_ports: u32,
}

#[derive(Default)]
struct StubState {
    pd_ready: bool,
    dc_ready: bool,
    device: Option<AssignedDevice>,
    max_ports: Option<u32>,
    rpc: Option<rpc::RpcServer>,
    events: Vec<DriverEvent>,
}

pub struct StubHandle {
    log: slog::Logger,
    config: DriverConfig,
    state: Mutex<StubState>,
}

impl StubHandle {
    pub fn new(log: &slog::Logger, config: &DriverConfig) -> DriverResult<Self> {
        config.chaos.validate()?;
        let log = log.new(o!("unit" => "stub"));
        Ok(StubHandle {
            log,
            config: config.clone(),
            state: Mutex::new(StubState::default()),
        })
    }

    /// Every call made so far, oldest first.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// The device registered through `assign_device`, if any.
    pub fn device(&self) -> Option<AssignedDevice> {
        self.state.lock().unwrap().device.clone()
    }

    /// The address the RPC server is bound to, if it is running.
    pub fn rpc_local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .unwrap()
            .rpc
            .as_ref()
            .map(|rpc| rpc.local_addr())
    }

    /// Release everything the stub is holding on to.
    pub fn fini(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(rpc) = state.rpc.take() {
            rpc.stop();
        }
        state.max_ports = None;
        state.device = None;
        state.dc_ready = false;
        state.pd_ready = false;
        info!(self.log, "stub driver finalized");
    }

    fn record(
        &self,
        event: DriverEvent,
    ) -> std::sync::MutexGuard<'_, StubState> {
        let mut state = self.state.lock().unwrap();
        state.events.push(event);
        state
    }
}

impl DriverOps for StubHandle {
    fn backend_name(&self) -> &'static str {
        "stub"
    }

    fn pd_init(&self) -> DriverResult<()> {
        let mut state = self.record(DriverEvent::PdInit);
        self.config.chaos.pd_init.unfurled(&self.log, "pd_init")?;
        state.pd_ready = true;
        info!(self.log, "pd initialized");
        Ok(())
    }

    fn pd_dc_init(&self) -> DriverResult<()> {
        let mut state = self.record(DriverEvent::PdDcInit);
        if !state.pd_ready {
            return Err(DriverError::Uninitialized("pd layer".to_string()));
        }
        self.config.chaos.pd_dc_init.unfurled(&self.log, "pd_dc_init")?;
        state.dc_ready = true;
        info!(self.log, "dc pd initialized");
        Ok(())
    }

    fn assign_device(
        &self,
        device: DeviceId,
        notifications_addr: &str,
        thrift_port: u16,
    ) -> DriverResult<()> {
        let mut state = self.record(DriverEvent::AssignDevice {
            device,
            notifications_addr: notifications_addr.to_string(),
            thrift_port,
        });
        if !state.dc_ready {
            return Err(DriverError::Uninitialized("dc pd layer".to_string()));
        }
        if let Some(existing) = &state.device {
            return Err(DriverError::AlreadyRunning(format!(
                "device {} already assigned",
                existing.device
            )));
        }
        self.config
            .chaos
            .assign_device
            .unfurled(&self.log, "assign_device")?;

        info!(self.log, "device assigned";
            "device" => %device,
            "notifications_addr" => notifications_addr,
            "thrift_port" => thrift_port);
        state.device = Some(AssignedDevice {
            device,
            notifications_addr: notifications_addr.to_string(),
            thrift_port,
        });
        Ok(())
    }

    fn switch_api_init(
        &self,
        device: DeviceId,
        max_ports: u32,
    ) -> DriverResult<()> {
        let mut state =
            self.record(DriverEvent::SwitchApiInit { device, max_ports });
        match &state.device {
            Some(assigned) if assigned.device == device => {}
            _ => {
                return Err(DriverError::InvalidArg(format!(
                    "device {device} has not been assigned"
                )))
            }
        }
        if max_ports == 0 {
            return Err(DriverError::InvalidArg(
                "max_ports must be positive".to_string(),
            ));
        }
        self.config
            .chaos
            .switch_api_init
            .unfurled(&self.log, "switch_api_init")?;

        state.max_ports = Some(max_ports);
        info!(self.log, "switch api initialized";
            "device" => %device, "max_ports" => max_ports);
        Ok(())
    }

    fn rpc_server_start(&self, port: u16) -> DriverResult<()> {
        let mut state = self.record(DriverEvent::RpcServerStart { port });
        if state.rpc.is_some() {
            return Err(DriverError::AlreadyRunning("rpc server".to_string()));
        }
        let (Some(device), Some(max_ports)) = (&state.device, state.max_ports)
        else {
            return Err(DriverError::Uninitialized("switch api".to_string()));
        };
        self.config
            .chaos
            .rpc_server_start
            .unfurled(&self.log, "rpc_server_start")?;

        let status = DriverStatus {
            backend: self.backend_name(),
            device,
            max_ports,
        };
        let greeting = serde_json::to_string(&status).map_err(|e| {
            DriverError::InvalidArg(format!("unable to encode status: {e}"))
        })?;
        let addr = SocketAddr::new(self.config.rpc_listen_ip, port);
        state.rpc = Some(rpc::RpcServer::start(&self.log, addr, greeting)?);
        Ok(())
    }

    fn rpc_server_stop(&self) {
        let mut state = self.record(DriverEvent::RpcServerStop);
        match state.rpc.take() {
            Some(rpc) => {
                info!(self.log, "stopping rpc server";
                    "address" => %rpc.local_addr());
                rpc.stop();
            }
            None => warn!(self.log, "rpc server is not running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use slog::Drain;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    const ADDR: &str = "ipc:///tmp/bmv2-0-notifications.ipc";

    fn logger() -> slog::Logger {
        let decorator =
            slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        slog::Logger::root(drain, o!())
    }

    fn loopback_config() -> DriverConfig {
        DriverConfig {
            rpc_listen_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Default::default()
        }
    }

    fn ready_stub(config: &DriverConfig) -> StubHandle {
        let hdl = StubHandle::new(&logger(), config).unwrap();
        hdl.pd_init().unwrap();
        hdl.pd_dc_init().unwrap();
        hdl.assign_device(DeviceId(0), ADDR, 9090).unwrap();
        hdl.switch_api_init(DeviceId(0), 256).unwrap();
        hdl
    }

    #[test]
    fn test_out_of_order_calls() {
        let hdl = StubHandle::new(&logger(), &DriverConfig::default()).unwrap();
        assert!(matches!(
            hdl.pd_dc_init(),
            Err(DriverError::Uninitialized(_))
        ));
        assert!(matches!(
            hdl.assign_device(DeviceId(0), ADDR, 9090),
            Err(DriverError::Uninitialized(_))
        ));
        assert!(matches!(
            hdl.switch_api_init(DeviceId(0), 256),
            Err(DriverError::InvalidArg(_))
        ));
        assert!(matches!(
            hdl.rpc_server_start(9091),
            Err(DriverError::Uninitialized(_))
        ));
        assert!(hdl.device().is_none());
        assert_eq!(hdl.events().len(), 4);
    }

    #[test]
    fn test_switch_api_wrong_device() {
        let hdl = StubHandle::new(&logger(), &DriverConfig::default()).unwrap();
        hdl.pd_init().unwrap();
        hdl.pd_dc_init().unwrap();
        hdl.assign_device(DeviceId(0), ADDR, 9090).unwrap();
        assert!(hdl.switch_api_init(DeviceId(1), 256).is_err());
        assert!(hdl.switch_api_init(DeviceId(0), 0).is_err());
        assert!(matches!(
            hdl.assign_device(DeviceId(0), ADDR, 9090),
            Err(DriverError::AlreadyRunning(_))
        ));
    }

    #[test]
    fn test_injected_fault() {
        let config = DriverConfig {
            chaos: DriverChaos {
                switch_api_init: Chaos::always(),
                ..Default::default()
            },
            ..Default::default()
        };
        let hdl = StubHandle::new(&logger(), &config).unwrap();
        hdl.pd_init().unwrap();
        hdl.pd_dc_init().unwrap();
        hdl.assign_device(DeviceId(0), ADDR, 9090).unwrap();
        assert!(matches!(
            hdl.switch_api_init(DeviceId(0), 256),
            Err(DriverError::Synthetic(_))
        ));
        // SwitchAPI never came up, so there is nothing to serve.
        assert!(matches!(
            hdl.rpc_server_start(9091),
            Err(DriverError::Uninitialized(_))
        ));
    }

    #[test]
    fn test_invalid_chaos_config() {
        let config = DriverConfig {
            chaos: DriverChaos {
                pd_init: Chaos { value: 2.0 },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(StubHandle::new(&logger(), &config).is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: DriverConfig = toml::from_str(
            r#"
            rpc_listen_ip = "127.0.0.1"
            [chaos]
            rpc_server_start = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.rpc_listen_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.chaos.rpc_server_start, Chaos::always());
        assert_eq!(config.chaos.pd_init, Chaos::default());

        let config: DriverConfig = toml::from_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_rpc_start_needs_runtime() {
        let hdl = ready_stub(&loopback_config());
        assert!(matches!(
            hdl.rpc_server_start(0),
            Err(DriverError::Uninitialized(_))
        ));
        assert!(hdl.rpc_local_addr().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rpc_server_lifecycle() {
        let hdl = ready_stub(&loopback_config());
        hdl.rpc_server_start(0).unwrap();
        let addr = hdl.rpc_local_addr().expect("rpc server not running");

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut reply = String::new();
        tokio::time::timeout(
            Duration::from_secs(10),
            stream.read_to_string(&mut reply),
        )
        .await
        .expect("timed out waiting for the rpc server")
        .unwrap();

        let status: serde_json::Value =
            serde_json::from_str(reply.trim()).unwrap();
        assert_eq!(status["backend"], "stub");
        assert_eq!(status["device"]["device"], 0);
        assert_eq!(status["device"]["notifications_addr"], ADDR);
        assert_eq!(status["device"]["thrift_port"], 9090);
        assert_eq!(status["max_ports"], 256);

        assert!(matches!(
            hdl.rpc_server_start(0),
            Err(DriverError::AlreadyRunning(_))
        ));

        hdl.rpc_server_stop();
        assert!(hdl.rpc_local_addr().is_none());
        hdl.fini();
        assert!(hdl.device().is_none());

        assert_eq!(
            hdl.events(),
            vec![
                DriverEvent::PdInit,
                DriverEvent::PdDcInit,
                DriverEvent::AssignDevice {
                    device: DeviceId(0),
                    notifications_addr: ADDR.to_string(),
                    thrift_port: 9090,
                },
                DriverEvent::SwitchApiInit {
                    device: DeviceId(0),
                    max_ports: 256,
                },
                DriverEvent::RpcServerStart { port: 0 },
                DriverEvent::RpcServerStart { port: 0 },
                DriverEvent::RpcServerStop,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rpc_port_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let hdl = ready_stub(&loopback_config());
        assert!(matches!(
            hdl.rpc_server_start(port),
            Err(DriverError::Io { .. })
        ));
        assert!(hdl.rpc_local_addr().is_none());
    }
}
