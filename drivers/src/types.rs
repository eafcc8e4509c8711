// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use aal::DriverError;

/// Everything that can stop the daemon from coming up.  Each of these is
/// fatal: the `Display` text is what gets reported to the operator before the
/// process exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum DriversError {
    #[error(
        "Expected arguments: <switchapi-rpc-port> <bmv2-thrift-port> <bmv2-ipc-address>"
    )]
    Usage,
    /// A command-line value failed validation.  The payload names the
    /// argument.
    #[error("Invalid <{0}> argument.")]
    InvalidArgument(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to create the switch driver: {0}")]
    Driver(#[source] DriverError),
    #[error("Failed to initialize the BMv2 device model.")]
    DeviceModel(#[source] DriverError),
    #[error("Failed to initialize SwitchAPI.")]
    SwitchApiInit(#[source] DriverError),
    #[error("Failed to start SwitchAPI RPC server.")]
    RpcServerStart(#[source] DriverError),
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

pub type DriversResult<T> = Result<T, DriversError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_messages() {
        assert_eq!(
            DriversError::InvalidArgument("bmv2-thrift-port").to_string(),
            "Invalid <bmv2-thrift-port> argument."
        );

        let e = DriversError::SwitchApiInit(DriverError::Status {
            ctx: "switch_api_init".to_string(),
            status: -1,
        });
        assert_eq!(e.to_string(), "Failed to initialize SwitchAPI.");
        assert_eq!(
            e.source().unwrap().to_string(),
            "switch_api_init failed with status -1"
        );
    }
}
