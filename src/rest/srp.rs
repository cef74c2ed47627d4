//! SRP server and client resources

use std::net::Ipv6Addr;

use serde::Deserialize;

use super::json::{parse_body, set_json, string_body};
use super::{Response, conflict, internal};
use crate::mesh::{
    HostAddress, MeshControl, MeshError, SrpClientItemState, SrpService, TxtEntry,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HostRequest {
    host_name: String,
    host_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRequest {
    service_name: String,
    instance_name: String,
    port: u16,
    #[serde(default)]
    priority: u16,
    #[serde(default)]
    weight: u16,
    #[serde(default)]
    txt_entries: Vec<TxtEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceKey {
    service_name: String,
    instance_name: String,
}

pub fn get_server_state(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, mesh.srp_server_state().as_str())
}

pub fn set_server_state(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    match string_body(body)?.as_str() {
        "enable" => mesh.set_srp_server_enabled(true),
        "disable" => mesh.set_srp_server_enabled(false),
        other => return Err(Error::invalid_args(format!("unknown state {other:?}"))),
    }
    Ok(())
}

pub fn get_client_state(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    let state = if mesh.is_srp_client_running() {
        "enabled"
    } else {
        "disabled"
    };
    set_json(response, state)
}

/// `"autostart"` lets the client follow server discovery; `"disable"` stops it
pub fn set_client_state(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    match string_body(body)?.as_str() {
        "autostart" => mesh.srp_client_enable_auto_start(),
        "disable" => {
            mesh.srp_client_disable_auto_start();
            mesh.srp_client_stop();
        }
        other => return Err(Error::invalid_args(format!("unknown state {other:?}"))),
    }
    Ok(())
}

pub fn get_host(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.srp_client_host())
}

/// Register the host name and address
///
/// The address is applied before the name so a rejected name leaves the
/// previous registration untouched.
pub fn set_host(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    let request: HostRequest = parse_body(body)?;

    if request.host_name.is_empty()
        || request.host_name.len() + 1 > mesh.srp_client_host_name_capacity()
    {
        return Err(Error::invalid_args("host name does not fit"));
    }
    let address = if request.host_address == "auto" {
        HostAddress::Auto
    } else {
        let addr: Ipv6Addr = request
            .host_address
            .parse()
            .map_err(|_| Error::invalid_args(format!("bad address {:?}", request.host_address)))?;
        HostAddress::Address(addr)
    };

    mesh.srp_client_set_host_address(address).map_err(conflict)?;
    mesh.srp_client_set_host_name(&request.host_name)
        .map_err(conflict)?;
    tracing::info!(host = %request.host_name, "srp host set");
    Ok(())
}

/// Remove the host and every service registered under it
pub fn remove_host(mesh: &mut dyn MeshControl) -> Result<()> {
    mesh.srp_client_remove_host().map_err(conflict)
}

pub fn get_services(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.srp_client_services())
}

pub fn add_service(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    let request: ServiceRequest = parse_body(body)?;
    if request.service_name.is_empty() || request.instance_name.is_empty() {
        return Err(Error::invalid_args("service and instance names are required"));
    }

    let service = SrpService {
        service_name: request.service_name,
        instance_name: request.instance_name,
        port: request.port,
        priority: request.priority,
        weight: request.weight,
        txt_entries: request.txt_entries,
        state: SrpClientItemState::ToAdd,
    };
    let label = format!("{}.{}", service.instance_name, service.service_name);

    mesh.srp_client_add_service(service).map_err(|e| match e {
        MeshError::NoBufs => internal(e),
        other => conflict(other),
    })?;
    tracing::info!(service = %label, "srp service added");
    Ok(())
}

pub fn remove_service(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    let key: ServiceKey = parse_body(body)?;
    mesh.srp_client_remove_service(&key.service_name, &key.instance_name)
        .map_err(|e| match e {
            MeshError::NotFound => Error::NotFound(format!(
                "{}.{}",
                key.instance_name, key.service_name
            )),
            other => conflict(other),
        })
}
