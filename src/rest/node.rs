//! Node resources: identity, role, addresses, leader data

use std::net::Ipv6Addr;

use serde::Serialize;

use super::json::{hex_exact, set_hex, set_json, string_body};
use super::{Response, conflict, internal};
use crate::mesh::{LeaderData, MeshControl};
use crate::{Error, Result};

/// Body of `GET /node`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfo {
    ba_id: String,
    state: &'static str,
    num_of_router: usize,
    rloc_address: Ipv6Addr,
    ext_address: String,
    network_name: String,
    rloc16: u16,
    leader_data: LeaderData,
    ext_pan_id: String,
}

fn router_count(mesh: &dyn MeshControl) -> usize {
    (0..=mesh.max_router_id())
        .filter(|&id| mesh.is_router_allocated(id))
        .count()
}

pub fn get_info(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    let ba_id = mesh.border_agent_id().map_err(internal)?;
    let info = NodeInfo {
        ba_id: hex::encode_upper(ba_id),
        state: mesh.device_role().as_str(),
        num_of_router: router_count(mesh),
        rloc_address: mesh.rloc_address(),
        ext_address: hex::encode_upper(mesh.ext_address()),
        network_name: mesh.network_name(),
        rloc16: mesh.rloc16(),
        leader_data: mesh.leader_data().unwrap_or_default(),
        ext_pan_id: hex::encode_upper(mesh.ext_panid()),
    };
    set_json(response, &info)
}

/// Detach, wipe persistent state, and reset the stack
pub fn delete(mesh: &mut dyn MeshControl) -> Result<()> {
    mesh.detach().map_err(conflict)?;
    mesh.erase_persistent_info().map_err(internal)?;
    mesh.reset();
    tracing::info!("node erased and reset");
    Ok(())
}

pub fn get_ba_id(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    let id = mesh.border_agent_id().map_err(internal)?;
    set_hex(response, &id)
}

pub fn get_state(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, mesh.device_role().as_str())
}

/// `"enable"` brings IPv6 then the mesh up; `"disable"` takes them down
pub fn set_state(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    match string_body(body)?.as_str() {
        "enable" => {
            if !mesh.is_ip6_enabled() {
                mesh.set_ip6_enabled(true).map_err(conflict)?;
            }
            mesh.set_thread_enabled(true).map_err(conflict)?;
        }
        "disable" => {
            mesh.set_thread_enabled(false).map_err(conflict)?;
            mesh.set_ip6_enabled(false).map_err(conflict)?;
        }
        other => return Err(Error::invalid_args(format!("unknown state {other:?}"))),
    }
    Ok(())
}

pub fn get_ext_address(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_hex(response, &mesh.ext_address())
}

/// Set the extended address; an empty string restores the factory EUI-64
pub fn set_ext_address(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    let text = string_body(body)?;
    let address = if text.is_empty() {
        mesh.factory_eui64()
    } else {
        hex_exact::<8>(&text)?
    };
    mesh.set_ext_address(address).map_err(conflict)
}

pub fn get_network_name(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.network_name())
}

pub fn get_leader_data(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    let data = mesh.leader_data().map_err(internal)?;
    set_json(response, &data)
}

pub fn get_num_of_router(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &router_count(mesh))
}

pub fn get_rloc16(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.rloc16())
}

pub fn get_ext_panid(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_hex(response, &mesh.ext_panid())
}

pub fn get_rloc(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.rloc_address())
}

pub fn get_mleid(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, &mesh.mesh_local_eid())
}
