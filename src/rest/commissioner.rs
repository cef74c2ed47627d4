//! Commissioner state and joiner table resources

use serde::{Deserialize, Serialize};

use super::json::{hex_exact, parse_body, set_json, string_body};
use super::{Response, conflict, internal};
use crate::mesh::types::MAX_DISCERNER_LENGTH;
use crate::mesh::{
    CommissionerState, JoinerDiscerner, JoinerId, JoinerInfo, MeshControl, MeshError,
};
use crate::{Error, Result};

/// Joiner entry lifetime when the request omits one, in seconds
const DEFAULT_JOINER_TIMEOUT: u32 = 120;

/// Wire form of a joiner entry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JoinerJson {
    pskd: String,
    joiner_id: String,
    #[serde(default = "default_timeout")]
    timeout: u32,
}

const fn default_timeout() -> u32 {
    DEFAULT_JOINER_TIMEOUT
}

impl From<&JoinerInfo> for JoinerJson {
    fn from(info: &JoinerInfo) -> Self {
        let joiner_id = match info.id {
            JoinerId::Discerner(d) => format!("{:#x}/{}", d.value, d.length),
            other => other.to_string(),
        };
        Self {
            pskd: info.pskd.clone(),
            joiner_id,
            timeout: info.timeout,
        }
    }
}

/// Parse `"*"`, `"<value>/<length>"`, or a 16-digit hex EUI-64
///
/// The all-zero EUI-64 is the wildcard.
fn parse_joiner_id(text: &str) -> Result<JoinerId> {
    if text == "*" {
        return Ok(JoinerId::Any);
    }
    if let Some((value, length)) = text.split_once('/') {
        return parse_discerner(value, length).map(JoinerId::Discerner);
    }
    if text.len() != 16 {
        return Err(Error::invalid_args(format!("bad joiner id {text:?}")));
    }
    let eui = hex_exact::<8>(text)?;
    if eui == [0; 8] {
        Ok(JoinerId::Any)
    } else {
        Ok(JoinerId::Eui64(eui))
    }
}

fn parse_discerner(value: &str, length: &str) -> Result<JoinerDiscerner> {
    let bad = || Error::invalid_args(format!("bad joiner discerner {value:?}/{length:?}"));

    let value = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => value.parse(),
    }
    .map_err(|_| bad())?;
    let length: u8 = length.parse().map_err(|_| bad())?;

    if length == 0 || length > MAX_DISCERNER_LENGTH {
        return Err(bad());
    }
    if length < 64 && value >> length != 0 {
        return Err(bad());
    }
    Ok(JoinerDiscerner { value, length })
}

pub fn get_state(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    set_json(response, mesh.commissioner_state().as_str())
}

/// `"enable"` petitions for the commissioner role; `"disable"` resigns it
pub fn set_state(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    match string_body(body)?.as_str() {
        "enable" => {
            if mesh.commissioner_state() == CommissionerState::Disabled {
                mesh.commissioner_start().map_err(conflict)?;
                tracing::info!("commissioner started");
            }
        }
        "disable" => {
            if mesh.commissioner_state() != CommissionerState::Disabled {
                mesh.commissioner_stop().map_err(conflict)?;
                tracing::info!("commissioner stopped");
            }
        }
        other => return Err(Error::invalid_args(format!("unknown state {other:?}"))),
    }
    Ok(())
}

pub fn get_joiners(mesh: &dyn MeshControl, response: &mut Response) -> Result<()> {
    let joiners: Vec<JoinerJson> = mesh.joiners().iter().map(JoinerJson::from).collect();
    set_json(response, &joiners)
}

pub fn add_joiner(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    require_active(mesh)?;

    let json: JoinerJson = parse_body(body)?;
    let joiner = JoinerInfo {
        id: parse_joiner_id(&json.joiner_id)?,
        pskd: json.pskd,
        timeout: json.timeout,
    };

    mesh.add_joiner(&joiner).map_err(|e| match e {
        MeshError::InvalidArgs => Error::invalid_args("joiner rejected by the commissioner"),
        MeshError::NoBufs => Error::InsufficientStorage("joiner table is full".into()),
        other => internal(other),
    })?;
    tracing::info!(joiner = %joiner.id, "joiner added");
    Ok(())
}

/// Remove a joiner; removing an absent joiner succeeds
pub fn remove_joiner(mesh: &mut dyn MeshControl, body: &[u8]) -> Result<()> {
    require_active(mesh)?;

    let id = parse_joiner_id(&string_body(body)?)?;
    if let Err(e) = mesh.remove_joiner(&id) {
        tracing::debug!(joiner = %id, error = %e, "joiner removal ignored");
    }
    Ok(())
}

fn require_active(mesh: &dyn MeshControl) -> Result<()> {
    if mesh.commissioner_state() == CommissionerState::Active {
        Ok(())
    } else {
        Err(Error::invalid_state("commissioner is not active"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SimulatedMesh;
    use crate::mesh::sim::MAX_JOINERS;

    fn active_mesh() -> SimulatedMesh {
        let mut mesh = SimulatedMesh::default();
        set_state(&mut mesh, br#""enable""#).unwrap();
        mesh
    }

    fn joiner_body(id: &str) -> Vec<u8> {
        format!(r#"{{"Pskd":"J01NME","JoinerId":"{id}"}}"#).into_bytes()
    }

    #[test]
    fn joiner_id_forms() {
        assert_eq!(parse_joiner_id("*").unwrap(), JoinerId::Any);
        assert_eq!(parse_joiner_id("0000000000000000").unwrap(), JoinerId::Any);
        assert_eq!(
            parse_joiner_id("18b4300000000001").unwrap(),
            JoinerId::Eui64([0x18, 0xb4, 0x30, 0, 0, 0, 0, 1])
        );
        assert_eq!(
            parse_joiner_id("0xabc/12").unwrap(),
            JoinerId::Discerner(JoinerDiscerner {
                value: 0xabc,
                length: 12
            })
        );
        assert_eq!(
            parse_joiner_id("7/3").unwrap(),
            JoinerId::Discerner(JoinerDiscerner {
                value: 7,
                length: 3
            })
        );
    }

    #[test]
    fn bad_joiner_ids() {
        for bad in ["", "18b43", "zzzzzzzzzzzzzzzz", "8/3", "1/0", "1/65", "x/4", "1/x"] {
            assert!(parse_joiner_id(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn state_is_idempotent() {
        let mut mesh = SimulatedMesh::default();
        set_state(&mut mesh, br#""disable""#).unwrap();
        set_state(&mut mesh, br#""enable""#).unwrap();
        set_state(&mut mesh, br#""enable""#).unwrap();
        assert_eq!(mesh.commissioner_state(), CommissionerState::Active);

        let mut resp = Response::new();
        get_state(&mesh, &mut resp).unwrap();
        assert_eq!(resp.body(), br#""active""#);
    }

    #[test]
    fn joiners_need_active_commissioner() {
        let mut mesh = SimulatedMesh::default();
        let err = add_joiner(&mut mesh, &joiner_body("*")).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        let err = remove_joiner(&mut mesh, br#""*""#).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn add_list_remove() {
        let mut mesh = active_mesh();
        add_joiner(&mut mesh, &joiner_body("0xabc/12")).unwrap();
        add_joiner(&mut mesh, &joiner_body("*")).unwrap();

        let mut resp = Response::new();
        get_joiners(&mesh, &mut resp).unwrap();
        let list: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(list[0]["JoinerId"], "0xabc/12");
        assert_eq!(list[0]["Timeout"], 120);
        assert_eq!(list[1]["JoinerId"], "*");

        remove_joiner(&mut mesh, br#""0xabc/12""#).unwrap();
        remove_joiner(&mut mesh, br#""0xabc/12""#).unwrap();
        assert_eq!(mesh.joiners().len(), 1);
    }

    #[test]
    fn library_errors_are_remapped() {
        let mut mesh = active_mesh();

        let bad_pskd = br#"{"Pskd":"short","JoinerId":"*"}"#;
        let err = add_joiner(&mut mesh, bad_pskd).unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));

        for i in 1..=MAX_JOINERS {
            add_joiner(&mut mesh, &joiner_body(&format!("{i:016x}"))).unwrap();
        }
        let err = add_joiner(&mut mesh, &joiner_body("*")).unwrap_err();
        assert!(matches!(err, Error::InsufficientStorage(_)));
    }

    #[test]
    fn malformed_body_is_invalid_args() {
        let mut mesh = active_mesh();
        let err = add_joiner(&mut mesh, b"{}").unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));
        let err = remove_joiner(&mut mesh, b"*").unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));
    }
}
