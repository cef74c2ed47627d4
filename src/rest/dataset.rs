//! Active and pending operational dataset resources

use super::{
    ACCEPT_HEADER, CONTENT_TYPE_HEADER, CONTENT_TYPE_PLAIN, HttpStatus, Request, Response,
    internal,
};
use crate::mesh::{DatasetKind, DeviceRole, MeshControl, MeshError, OperationalDataset};
use crate::{Error, Result};

/// Return the dataset as JSON, or as hex TLVs when `text/plain` is accepted
///
/// A missing dataset is `204 No Content`.
pub fn get(
    mesh: &dyn MeshControl,
    kind: DatasetKind,
    request: &Request,
    response: &mut Response,
) -> Result<()> {
    let dataset = match mesh.dataset(kind) {
        Ok(dataset) => dataset,
        Err(MeshError::NotFound) => {
            response.set_status(HttpStatus::NoContent);
            return Ok(());
        }
        Err(e) => return Err(internal(e)),
    };

    if request.header_is(ACCEPT_HEADER, CONTENT_TYPE_PLAIN) {
        response.set_content_type(CONTENT_TYPE_PLAIN);
        let tlvs = dataset
            .to_tlvs()
            .map_err(|e| Error::internal(e.to_string()))?;
        response.set_body(hex::encode_upper(tlvs));
    } else {
        let body = match kind {
            DatasetKind::Active => dataset.to_active_json()?,
            DatasetKind::Pending => dataset.to_pending_json()?,
        };
        response.set_body(body);
    }
    response.set_status(HttpStatus::Ok);
    Ok(())
}

/// Merge the request body into the stored dataset
///
/// When no dataset exists a fresh network is generated first and the reply
/// is `201 Created`. The active dataset may only change while the node is
/// disabled.
pub fn set(
    mesh: &mut dyn MeshControl,
    kind: DatasetKind,
    request: &Request,
    response: &mut Response,
) -> Result<()> {
    if kind == DatasetKind::Active && mesh.device_role() != DeviceRole::Disabled {
        return Err(Error::invalid_state(
            "active dataset can only change while the node is disabled",
        ));
    }

    let (mut dataset, status) = match mesh.dataset(kind) {
        Ok(dataset) => (dataset, HttpStatus::Ok),
        Err(MeshError::NotFound) => {
            let created = mesh.create_new_network().map_err(internal)?;
            tracing::info!(kind = kind.as_str(), "created new network dataset");
            (created, HttpStatus::Created)
        }
        Err(e) => return Err(internal(e)),
    };

    let update = if request.header_is(CONTENT_TYPE_HEADER, CONTENT_TYPE_PLAIN) {
        parse_tlv_body(request.body())?
    } else {
        match kind {
            DatasetKind::Active => OperationalDataset::from_active_json(request.body())?,
            DatasetKind::Pending => {
                let pending = OperationalDataset::from_pending_json(request.body())?;
                if pending.delay.is_none() {
                    return Err(Error::invalid_args("pending dataset requires Delay"));
                }
                pending
            }
        }
    };

    dataset.update(&update);
    mesh.set_dataset(kind, &dataset).map_err(internal)?;
    response.set_status(status);
    Ok(())
}

/// Hex TLVs, optionally wrapped in JSON quotes
fn parse_tlv_body(body: &[u8]) -> Result<OperationalDataset> {
    let text = std::str::from_utf8(body)
        .map_err(|_| Error::invalid_args("dataset TLVs must be hex text"))?
        .trim()
        .trim_matches('"');
    let bytes = hex::decode(text).map_err(|e| Error::invalid_args(e.to_string()))?;
    OperationalDataset::from_tlvs(&bytes)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::mesh::{SimTopology, SimulatedMesh};
    use crate::rest::{CONTENT_TYPE_JSON, HttpMethod};

    fn put(body: &str) -> Request {
        Request::new(HttpMethod::Put, "/node/dataset/active", Instant::now()).with_body(body)
    }

    fn disabled_mesh() -> SimulatedMesh {
        let mut mesh = SimulatedMesh::default();
        mesh.detach().unwrap();
        mesh
    }

    #[test]
    fn get_json_and_tlv_forms() {
        let mesh = SimulatedMesh::default();
        let get_req = Request::new(HttpMethod::Get, "/node/dataset/active", Instant::now());

        let mut resp = Response::new();
        get(&mesh, DatasetKind::Active, &get_req, &mut resp).unwrap();
        assert_eq!(resp.content_type(), CONTENT_TYPE_JSON);
        let json: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(json["Channel"], 15);

        let plain = get_req.with_header("Accept", CONTENT_TYPE_PLAIN);
        let mut resp = Response::new();
        get(&mesh, DatasetKind::Active, &plain, &mut resp).unwrap();
        assert_eq!(resp.content_type(), CONTENT_TYPE_PLAIN);
        let bytes = hex::decode(resp.body()).unwrap();
        let decoded = OperationalDataset::from_tlvs(&bytes).unwrap();
        assert_eq!(decoded.channel, Some(15));
    }

    #[test]
    fn missing_dataset_is_no_content() {
        let mesh = SimulatedMesh::default();
        let req = Request::new(HttpMethod::Get, "/node/dataset/pending", Instant::now());
        let mut resp = Response::new();
        get(&mesh, DatasetKind::Pending, &req, &mut resp).unwrap();
        assert_eq!(resp.status(), HttpStatus::NoContent);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn active_requires_disabled_role() {
        let mut mesh = SimulatedMesh::default();
        let mut resp = Response::new();
        let err = set(&mut mesh, DatasetKind::Active, &put(r#"{"Channel":20}"#), &mut resp)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn overlong_network_name_leaves_dataset_unchanged() {
        let mut mesh = disabled_mesh();
        for len in [17, 300] {
            let body = format!(r#"{{"NetworkName":"{}"}}"#, "n".repeat(len));
            let mut resp = Response::new();
            let err = set(&mut mesh, DatasetKind::Active, &put(&body), &mut resp).unwrap_err();
            assert!(matches!(err, Error::InvalidArgs(_)), "{len}-byte name");
        }

        let get_req = Request::new(HttpMethod::Get, "/node/dataset/active", Instant::now())
            .with_header("Accept", CONTENT_TYPE_PLAIN);
        let mut resp = Response::new();
        get(&mesh, DatasetKind::Active, &get_req, &mut resp).unwrap();
        let decoded = OperationalDataset::from_tlvs(&hex::decode(resp.body()).unwrap()).unwrap();
        assert_eq!(decoded.network_name.as_deref(), Some("OpenThread"));
    }

    #[test]
    fn json_update_merges() {
        let mut mesh = disabled_mesh();
        // detach keeps the dataset; erase is not part of detach
        let mut resp = Response::new();
        set(&mut mesh, DatasetKind::Active, &put(r#"{"Channel":20}"#), &mut resp).unwrap();

        assert_eq!(resp.status(), HttpStatus::Ok);
        let stored = mesh.dataset(DatasetKind::Active).unwrap();
        assert_eq!(stored.channel, Some(20));
        assert_eq!(stored.pan_id, Some(0xface));
    }

    #[test]
    fn absent_dataset_is_created() {
        let topology = SimTopology {
            commissioned: false,
            ..SimTopology::default()
        };
        let mut mesh = SimulatedMesh::new(topology, None);
        let mut resp = Response::new();
        set(&mut mesh, DatasetKind::Active, &put(r#"{"NetworkName":"lab"}"#), &mut resp)
            .unwrap();

        assert_eq!(resp.status(), HttpStatus::Created);
        let stored = mesh.dataset(DatasetKind::Active).unwrap();
        assert_eq!(stored.network_name.as_deref(), Some("lab"));
        assert!(stored.network_key.is_some());
    }

    #[test]
    fn tlv_update_merges() {
        let mut mesh = disabled_mesh();
        // channel 0x000b
        let req = put("000300000b").with_header("Content-Type", CONTENT_TYPE_PLAIN);
        let mut resp = Response::new();
        set(&mut mesh, DatasetKind::Active, &req, &mut resp).unwrap();
        assert_eq!(mesh.dataset(DatasetKind::Active).unwrap().channel, Some(11));

        let bad = put("0003zz").with_header("Content-Type", CONTENT_TYPE_PLAIN);
        let err = set(&mut mesh, DatasetKind::Active, &bad, &mut resp).unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));
    }

    #[test]
    fn pending_json_requires_delay() {
        let mut mesh = SimulatedMesh::default();
        let mut resp = Response::new();

        let err = set(
            &mut mesh,
            DatasetKind::Pending,
            &put(r#"{"ActiveDataset":{"Channel":12}}"#),
            &mut resp,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgs(_)));

        set(
            &mut mesh,
            DatasetKind::Pending,
            &put(r#"{"ActiveDataset":{"Channel":12},"Delay":30000}"#),
            &mut resp,
        )
        .unwrap();
        assert_eq!(resp.status(), HttpStatus::Created);
        assert_eq!(mesh.dataset(DatasetKind::Pending).unwrap().delay, Some(30_000));
    }
}
