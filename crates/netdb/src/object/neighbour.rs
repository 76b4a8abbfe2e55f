// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Neighbour object behavior.

use std::collections::BTreeSet;

use serde_json::json;

use netdb_core::{Error, Match, NeighbourRecord, RtnlRequest};

use super::{KeySpec, ObjectOps};

impl ObjectOps for NeighbourRecord {
    fn complete_key(key: KeySpec) -> Result<Match, Error> {
        let mut spec = Match::new();
        match key {
            KeySpec::Text(dst) => {
                spec.insert("dst".to_string(), json!(dst));
            }
            KeySpec::Num(ifindex) => {
                spec.insert("ifindex".to_string(), json!(ifindex));
            }
            KeySpec::Spec(map) => return Ok(map),
        }
        Ok(spec)
    }

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error> {
        if staged.ifindex == 0 {
            return Err(Error::InvalidState(
                "neighbour create needs an interface index".to_string(),
            ));
        }
        Ok(RtnlRequest::AddNeighbour(staged.clone()))
    }

    fn update_request(
        _loaded: &Self,
        _staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error> {
        if changed.is_empty() {
            return Ok(None);
        }
        Err(Error::InvalidState("neighbour rows are replaced, not updated".to_string()))
    }

    fn delete_request(loaded: &Self) -> RtnlRequest {
        RtnlRequest::DelNeighbour(loaded.clone())
    }

    fn natural_key(record: &Self) -> Match {
        let mut key = Match::new();
        key.insert("ifindex".to_string(), json!(record.ifindex));
        key.insert("dst".to_string(), json!(record.dst));
        key
    }
}
