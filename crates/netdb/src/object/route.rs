// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route object behavior.

use std::collections::BTreeSet;

use serde_json::json;

use netdb_core::{Error, Match, RouteRecord, RtnlRequest};

use super::{KeySpec, ObjectOps};

impl ObjectOps for RouteRecord {
    fn complete_key(key: KeySpec) -> Result<Match, Error> {
        let mut spec = Match::new();
        match key {
            // "10.0.1.0/24", a bare destination, or "default"
            KeySpec::Text(text) => {
                if text == "default" {
                    spec.insert("dst".to_string(), json!(null));
                } else if let Some((dst, dst_len)) = text.split_once('/') {
                    let dst_len: u8 =
                        dst_len.parse().map_err(|_| Error::BadKey(text.clone()))?;
                    spec.insert("dst".to_string(), json!(dst));
                    spec.insert("dst_len".to_string(), json!(dst_len));
                } else {
                    spec.insert("dst".to_string(), json!(text));
                }
            }
            KeySpec::Num(_) => {
                return Err(Error::BadKey("routes are keyed by dst/dst_len".to_string()))
            }
            KeySpec::Spec(map) => return Ok(map),
        }
        Ok(spec)
    }

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error> {
        Ok(RtnlRequest::AddRoute(staged.clone()))
    }

    fn update_request(
        _loaded: &Self,
        _staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error> {
        if changed.is_empty() {
            return Ok(None);
        }
        Err(Error::InvalidState("route rows are replaced, not updated".to_string()))
    }

    fn delete_request(loaded: &Self) -> RtnlRequest {
        RtnlRequest::DelRoute(loaded.clone())
    }

    fn natural_key(record: &Self) -> Match {
        let mut key = Match::new();
        key.insert("dst".to_string(), json!(record.dst));
        key.insert("dst_len".to_string(), json!(record.dst_len));
        key.insert("table".to_string(), json!(record.table));
        key.insert("priority".to_string(), json!(record.priority));
        key
    }
}
