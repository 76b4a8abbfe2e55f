// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Address object behavior.

use std::collections::BTreeSet;

use serde_json::json;

use netdb_core::{AddressRecord, Error, Match, RtnlRequest};

use super::{KeySpec, ObjectOps};

impl ObjectOps for AddressRecord {
    fn complete_key(key: KeySpec) -> Result<Match, Error> {
        let mut spec = Match::new();
        match key {
            // "10.0.0.2/24" or a bare address
            KeySpec::Text(text) => {
                if let Some((address, prefixlen)) = text.split_once('/') {
                    let prefixlen: u8 = prefixlen
                        .parse()
                        .map_err(|_| Error::BadKey(text.clone()))?;
                    spec.insert("address".to_string(), json!(address));
                    spec.insert("prefixlen".to_string(), json!(prefixlen));
                } else {
                    spec.insert("address".to_string(), json!(text));
                }
            }
            KeySpec::Num(_) => {
                return Err(Error::BadKey(
                    "addresses are keyed by address/prefixlen".to_string(),
                ))
            }
            KeySpec::Spec(map) => return Ok(map),
        }
        Ok(spec)
    }

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error> {
        if staged.index == 0 {
            return Err(Error::InvalidState(
                "address create needs an owning interface index".to_string(),
            ));
        }
        Ok(RtnlRequest::AddAddress(staged.clone()))
    }

    fn update_request(
        _loaded: &Self,
        _staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error> {
        if changed.is_empty() {
            return Ok(None);
        }
        Err(Error::InvalidState("address rows are replaced, not updated".to_string()))
    }

    fn delete_request(loaded: &Self) -> RtnlRequest {
        RtnlRequest::DelAddress(loaded.clone())
    }

    fn natural_key(record: &Self) -> Match {
        let mut key = Match::new();
        key.insert("index".to_string(), json!(record.index));
        key.insert("address".to_string(), json!(record.address));
        key.insert("prefixlen".to_string(), json!(record.prefixlen));
        key
    }
}
