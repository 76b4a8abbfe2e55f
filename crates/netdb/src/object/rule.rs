// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing policy rule object behavior.

use std::collections::BTreeSet;

use serde_json::json;

use netdb_core::{Error, Match, RtnlRequest, RuleRecord};

use super::{KeySpec, ObjectOps};

impl ObjectOps for RuleRecord {
    fn complete_key(key: KeySpec) -> Result<Match, Error> {
        let mut spec = Match::new();
        match key {
            KeySpec::Num(priority) => {
                spec.insert("priority".to_string(), json!(priority));
            }
            KeySpec::Text(text) => return Err(Error::BadKey(text)),
            KeySpec::Spec(map) => return Ok(map),
        }
        Ok(spec)
    }

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error> {
        Ok(RtnlRequest::AddRule(staged.clone()))
    }

    fn update_request(
        _loaded: &Self,
        _staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error> {
        if changed.is_empty() {
            return Ok(None);
        }
        Err(Error::InvalidState("rule rows are replaced, not updated".to_string()))
    }

    fn delete_request(loaded: &Self) -> RtnlRequest {
        RtnlRequest::DelRule(loaded.clone())
    }

    fn natural_key(record: &Self) -> Match {
        let mut key = Match::new();
        key.insert("family".to_string(), json!(record.family));
        key.insert("priority".to_string(), json!(record.priority));
        key.insert("table".to_string(), json!(record.table));
        key.insert("src".to_string(), json!(record.src));
        key.insert("src_len".to_string(), json!(record.src_len));
        key.insert("dst".to_string(), json!(record.dst));
        key.insert("dst_len".to_string(), json!(record.dst_len));
        key.insert("tos".to_string(), json!(record.tos));
        key
    }
}
