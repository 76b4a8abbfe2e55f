// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface object behavior: key completion, request building, and the
//! nested views joined on the interface index.

use std::collections::BTreeSet;

use serde_json::json;

use netdb_core::{
    AddressRecord, Error, LinkChanges, LinkRecord, Match, NeighbourRecord, RouteRecord,
    RtnlRequest, IFF_UP,
};

use crate::view::View;

use super::{DbObject, KeySpec, ObjectOps};

impl ObjectOps for LinkRecord {
    fn complete_key(key: KeySpec) -> Result<Match, Error> {
        let mut spec = Match::new();
        match key {
            KeySpec::Text(ifname) => {
                spec.insert("ifname".to_string(), json!(ifname));
            }
            KeySpec::Num(index) => {
                spec.insert("index".to_string(), json!(index));
            }
            KeySpec::Spec(map) => return Ok(map),
        }
        Ok(spec)
    }

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error> {
        if staged.ifname.is_empty() {
            return Err(Error::InvalidState("specify at least an ifname".to_string()));
        }
        Ok(RtnlRequest::AddLink(staged.clone()))
    }

    fn update_request(
        loaded: &Self,
        staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error> {
        let mut changes = LinkChanges::default();
        for field in changed {
            match field.as_str() {
                "state" | "flags" | "master" | "mtu" | "address" => {}
                other => {
                    return Err(Error::InvalidState(format!(
                        "{other} cannot be changed on a live interface"
                    )))
                }
            }
        }
        if changed.contains("state") || changed.contains("flags") {
            let mut mask = loaded.flags ^ staged.flags;
            if changed.contains("state") {
                mask |= IFF_UP;
            }
            if mask != 0 {
                changes.flags = Some((staged.flags, mask));
            }
        }
        if changed.contains("master") {
            changes.master = Some(staged.master.unwrap_or(0));
        }
        if changed.contains("mtu") {
            changes.mtu = staged.mtu;
        }
        if changed.contains("address") {
            changes.address = staged.address.clone();
        }
        if changes.is_empty() {
            return Ok(None);
        }
        // An update of a live interface always carries its master, so a
        // bridge port does not silently fall out of the bridge.
        if changes.master.is_none() {
            changes.master = staged.master;
        }
        Ok(Some(RtnlRequest::SetLink { index: loaded.index, changes }))
    }

    fn delete_request(loaded: &Self) -> RtnlRequest {
        RtnlRequest::DelLink { index: loaded.index }
    }

    fn natural_key(record: &Self) -> Match {
        let mut key = Match::new();
        key.insert("ifname".to_string(), json!(record.ifname));
        key
    }
}

impl DbObject<LinkRecord> {
    fn index(&self) -> Result<u64, Error> {
        self.observed()
            .map(|l| u64::from(l.index))
            .ok_or_else(|| Error::InvalidState("interface is not loaded".to_string()))
    }

    fn nested<E: ObjectOps>(&self, join_field: &str) -> Result<View<E>, Error>
    where
        crate::store::Store: crate::store::TableSelect<E>,
    {
        let inner = self.inner()?;
        let mut constraints = Match::new();
        constraints.insert("target".to_string(), json!(self.target().as_str()));
        constraints.insert(join_field.to_string(), json!(self.index()?));
        Ok(View::<E>::new(&inner, constraints))
    }

    /// Addresses configured on this interface.
    pub fn addresses(&self) -> Result<View<AddressRecord>, Error> {
        self.nested::<AddressRecord>("index")
    }

    /// Interfaces enslaved to this one.
    pub fn ports(&self) -> Result<View<LinkRecord>, Error> {
        self.nested::<LinkRecord>("master")
    }

    /// Routes leaving through this interface.
    pub fn routes(&self) -> Result<View<RouteRecord>, Error> {
        self.nested::<RouteRecord>("oif")
    }

    /// Neighbour cache entries seen on this interface.
    pub fn neighbours(&self) -> Result<View<NeighbourRecord>, Error> {
        self.nested::<NeighbourRecord>("ifindex")
    }

    /// Add one address to this interface and commit it.
    pub fn add_address(&self, address: &str, prefixlen: u8) -> Result<(), Error> {
        let view = self.addresses()?;
        let mut object: DbObject<AddressRecord> = view.create(json!({
            "address": address,
            "prefixlen": prefixlen,
        }))?;
        object.commit()?;
        Ok(())
    }

    /// Delete one address from this interface and commit the removal.
    pub fn del_address(&self, address: &str, prefixlen: u8) -> Result<(), Error> {
        let view = self.addresses()?;
        let mut object: DbObject<AddressRecord> = view
            .require(json!({ "address": address, "prefixlen": prefixlen }))?;
        object.remove().commit()?;
        Ok(())
    }

    /// Enslave an interface to this one (bridge/bond member).
    pub fn add_port(&self, port: impl Into<KeySpec>) -> Result<(), Error> {
        let inner = self.inner()?;
        let master = u32::try_from(self.index()?)
            .map_err(|_| Error::InvalidState("bad interface index".to_string()))?;
        let view: View<LinkRecord> = View::<LinkRecord>::new(&inner, self.target_constraint());
        let mut object: DbObject<LinkRecord> = view.require(port)?;
        object.set("master", json!(master))?.commit()?;
        Ok(())
    }

    fn target_constraint(&self) -> Match {
        let mut constraints = Match::new();
        constraints.insert("target".to_string(), json!(self.target().as_str()));
        constraints
    }
}
