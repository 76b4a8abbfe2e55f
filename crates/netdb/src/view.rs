// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Views: filtered, typed projections of one table.
//!
//! A view carries sticky constraints that apply to every operation and
//! are inherited by objects it creates. Specialized views (`bridges`,
//! `vlans`) read the mirror tables and carry their own summary columns.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use netdb_core::{Error, Match, SyncPoint, Target, Value};

use crate::dbm::{condition_holds, WaitCond};
use crate::object::{DbObject, KeySpec, ObjectOps};
use crate::report::Report;
use crate::store::{MirrorKind, Store, TableSelect};
use crate::NdbInner;

/// A collection facade over one table.
pub struct View<E: ObjectOps>
where
    Store: TableSelect<E>,
{
    inner: Arc<NdbInner>,
    constraints: Match,
    mirror: Option<MirrorKind>,
    summary_override: Option<&'static [&'static str]>,
    marker: std::marker::PhantomData<E>,
}

impl<E: ObjectOps> Clone for View<E>
where
    Store: TableSelect<E>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            constraints: self.constraints.clone(),
            mirror: self.mirror,
            summary_override: self.summary_override,
            marker: std::marker::PhantomData,
        }
    }
}

impl<E: ObjectOps> View<E>
where
    Store: TableSelect<E>,
{
    pub(crate) fn new(inner: &Arc<NdbInner>, constraints: Match) -> Self {
        Self {
            inner: Arc::clone(inner),
            constraints,
            mirror: None,
            summary_override: None,
            marker: std::marker::PhantomData,
        }
    }

    pub(crate) fn specialized(
        inner: &Arc<NdbInner>,
        constraints: Match,
        mirror: MirrorKind,
        summary: &'static [&'static str],
    ) -> Self {
        Self {
            inner: Arc::clone(inner),
            constraints,
            mirror: Some(mirror),
            summary_override: Some(summary),
            marker: std::marker::PhantomData,
        }
    }

    /// Add a sticky filter. Applied to every subsequent operation and
    /// inherited by created objects.
    pub fn constrain(mut self, field: &str, value: Value) -> Self {
        self.constraints.insert(field.to_string(), value);
        self
    }

    /// Restrict the view to one target.
    pub fn on(self, target: impl Into<Target>) -> Self {
        let target = target.into();
        self.constrain("target", json!(target.as_str()))
    }

    /// Merge extra conditions into the sticky constraints and split off
    /// the target.
    fn merged_spec(&self, extra: Match) -> (Target, Match) {
        let mut spec = self.constraints.clone();
        spec.extend(extra);
        let target = spec
            .remove("target")
            .and_then(|v| v.as_str().map(Target::new))
            .unwrap_or_default();
        (target, spec)
    }

    fn matching_rows(&self) -> Result<Vec<(Target, E)>, Error> {
        self.inner.ensure_alive()?;
        let store = self.inner.read_store()?;
        let mut spec = self.constraints.clone();
        let target = spec.remove("target").and_then(|v| v.as_str().map(Target::new));
        let rows = match self.mirror.and_then(|m| TableSelect::<E>::mirror(&*store, m)) {
            Some(map) => map
                .iter()
                .filter(|((t, _), _)| target.as_ref().map_or(true, |want| t == want))
                .filter(|(_, record)| record.matches(&spec))
                .map(|((t, _), record)| (t.clone(), record.clone()))
                .collect(),
            None => TableSelect::<E>::table(&*store).select(target.as_ref(), &spec),
        };
        Ok(rows)
    }

    /// Instantiate a new object in `invalid` state. Nothing reaches the
    /// kernel until `commit()`.
    pub fn create(&self, spec: Value) -> Result<DbObject<E>, Error> {
        self.inner.ensure_alive()?;
        let map = spec
            .as_object()
            .cloned()
            .ok_or_else(|| Error::BadKey("create spec must be a JSON object".to_string()))?;
        let mut staged = E::default();
        let mut changed = BTreeSet::new();
        let mut target = Target::localhost();
        let constraint_fields: Vec<(String, Value)> = self
            .constraints
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(map.into_iter())
            .collect();
        for (field, value) in constraint_fields {
            if field == "target" {
                if let Some(label) = value.as_str() {
                    target = Target::new(label);
                }
                continue;
            }
            staged.set_field(&field, &value)?;
            changed.insert(field);
        }
        Ok(DbObject::created(&self.inner, target, staged, changed))
    }

    /// Load an object by natural key. Scalar keys are completed per
    /// family (`"eth0"`, `42`, `"10.0.0.1/24"`).
    pub fn get(&self, key: impl Into<KeySpec>) -> Result<Option<DbObject<E>>, Error> {
        self.inner.ensure_alive()?;
        let (target, spec) = self.merged_spec(E::complete_key(key.into())?);
        let store = self.inner.read_store()?;
        let row = TableSelect::<E>::table(&*store)
            .select(Some(&target), &spec)
            .into_iter()
            .next();
        Ok(row.map(|(t, record)| DbObject::from_row(&self.inner, t, record)))
    }

    /// Like `get`, but a missing row is an error.
    pub fn require(&self, key: impl Into<KeySpec>) -> Result<DbObject<E>, Error> {
        let key = key.into();
        let shown = format!("{:?}", key);
        self.get(key)?.ok_or(Error::NotFound(shown))
    }

    /// Block until a row matching `spec` appears, then return it.
    pub fn wait(&self, spec: Value, timeout: Option<Duration>) -> Result<DbObject<E>, Error> {
        self.inner.ensure_alive()?;
        let map = spec
            .as_object()
            .cloned()
            .ok_or_else(|| Error::BadKey("wait spec must be a JSON object".to_string()))?;
        let (target, match_spec) = self.merged_spec(map.into_iter().collect());
        let timeout = timeout.unwrap_or(self.inner.options.rtnl_timeout);
        let cond = WaitCond::Appear(match_spec.clone());
        let point = SyncPoint::new();
        let waiter =
            self.inner.waiters.register(E::KIND, &target, cond.clone(), point.clone());
        let found = condition_holds(&self.inner.store.read_unchecked(), E::KIND, &target, &cond)
            || point.wait(timeout);
        self.inner.waiters.unregister(waiter);
        if !found {
            return Err(Error::Timeout(timeout));
        }
        let store = self.inner.read_store()?;
        let row = TableSelect::<E>::table(&*store)
            .select(Some(&target), &match_spec)
            .into_iter()
            .next();
        drop(store);
        row.map(|(t, record)| DbObject::from_row(&self.inner, t, record))
            .ok_or_else(|| Error::NotFound(format!("{:?}", match_spec)))
    }

    /// Natural keys of every row visible through the view.
    pub fn keys(&self) -> Result<Vec<(Target, Match)>, Error> {
        Ok(self
            .matching_rows()?
            .into_iter()
            .map(|(target, record)| (target, E::natural_key(&record)))
            .collect())
    }

    pub fn count(&self) -> Result<usize, Error> {
        Ok(self.matching_rows()?.len())
    }

    /// Full-width report, one line per row.
    pub fn dump(&self) -> Result<Report, Error> {
        self.report(E::columns())
    }

    /// Condensed report with the family's summary columns.
    pub fn summary(&self) -> Result<Report, Error> {
        self.report(self.summary_override.unwrap_or_else(E::summary_columns))
    }

    fn report(&self, columns: &[&str]) -> Result<Report, Error> {
        let mut header = vec!["target".to_string()];
        header.extend(columns.iter().map(|c| c.to_string()));
        let mut report = Report::new(header, self.inner.options.max_report_lines);
        for (target, record) in self.matching_rows()? {
            let row = record.to_row();
            let mut cells = vec![json!(target.as_str())];
            cells.extend(columns.iter().map(|c| row.get(*c).cloned().unwrap_or(Value::Null)));
            report.push(cells);
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
