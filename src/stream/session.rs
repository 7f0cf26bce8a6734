//! Server-assigned session state and the table registry it owns.
//!
//! A `Session` is populated from the header block of a create/bind response
//! and survives rebinds. Table ids are allocated here so that they stay
//! monotonic for the whole lifetime of one logical session.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use url::Url;

use crate::stream::proto::{SessionHeader, TableId, CONTROL_ADDRESS_KEY, SESSION_ID_KEY};
use crate::stream::subscription::Subscription;

/// Logical session plus the subscriptions registered on it.
#[derive(Debug, Default)]
pub struct Session {
    params: BTreeMap<String, String>,
    control_url: Option<Url>,
    tables: HashMap<TableId, Arc<Subscription>>,
    last_table_id: TableId,
}

impl Session {
    /// Applies a parsed header block. Keys already present are overwritten,
    /// tables are kept. The control link is resolved from the merged
    /// parameters, so a bind response without `ControlAddress` keeps the one
    /// announced at creation.
    pub fn apply_header(&mut self, header: SessionHeader, base_url: &Url) -> Result<(), String> {
        let mut params = self.params.clone();
        params.extend(header.into_params());
        let control_url = resolve_control_url(
            base_url,
            params
                .get(CONTROL_ADDRESS_KEY)
                .map(String::as_str)
                .filter(|address| !address.is_empty()),
        )?;
        self.params = params;
        self.control_url = Some(control_url);
        Ok(())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.params
            .get(SESSION_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.session_id().is_some()
    }

    /// Address used for control and bind requests.
    pub fn control_url(&self) -> Option<&Url> {
        self.control_url.as_ref()
    }

    pub fn control_address(&self) -> Option<&str> {
        self.param(CONTROL_ADDRESS_KEY)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Allocates the next table id and registers the subscription under it.
    pub fn register(&mut self, subscription: Arc<Subscription>) -> TableId {
        self.last_table_id += 1;
        self.tables.insert(self.last_table_id, subscription);
        self.last_table_id
    }

    pub fn remove(&mut self, table_id: TableId) -> Option<Arc<Subscription>> {
        self.tables.remove(&table_id)
    }

    pub fn table(&self, table_id: TableId) -> Option<Arc<Subscription>> {
        self.tables.get(&table_id).cloned()
    }

    pub fn contains(&self, table_id: TableId) -> bool {
        self.tables.contains_key(&table_id)
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Forgets the session entirely, including every table and the id counter.
    pub fn clear(&mut self) {
        self.params.clear();
        self.control_url = None;
        self.tables.clear();
        self.last_table_id = 0;
    }
}

/// Control link: `<base scheme>://<ControlAddress>/` when the server names a
/// dedicated address, otherwise the base URL itself.
pub fn resolve_control_url(base_url: &Url, control_address: Option<&str>) -> Result<Url, String> {
    match control_address {
        None => Ok(base_url.clone()),
        Some(address) => {
            let candidate = format!("{}://{}/", base_url.scheme(), address.trim());
            Url::parse(&candidate)
                .map_err(|err| format!("invalid control address {address:?}: {err}"))
        }
    }
}
