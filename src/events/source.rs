//! Home, module and event queries against the Netatmo API.
//!
//! Every call fetches fresh data; nothing is cached between calls.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::filter::{snapshot_references, DeviceFilter};
use super::types::{
    Envelope, Event, EventsBody, Home, HomeStatusBody, HomesBody, Module, SnapshotReference,
};
use super::window::TimeWindow;
use crate::auth::AccessTokenSource;
use crate::client::ApiTransport;
use crate::config::join_url;
use crate::error::{Result, SnapshotError};

const HOMES_DATA: &str = "homesdata";
const HOME_STATUS: &str = "homestatus";
const GET_EVENTS: &str = "getevents";

/// How the home to query is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeSelector {
    Id(String),
    /// Looked up through the home listing on every call.
    Name(String),
    /// The first home of the account.
    First,
}

pub struct EventSource {
    transport: Arc<dyn ApiTransport>,
    api_url: Url,
    home: HomeSelector,
    size: Option<u32>,
}

impl EventSource {
    pub fn new(transport: Arc<dyn ApiTransport>, api_url: Url, home: HomeSelector) -> Self {
        Self {
            transport,
            api_url,
            home,
            size: None,
        }
    }

    /// Number of events requested by [`EventSource::get_snapshot_references`].
    pub fn with_size(mut self, size: Option<u32>) -> Self {
        self.size = size;
        self
    }

    pub fn home(&self) -> &HomeSelector {
        &self.home
    }

    /// All homes of the account.
    pub async fn list_homes<A>(&self, auth: &mut A) -> Result<Vec<Home>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let token = auth.access_token().await?;
        let body: Envelope<HomesBody> = self
            .transport
            .post_form(&join_url(&self.api_url, HOMES_DATA), &[("access_token", token)])
            .await?
            .into_json()?;

        if body.body.homes.is_empty() {
            return Err(SnapshotError::NotFound("Home".into()));
        }
        debug!(count = body.body.homes.len(), "Listed homes");
        Ok(body.body.homes)
    }

    /// Resolve the configured selector to a home id.
    pub async fn resolve_home_id<A>(&self, auth: &mut A) -> Result<String>
    where
        A: AccessTokenSource + ?Sized,
    {
        let name = match &self.home {
            HomeSelector::Id(id) => return Ok(id.clone()),
            HomeSelector::Name(name) => Some(name),
            HomeSelector::First => None,
        };

        let homes = self.list_homes(auth).await?;
        let home = match name {
            Some(name) => homes
                .iter()
                .find(|h| &h.name == name)
                .or_else(|| homes.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
                .ok_or_else(|| SnapshotError::NotFound(format!("Home {name:?}")))?,
            None => &homes[0],
        };

        info!(home_id = %home.id, home_name = %home.name, "Selected home");
        Ok(home.id.clone())
    }

    /// Modules of the selected home.
    pub async fn home_status<A>(&self, auth: &mut A) -> Result<Vec<Module>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let home_id = self.resolve_home_id(auth).await?;
        self.modules_of(auth, &home_id).await
    }

    /// Recent events of the selected home, in server order.
    pub async fn list_events<A>(
        &self,
        auth: &mut A,
        device_type: Option<&str>,
        size: Option<u32>,
    ) -> Result<Vec<Event>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let home_id = self.resolve_home_id(auth).await?;
        self.events_of(auth, &home_id, device_type, size).await
    }

    /// Snapshot URLs of events inside `window` that pass `filter`.
    ///
    /// An invalid window fails before any network call.
    pub async fn get_snapshot_references<A>(
        &self,
        auth: &mut A,
        filter: &DeviceFilter,
        window: &TimeWindow,
    ) -> Result<Vec<SnapshotReference>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let resolved = window.resolve(Utc::now())?;
        let home_id = self.resolve_home_id(auth).await?;

        let filter = match &filter.device_type {
            Some(_) => {
                let modules = self.modules_of(auth, &home_id).await?;
                filter.clone().with_modules(&modules)
            }
            None => filter.clone(),
        };

        let events = self
            .events_of(auth, &home_id, filter.device_type.as_deref(), self.size)
            .await?;
        let refs = snapshot_references(&events, &resolved, &filter);

        info!(
            events = events.len(),
            snapshots = refs.len(),
            from = %resolved.from,
            to = ?resolved.to,
            "Selected snapshots"
        );
        Ok(refs)
    }

    async fn modules_of<A>(&self, auth: &mut A, home_id: &str) -> Result<Vec<Module>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let token = auth.access_token().await?;
        let body: Envelope<HomeStatusBody> = self
            .transport
            .post_form(
                &join_url(&self.api_url, HOME_STATUS),
                &[("access_token", token), ("home_id", home_id.to_string())],
            )
            .await?
            .into_json()?;

        debug!(home_id, modules = body.body.home.modules.len(), "Fetched home status");
        Ok(body.body.home.modules)
    }

    async fn events_of<A>(
        &self,
        auth: &mut A,
        home_id: &str,
        device_type: Option<&str>,
        size: Option<u32>,
    ) -> Result<Vec<Event>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let token = auth.access_token().await?;
        let mut form = vec![("access_token", token), ("home_id", home_id.to_string())];
        if let Some(device_type) = device_type {
            form.push(("device_types", device_type.to_string()));
        }
        if let Some(size) = size {
            form.push(("size", size.to_string()));
        }

        let body: Envelope<EventsBody> = self
            .transport
            .post_form(&join_url(&self.api_url, GET_EVENTS), &form)
            .await?
            .into_json()?;

        let (timed, untimed): (Vec<_>, Vec<_>) = body
            .body
            .home
            .events
            .into_iter()
            .partition(|raw| raw.time.is_some());
        if !untimed.is_empty() {
            debug!(home_id, skipped = untimed.len(), "Skipping events without a time");
        }
        if timed.is_empty() {
            return Err(SnapshotError::NotFound(format!("Events for home {home_id}")));
        }

        timed.into_iter().map(Event::try_from).collect()
    }
}
