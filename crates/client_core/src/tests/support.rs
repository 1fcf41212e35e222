use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    domain::{LaunchId, Resource, RocketId},
    error::FetchFailure,
    protocol::{Launch, LaunchLinks, Length, Mass, Rocket},
};
use tokio::sync::{broadcast, Semaphore};

use crate::{
    cache::{QueryCache, QueryEvent},
    gateway::LaunchGateway,
    query::{QueryKey, QueryStatus},
};

/// `date` is either a bare `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn launch(id: &str, name: &str, date: &str) -> Launch {
    Launch {
        id: LaunchId::from(id),
        name: name.to_string(),
        date_utc: parse_date(date),
        date_local: None,
        success: Some(true),
        flight_number: None,
        details: None,
        rocket: RocketId::from("r1"),
        launchpad: None,
        failures: Vec::new(),
        fairings: None,
        cores: Vec::new(),
        links: LaunchLinks::default(),
        payloads: Vec::new(),
        ships: Vec::new(),
    }
}

pub fn launch_with_rocket(id: &str, rocket: &str) -> Launch {
    let mut launch = launch(id, id, "2020-01-01");
    launch.rocket = RocketId::from(rocket);
    launch
}

pub fn rocket(id: &str, name: &str) -> Rocket {
    Rocket {
        id: RocketId::from(id),
        name: name.to_string(),
        height: Length {
            meters: Some(70.0),
            feet: Some(229.6),
        },
        mass: Mass {
            kg: Some(549_054.0),
            lb: Some(1_207_920.0),
        },
        description: format!("{name} description"),
    }
}

fn parse_date(date: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.with_timezone(&Utc);
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("test date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_utc()
}

/// In-memory gateway that records every call.
#[derive(Default)]
pub struct ScriptedGateway {
    launches: Vec<Launch>,
    launch_by_id: HashMap<String, Result<Launch, FetchFailure>>,
    rocket_by_id: HashMap<String, Result<Rocket, FetchFailure>>,
    fail_launches: AtomicBool,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    observed_launch: Option<(Arc<QueryCache>, LaunchId)>,
    launch_status_at_rocket_start: Mutex<Vec<QueryStatus>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launches(mut self, launches: Vec<Launch>) -> Self {
        self.launches = launches;
        self
    }

    pub fn with_launch(mut self, launch: Launch) -> Self {
        self.launch_by_id
            .insert(launch.id.as_str().to_string(), Ok(launch));
        self
    }

    pub fn with_launch_status(mut self, id: &str, status: u16) -> Self {
        self.launch_by_id.insert(
            id.to_string(),
            Err(FetchFailure::http_status(Resource::Launches, Some(id), status)),
        );
        self
    }

    pub fn with_rocket(mut self, rocket: Rocket) -> Self {
        self.rocket_by_id
            .insert(rocket.id.as_str().to_string(), Ok(rocket));
        self
    }

    pub fn with_rocket_status(mut self, id: &str, status: u16) -> Self {
        self.rocket_by_id.insert(
            id.to_string(),
            Err(FetchFailure::http_status(Resource::Rockets, Some(id), status)),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call waits for one permit from `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Records the launch query status seen by the cache whenever a rocket fetch starts.
    pub fn observing(mut self, cache: Arc<QueryCache>, launch_id: &str) -> Self {
        self.observed_launch = Some((cache, LaunchId::from(launch_id)));
        self
    }

    pub fn fail_launches(&self, fail: bool) {
        self.fail_launches.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn launch_status_at_rocket_start(&self) -> Vec<QueryStatus> {
        self.launch_status_at_rocket_start
            .lock()
            .expect("status lock")
            .clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn pause(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl LaunchGateway for ScriptedGateway {
    async fn fetch_launches(&self) -> Result<Vec<Launch>, FetchFailure> {
        self.record("launches".to_string());
        self.pause().await;
        if self.fail_launches.load(Ordering::SeqCst) {
            return Err(FetchFailure::http_status(Resource::Launches, None, 503));
        }
        Ok(self.launches.clone())
    }

    async fn fetch_launch(&self, id: &LaunchId) -> Result<Launch, FetchFailure> {
        self.record(format!("launch:{id}"));
        self.pause().await;
        self.launch_by_id.get(id.as_str()).cloned().unwrap_or_else(|| {
            Err(FetchFailure::http_status(
                Resource::Launches,
                Some(id.as_str()),
                404,
            ))
        })
    }

    async fn fetch_rocket(&self, id: &RocketId) -> Result<Rocket, FetchFailure> {
        if let Some((cache, launch_id)) = &self.observed_launch {
            let status = cache.status(&QueryKey::Launch(launch_id.clone()));
            self.launch_status_at_rocket_start
                .lock()
                .expect("status lock")
                .push(status);
        }
        self.record(format!("rocket:{id}"));
        self.pause().await;
        self.rocket_by_id.get(id.as_str()).cloned().unwrap_or_else(|| {
            Err(FetchFailure::http_status(
                Resource::Rockets,
                Some(id.as_str()),
                404,
            ))
        })
    }
}

pub async fn wait_for_event(
    events: &mut broadcast::Receiver<QueryEvent>,
    key: &QueryKey,
    status: QueryStatus,
) {
    loop {
        let event = events.recv().await.expect("event stream open");
        if &event.key == key && event.status == status {
            return;
        }
    }
}

pub fn drain_events(events: &mut broadcast::Receiver<QueryEvent>) -> Vec<QueryEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
