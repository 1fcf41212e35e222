use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{LaunchId, RocketId},
    error::FetchFailure,
    protocol::{Launch, Rocket},
};
use tokio::time::Instant;

use crate::gateway::LaunchGateway;

/// Identity of a cached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Launches,
    Launch(LaunchId),
    Rocket(RocketId),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Launches => f.write_str("launches"),
            QueryKey::Launch(id) => write!(f, "launch:{id}"),
            QueryKey::Rocket(id) => write!(f, "rocket:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Payload stored in the cache, one variant per query family.
#[derive(Debug, Clone)]
pub enum QueryData {
    Launches(Arc<Vec<Launch>>),
    Launch(Arc<Launch>),
    Rocket(Arc<Rocket>),
}

#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// Last successful payload. Kept while a refetch is loading or after a refetch fails.
    pub data: Option<T>,
    pub error: Option<FetchFailure>,
    pub updated_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub(crate) fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        self.is_success()
            && self
                .updated_at
                .is_some_and(|updated_at| now.duration_since(updated_at) < stale_time)
    }
}

impl QueryState<QueryData> {
    pub(crate) fn typed<Q: QueryDescriptor>(&self) -> QueryState<Q::Output> {
        QueryState {
            status: self.status,
            data: self.data.as_ref().and_then(Q::extract),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// A request the orchestrator can cache: its key, how to run it, and how to read its payload
/// back out of the cache.
#[async_trait]
pub trait QueryDescriptor: Clone + Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn key(&self) -> QueryKey;

    async fn run(&self, gateway: &dyn LaunchGateway) -> Result<QueryData, FetchFailure>;

    fn extract(data: &QueryData) -> Option<Self::Output>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchesQuery;

#[async_trait]
impl QueryDescriptor for LaunchesQuery {
    type Output = Arc<Vec<Launch>>;

    fn key(&self) -> QueryKey {
        QueryKey::Launches
    }

    async fn run(&self, gateway: &dyn LaunchGateway) -> Result<QueryData, FetchFailure> {
        let launches = gateway.fetch_launches().await?;
        Ok(QueryData::Launches(Arc::new(launches)))
    }

    fn extract(data: &QueryData) -> Option<Self::Output> {
        match data {
            QueryData::Launches(launches) => Some(Arc::clone(launches)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchQuery {
    pub id: LaunchId,
}

impl LaunchQuery {
    pub fn new(id: impl Into<LaunchId>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl QueryDescriptor for LaunchQuery {
    type Output = Arc<Launch>;

    fn key(&self) -> QueryKey {
        QueryKey::Launch(self.id.clone())
    }

    async fn run(&self, gateway: &dyn LaunchGateway) -> Result<QueryData, FetchFailure> {
        let launch = gateway.fetch_launch(&self.id).await?;
        Ok(QueryData::Launch(Arc::new(launch)))
    }

    fn extract(data: &QueryData) -> Option<Self::Output> {
        match data {
            QueryData::Launch(launch) => Some(Arc::clone(launch)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RocketQuery {
    pub id: RocketId,
}

impl RocketQuery {
    pub fn new(id: impl Into<RocketId>) -> Self {
        Self { id: id.into() }
    }

    /// The rocket query a launch points at, if it names a rocket.
    pub fn for_launch(launch: &Launch) -> Option<Self> {
        launch.has_rocket().then(|| Self::new(launch.rocket.clone()))
    }
}

#[async_trait]
impl QueryDescriptor for RocketQuery {
    type Output = Arc<Rocket>;

    fn key(&self) -> QueryKey {
        QueryKey::Rocket(self.id.clone())
    }

    async fn run(&self, gateway: &dyn LaunchGateway) -> Result<QueryData, FetchFailure> {
        let rocket = gateway.fetch_rocket(&self.id).await?;
        Ok(QueryData::Rocket(Arc::new(rocket)))
    }

    fn extract(data: &QueryData) -> Option<Self::Output> {
        match data {
            QueryData::Rocket(rocket) => Some(Arc::clone(rocket)),
            _ => None,
        }
    }
}

/// Dependency edge between two queries. The child descriptor only exists once the parent has
/// succeeded and `enable` derives it from the parent's payload.
pub struct DependentQuery<P: QueryDescriptor, C: QueryDescriptor> {
    pub parent: P,
    enable: fn(&P::Output) -> Option<C>,
}

impl<P: QueryDescriptor, C: QueryDescriptor> DependentQuery<P, C> {
    pub fn new(parent: P, enable: fn(&P::Output) -> Option<C>) -> Self {
        Self { parent, enable }
    }

    pub fn child_for(&self, parent: &QueryState<P::Output>) -> Option<C> {
        if !parent.is_success() {
            return None;
        }
        parent.data.as_ref().and_then(self.enable)
    }
}

pub type LaunchDetailQuery = DependentQuery<LaunchQuery, RocketQuery>;

impl LaunchDetailQuery {
    pub fn launch_detail(id: impl Into<LaunchId>) -> Self {
        Self::new(LaunchQuery::new(id), |launch| RocketQuery::for_launch(launch))
    }
}

#[derive(Debug, Clone)]
pub struct DependentState<P, C> {
    pub parent: QueryState<P>,
    pub child: QueryState<C>,
    /// False while the guard holds the child back.
    pub child_enabled: bool,
}

impl<P, C> DependentState<P, C> {
    pub fn status(&self) -> QueryStatus {
        match self.parent.status {
            QueryStatus::Success if !self.child_enabled => QueryStatus::Success,
            QueryStatus::Success => self.child.status,
            other => other,
        }
    }

    /// Both halves resolved successfully, or the parent succeeded with nothing to follow.
    pub fn is_ready(&self) -> bool {
        self.status() == QueryStatus::Success
    }
}
