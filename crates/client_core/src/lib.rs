//! Data orchestration for the launch explorer: a gateway to the launch API, a query cache with
//! dependent-query sequencing, and the filter/sort/paginate view pipeline.

pub mod cache;
pub mod gateway;
pub mod orchestrator;
pub mod query;
pub mod session;
pub mod view;

pub use cache::{QueryCache, QueryEvent, QueryOptions};
pub use gateway::{GatewayOptions, HttpGateway, LaunchGateway, DEFAULT_API_BASE_URL};
pub use orchestrator::{QueryClient, QuerySubscription};
pub use query::{
    DependentQuery, DependentState, LaunchDetailQuery, LaunchQuery, LaunchesQuery, QueryData,
    QueryDescriptor, QueryKey, QueryState, QueryStatus, RocketQuery,
};
pub use session::{
    AnonymousAuthenticator, AuthError, Authenticator, Credentials, SessionStore, SessionToken,
    StaticCredentialAuthenticator,
};
pub use view::{derive_view, page_count, SortDirection, SortField, ViewSlice, ViewState};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
