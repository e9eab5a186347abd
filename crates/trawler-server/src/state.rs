use trawler_core::manager::JobManager;
use trawler_core::traits::{DataStore, Fetcher, JobStore};
use trawler_db::Database;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState<..>>>`.
///
/// Generic over the fetcher and stores so integration tests can run the
/// router against in-memory stores and a mock fetcher.
pub struct AppState<F, J, D>
where
    F: Fetcher,
    J: JobStore,
    D: DataStore,
{
    pub manager: JobManager<F, J, D>,
    /// Present when backed by PostgreSQL; used by the health endpoint.
    pub db: Option<Database>,
}
