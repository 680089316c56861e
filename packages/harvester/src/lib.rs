pub mod browser;
pub mod config;
pub mod enrich;
pub mod export;
pub mod extract;
pub mod input;
pub mod pacing;
pub mod paginate;
pub mod pipeline;
pub mod proxy;
pub mod search;
pub mod selectors;
pub mod session;
pub mod storage;
pub mod types;

// Re-exports for clean API
pub use browser::BrowserSession;
pub use config::Config;
pub use enrich::Enricher;
pub use extract::{CardInfo, Extractor};
pub use input::{read_input, InputRow};
pub use pacing::{DelayRange, Delays, Pacer};
pub use paginate::{JobCap, Paginator, PaginatorConfig};
pub use pipeline::Pipeline;
pub use proxy::{ProxyCredentials, ProxyEndpoint, ProxyRotator};
pub use search::SearchNavigator;
pub use session::{Authenticator, LoginState};
pub use storage::{PostgresStorage, Storage};
pub use types::{Enrichment, JobDetails, SearchCriteria, SearchId, NOT_APPLICABLE};
