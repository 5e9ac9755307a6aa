pub mod bingo;
pub mod browse;
pub mod catalog;
pub mod chat;
pub mod enrichment;
pub mod geo;
pub mod history;
pub mod llm;
pub mod recommendations;
pub mod recommender;
pub mod retry;

pub use bingo::BingoService;
pub use browse::BrowseService;
pub use chat::ChatService;
pub use enrichment::Enricher;
pub use geo::{IpApiLocator, RegionLocator, RegionService};
pub use history::{RecommendationStore, SearchHistory};
pub use llm::{ChatClient, OpenAiClient};
pub use recommendations::RecommendationService;
pub use recommender::RecommendationGenerator;
pub use retry::RetryPolicy;
