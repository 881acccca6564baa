pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod promotions;
pub mod recommend;
pub mod scheduler;
pub mod store;

pub use domain::activity::{PurchaseEvent, PurchaseEventId, ViewEvent, ViewEventId};
pub use domain::product::{Product, ProductId};
pub use domain::promotion::{Promotion, PromotionId};
pub use domain::user::{User, UserId};
pub use errors::{EngineError, InterfaceError};
pub use ingest::{ActivityIngestor, NewProduct, NewPurchase, NewView, ViewReceipt};
pub use promotions::{PromotionGenerator, PromotionPolicy, SweepFailure, SweepReport};
pub use recommend::{
    AffinityProfile, BrowseResult, RecommendationEngine, RecommendationResult,
    RecommendationSettings,
};
pub use scheduler::{RegenerationScheduler, TriggerOutcome};
pub use store::{BehaviorStore, BoundedStore, ProductCount, StoreError};
