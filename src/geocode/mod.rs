//! Address-to-coordinate resolution.

pub mod kakao;
pub mod limiter;
pub mod map_url;
pub mod orchestrator;
pub mod provider;

pub use kakao::KakaoProvider;
pub use limiter::RateLimiter;
pub use map_url::{coordinates_from_url, MapUrlResolver, URL_BATCH_SIZE};
pub use orchestrator::{GeocodeOrchestrator, GeocodeOutcome};
pub use provider::{GeocodeProvider, GeocodeResult, ProviderError};
