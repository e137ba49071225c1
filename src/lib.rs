pub mod cache;
pub mod config;
pub mod errors;
pub mod guard;
pub mod metrics;
pub mod proxy;
pub mod settings;
pub mod storage;

pub use cache::*;
pub use config::*;
pub use errors::*;
pub use guard::*;
pub use metrics::*;
pub use proxy::*;
pub use settings::*;
pub use storage::*;
