pub mod activity;
pub mod error;
pub mod server;
pub mod state;

pub use activity::{ActivityEvent, ActivityLog};
pub use error::{rate_limit_headers, ApiError};
pub use server::{router, WriterlyServer};
pub use state::AppState;
