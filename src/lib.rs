pub mod backoff;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod scheduler;
pub mod view;

pub use backoff::BackoffRepeater;
pub use cache::{Cell, FetchRequest, ResultApplication, Viewport, VirtualRowCache};
pub use client::{ClientError, ClientErrorKind, HttpJobClient, JobClient, SharedClient};
pub use config::LiveConfig;
pub use error::{LiveError, LiveErrorKind};
pub use lifecycle::{JobLifecycle, JobOutcome};
pub use model::{Field, FieldType, Job, JobHandle, JobState, JobStatus, ResultPage, Row};
pub use scheduler::{RefreshEvent, RefreshScheduler};
pub use view::{FetchCompletion, LiveView, ViewEvent};
