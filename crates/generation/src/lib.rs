//! Generation orchestration: requests, the job driver, history, and the
//! per-user session state machine.

mod driver;
mod history;
mod request;
mod session;

pub use driver::{JobDriver, JobEvent, POLL_INTERVAL, POLL_MESSAGES};
pub use history::{HistoryItem, HistoryLedger, ImageItem, VideoItem};
pub use request::{
    AspectRatio, GenerationRequest, ImageConfig, ImageModel, ImageOptions, ReferenceImage,
    RenderOptions, RequestSettings, Resolution, VideoConfig, VideoModel,
};
pub use session::{Phase, ProgressState, Session};
