//! Download session bookkeeping

pub mod registry;

pub use registry::{DownloadSession, ProgressReceiver, ProgressSender, SessionRegistry};
