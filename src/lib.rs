//! docmerge concatenates the body content of several Word documents into a
//! single document, in a user-chosen order.
//!
//! The pieces, leaves first: [`codec`] opens and saves documents,
//! [`order`] turns the user's order text into positions, [`merge`] splices
//! document bodies together while reporting through [`progress`], and
//! [`session`] owns the inputs and runs one merge at a time on a worker.

pub mod codec;
pub mod config;
pub mod merge;
pub mod observability;
pub mod order;
pub mod progress;
pub mod session;
pub mod working_set;

#[cfg(test)]
mod test_utils;

pub use codec::{ContentBlock, ContentTree, DocumentCodec, DocxCodec};
pub use merge::{CancelToken, MergeEngine, MergeError, MergeSummary};
pub use order::{OrderError, resolve};
pub use progress::{MergeEvent, ProgressSink};
pub use session::{JobError, MergeJob, MergeSession, SessionError};
pub use working_set::{DocumentRef, WorkingSet};
