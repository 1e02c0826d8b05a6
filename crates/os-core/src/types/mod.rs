pub mod enums;
pub mod event;
pub mod github;
pub mod ids;
pub mod io;
pub mod watch;

pub use enums::*;
pub use event::EventBody;
pub use github::{CheckRun, ClientStatus, Comment, PrFeedback, PullRequest, Review};
pub use ids::{IdError, PrWatchId, ReviewPrTaskId, ReviewWatchId, TaskPrId};
pub use io::{
    CreatePrWatchInput, CreateReviewWatchInput, RecordReviewPrTaskInput, UpdateReviewWatchInput,
    UpsertTaskPrInput,
};
pub use watch::{PrWatch, RepoFilter, ReviewPrTask, ReviewWatch, TaskPr};
