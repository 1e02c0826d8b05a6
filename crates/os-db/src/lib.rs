pub mod pr_watch_repo;
pub mod review_pr_task_repo;
pub mod review_watch_repo;
pub mod schema;
pub mod store;
pub mod task_pr_repo;
pub mod util;

pub use store::DbStore;
