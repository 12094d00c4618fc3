mod client;

pub use client::{filter_repos, ApiError, ApiResult, RepoSummary, ReposClient};
