pub mod app;
pub mod azure;
pub mod config;
pub mod dataset;
pub mod efetch;
pub mod error;
pub mod fetcher;
pub mod fs_util;
pub mod http;
pub mod merge;
pub mod ncbi;
pub mod normalize;
pub mod output;
pub mod record;
pub mod retry;
pub mod storage;
