//! Process-wide Tokio runtime for callers that arrive on foreign threads.

use std::sync::OnceLock;

use log::debug;
use tokio::runtime::Runtime;

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

pub fn init_global_runtime_blocking() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(|| {
        let threads = std::cmp::max(num_cpus::get(), 2);
        debug!("Initializing global runtime with {} threads", threads);
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("pulse-rt")
            .enable_all()
            .build()
            .expect("failed to build tokio runtime")
    })
}
