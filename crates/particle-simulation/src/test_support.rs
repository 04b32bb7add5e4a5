use crate::GpuContext;

/// Set to make GPU-backed tests fail instead of skipping when no adapter exists.
const REQUIRE_GPU: &str = "REQUIRE_GPU";

/// Headless device for GPU-backed tests, or `None` when the machine has no adapter.
pub(crate) fn gpu_context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();

    match pollster::block_on(GpuContext::headless()) {
        Ok(context) => Some(context),
        Err(err) if gpu_required() => panic!("{REQUIRE_GPU} is set but no GPU is usable: {err}"),
        Err(err) => {
            log::warn!("skipping GPU test: {err}");
            None
        }
    }
}

fn gpu_required() -> bool {
    std::env::var_os(REQUIRE_GPU).is_some_and(|value| !value.is_empty() && value != "0")
}
