use anyhow::Result;

/// The daemon keeps every counter mutation on one thread, so it only ever needs a
/// current-thread runtime.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
