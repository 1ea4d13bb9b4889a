use anyhow::Result;

/// Commands run on a single thread, day files are never touched concurrently.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
