use std::path::Path;

use {
    anyhow::{Context, Result, bail},
    serde_json::json,
    tracing::info,
};

use {
    tunepress_config::TunepressConfig,
    tunepress_gateway::{build_service, job_store, open_database},
    tunepress_queue::Job,
};

/// Run one request through the pipeline and print the outcome as JSON.
pub async fn download(
    config: &TunepressConfig,
    query: Option<String>,
    url: Option<String>,
    destination: Option<&str>,
) -> Result<()> {
    let service = build_service(config).await?;
    let outcome = service.submit(query, url, destination).await?;
    info!(path = %outcome.container_path.display(), "container written");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Add a song to the backlog without starting the worker.
pub async fn enqueue(config: &TunepressConfig, song_name: &str) -> Result<()> {
    if song_name.trim().is_empty() {
        bail!("song name must not be empty");
    }
    let pool = open_database(config).await?;
    let job = Job::new(song_name.trim());
    job_store(config, pool).insert(&job).await?;
    println!("{}", job.id);
    Ok(())
}

/// Sweep the backlog once and print the per-job results.
pub async fn sweep(config: &TunepressConfig, destination: Option<&str>) -> Result<()> {
    let service = build_service(config).await?;
    let report = service.sweep(destination).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "results": report.results,
            "stuck": report.stuck,
        }))?
    );
    Ok(())
}

/// Print the metadata and section sizes of a container file.
pub fn inspect(path: &Path) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let unpacked = tunepress_container::unpack(&data)
        .with_context(|| format!("{} is not a valid container", path.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "metadata": unpacked.metadata,
            "imageBytes": unpacked.image.as_ref().map_or(0, Vec::len),
            "audioBytes": unpacked.audio.len(),
            "totalBytes": data.len(),
        }))?
    );
    Ok(())
}
