//! Thin HTTP clients against a running `zephyr-api` server.

use serde_json::json;

fn client(api_key: &Option<String>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(key) = api_key {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", reqwest::header::HeaderValue::from_str(key)?);
        builder = builder.default_headers(headers);
    }
    Ok(builder.build()?)
}

pub async fn trigger(
    api_url: &str,
    api_key: Option<String>,
    project_id: &str,
    pipeline_name: &str,
    branch: Option<String>,
) -> anyhow::Result<()> {
    let response = client(&api_key)?
        .post(format!("{api_url}/api/v1/trigger"))
        .json(&json!({
            "project_id": project_id,
            "pipeline_name": pipeline_name,
            "branch": branch,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("trigger failed: {}", response.text().await.unwrap_or_default());
    }
    println!("{}", response.text().await?);
    Ok(())
}

pub async fn list_runs(api_url: &str, api_key: Option<String>, project_id: Option<String>) -> anyhow::Result<()> {
    let mut request = client(&api_key)?.get(format!("{api_url}/api/v1/runs"));
    if let Some(project_id) = project_id {
        request = request.query(&[("project_id", project_id)]);
    }
    let response = request.send().await?;
    println!("{}", response.text().await?);
    Ok(())
}

pub async fn job_logs(api_url: &str, api_key: Option<String>, job_id: &str) -> anyhow::Result<()> {
    let response = client(&api_key)?
        .get(format!("{api_url}/api/v1/jobs/{job_id}/logs"))
        .send()
        .await?;
    println!("{}", response.text().await?);
    Ok(())
}
