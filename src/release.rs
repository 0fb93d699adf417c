use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Token;
use crate::error::{Result, WorkHistError};

#[derive(Deserialize)]
struct CreatedRelease {
    upload_url: String,
}

/// Uploads the contents of a results directory as assets of a new GitHub
/// release.
///
/// Thin, downstream consumer of the saved CSV artifacts: one release per
/// invocation, one asset per file, no retry layer of its own.
pub struct ReleaseUploader {
    client: reqwest::Client,
    token: Token,
    base_url: String,
}

impl ReleaseUploader {
    pub fn new(base_url: &str, token: Token) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("workhist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkHistError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Create release `tag` on `project_path` ("owner/repo") and upload every
    /// regular file in `results_dir` as an asset. Returns the asset count.
    pub async fn upload_results(
        &self,
        project_path: &str,
        tag: &str,
        results_dir: &Path,
    ) -> Result<usize> {
        let upload_url = self.create_release(project_path, tag).await?;

        let mut uploaded = 0;
        let mut entries: Vec<_> = std::fs::read_dir(results_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let contents = std::fs::read(&path)?;
            self.upload_asset(&upload_url, name, contents).await?;
            info!("uploaded {name} to release {tag}");
            uploaded += 1;
        }
        Ok(uploaded)
    }

    async fn create_release(&self, project_path: &str, tag: &str) -> Result<String> {
        let url = format!("{}/repos/{project_path}/releases", self.base_url);
        let body = json!({
            "tag_name": tag,
            "name": format!("Workflow data {tag}"),
            "body": format!("Workflow and commit history archived by workhist {tag}"),
        });

        let response = self
            .client
            .post(&url)
            .basic_auth("user", Some(self.token.as_str()))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WorkHistError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let release: CreatedRelease = response.json().await?;
        // the upload URL arrives as an RFC 6570 template; drop the
        // {?name,label} suffix before appending real query parameters
        let upload_url = release
            .upload_url
            .split('{')
            .next()
            .unwrap_or(&release.upload_url)
            .to_owned();
        debug!("created release {tag}, uploading assets to {upload_url}");
        Ok(upload_url)
    }

    async fn upload_asset(&self, upload_url: &str, name: &str, contents: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(upload_url)
            .query(&[("name", name)])
            .basic_auth("user", Some(self.token.as_str()))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(contents)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WorkHistError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_upload_results_creates_release_and_assets() {
        let mut server = mockito::Server::new_async().await;
        let upload_url = format!("{}/uploads/assets{{?name,label}}", server.url());

        let release = server
            .mock("POST", "/repos/octo-org/octo-repo/releases")
            .match_body(Matcher::PartialJsonString(
                r#"{"tag_name": "v1.2.3"}"#.to_owned(),
            ))
            .with_status(201)
            .with_body(format!(r#"{{"upload_url": "{upload_url}", "id": 7}}"#))
            .create_async()
            .await;
        let asset = server
            .mock("POST", "/uploads/assets")
            .match_query(Matcher::UrlEncoded(
                "name".to_owned(),
                "All-Workflows.csv".to_owned(),
            ))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("All-Workflows.csv"), "id\n1\n").unwrap();

        let uploader = ReleaseUploader::new(&server.url(), Token::from("t")).unwrap();
        let uploaded = uploader
            .upload_results("octo-org/octo-repo", "v1.2.3", dir.path())
            .await
            .unwrap();

        assert_eq!(uploaded, 1);
        release.assert_async().await;
        asset.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_results_surfaces_api_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/octo-org/octo-repo/releases")
            .with_status(422)
            .with_body(r#"{"message": "tag already exists"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let uploader = ReleaseUploader::new(&server.url(), Token::from("t")).unwrap();
        let result = uploader
            .upload_results("octo-org/octo-repo", "v1.0.0", dir.path())
            .await;

        assert!(matches!(
            result,
            Err(WorkHistError::Api { status: 422, .. })
        ));
    }
}
