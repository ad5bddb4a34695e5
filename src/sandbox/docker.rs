//! Docker implementation of the sandbox engine
//!
//! Maps the narrow engine interface onto the Docker HTTP API via bollard.
//! Environments are long-lived containers started with a keep-alive command
//! so they idle until the grading run explicitly kills them.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, KillContainerOptions,
    LogOutput, StartContainerOptions, TopOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sandbox::engine::{ExecOutcome, ProcessInfo, SandboxEngine, SandboxHandle};

/// Docker-backed sandbox engine
pub struct DockerEngine {
    /// Docker client
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the local Docker daemon and verify it responds
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Provisioning(format!("Failed to connect to Docker: {}", e)))?;

        docker
            .ping()
            .await
            .map_err(|e| Error::Provisioning(format!("Docker ping failed: {}", e)))?;

        info!("Sandbox engine connected to Docker");

        Ok(DockerEngine { docker })
    }

    /// Ensure the required Docker image is available, pulling it if missing
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!("Pulling Docker image: {}", image);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(Error::Provisioning(format!("Failed to pull image: {}", e)));
                }
            }
        }

        info!("Image pulled successfully");
        Ok(())
    }

    /// Run a shell command through the exec API and collect its outcome
    async fn exec_shell(
        &self,
        handle: &SandboxHandle,
        command: &str,
        work_dir: Option<&str>,
    ) -> Result<ExecOutcome> {
        let options = CreateExecOptions {
            cmd: Some(vec![
                "/bin/bash".to_string(),
                "-c".to_string(),
                command.to_string(),
            ]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: work_dir.map(|d| d.to_string()),
            ..Default::default()
        };

        let exec = self.docker.create_exec(&handle.id, options).await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(result) = output.next().await {
                match result {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Err(e) => {
                        warn!("Error reading exec output: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutcome {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl SandboxEngine for DockerEngine {
    async fn create_environment(
        &self,
        image: &str,
        keep_alive_cmd: &[String],
    ) -> Result<SandboxHandle> {
        self.ensure_image(image).await?;

        let container_name = format!("gradebox-{}", uuid::Uuid::new_v4());

        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(keep_alive_cmd.to_vec()),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| Error::Provisioning(format!("Failed to create container: {}", e)))?;

        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Provisioning(format!("Failed to start container: {}", e)))?;

        debug!("Created container {} ({})", container_name, container.id);

        Ok(SandboxHandle { id: container.id })
    }

    async fn make_directory(&self, handle: &SandboxHandle, path: &str) -> Result<()> {
        let outcome = self
            .exec_shell(handle, &format!("mkdir -p {}", path), None)
            .await?;
        if outcome.exit_code != 0 {
            return Err(Error::Container(format!(
                "mkdir {} failed with exit code {}",
                path, outcome.exit_code
            )));
        }
        Ok(())
    }

    async fn load_archive(
        &self,
        handle: &SandboxHandle,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<()> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };

        self.docker
            .upload_to_container(&handle.id, Some(options), archive.into())
            .await?;

        Ok(())
    }

    async fn execute_command(
        &self,
        handle: &SandboxHandle,
        command: &str,
        work_dir: &str,
    ) -> Result<ExecOutcome> {
        self.exec_shell(handle, command, Some(work_dir)).await
    }

    async fn list_processes(&self, handle: &SandboxHandle) -> Result<Vec<ProcessInfo>> {
        let top = self
            .docker
            .top_processes(&handle.id, Some(TopOptions { ps_args: "aux" }))
            .await?;

        let titles = top.titles.unwrap_or_default();
        let cmd_col = titles
            .iter()
            .position(|t| t == "COMMAND" || t == "CMD")
            .unwrap_or(titles.len().saturating_sub(1));
        let pid_col = titles.iter().position(|t| t == "PID").unwrap_or(0);

        let processes = top
            .processes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                let pid = row.get(pid_col)?.clone();
                // ps splits the command line across trailing columns
                let command = row.get(cmd_col..)?.join(" ");
                Some(ProcessInfo { pid, command })
            })
            .collect();

        Ok(processes)
    }

    async fn fetch_archive(&self, handle: &SandboxHandle, path: &str) -> Result<Vec<u8>> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut stream = self.docker.download_from_container(&handle.id, Some(options));

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::OutputMissing(format!("{}: {}", path, e)))?;
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<()> {
        match self
            .docker
            .kill_container(&handle.id, None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => {
                debug!("Killed container {}", handle.id);
                Ok(())
            }
            // Already dead or already gone both count as killed
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404 | 409,
                ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
