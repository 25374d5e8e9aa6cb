//! Shell Session
//!
//! Main entry point for the embedded shell.
//! Ties together the parser, the context pool, jobs and the filesystem.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::fs::{FileSystem, InMemoryFs, MkdirOptions};
use crate::interpreter::command_resolution::{split_path, DEFAULT_PATH};
use crate::interpreter::context_pool::{lock_pool, ContextPool, PoolStats};
use crate::interpreter::errors::ShellError;
use crate::interpreter::pipeline_execution::{
    execute_pipeline, resume_pipeline, PipelineResult, SuspendedPipeline,
};
use crate::interpreter::types::{ExecEnv, ExecResult, JobId, SessionState};
use crate::parser::parse;
use crate::vm::context::{ContextId, PauseSignal};
use crate::vm::line_vm::{assemble, LineVmFactory};
use crate::vm::types::SharedEngineFactory;

/// Pool size used when none is configured
pub const DEFAULT_POOL_CAPACITY: usize = 4;

const DEFAULT_HOME: &str = "/home/user";

/// Programs installed into `/bin` of the default in-memory volume.
const STOCK_PROGRAMS: &[(&str, &str)] = &[
    ("/bin/cat", "cat"),
    ("/bin/head", "head $2"),
    ("/bin/args", "args"),
];

/// Options for creating a shell.
#[derive(Default)]
pub struct ShellOptions {
    /// Working directory (defaults to the home directory)
    pub cwd: Option<String>,
    /// Target of a bare `cd`
    pub home: Option<String>,
    /// Ordered executable search path
    pub search_path: Option<Vec<String>>,
    /// Pooled contexts to pre-spawn; 0 disables the pool
    pub pool_capacity: Option<usize>,
    /// File system instance (defaults to InMemoryFs with stock programs)
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Engine factory (defaults to the line VM)
    pub engines: Option<SharedEngineFactory>,
    /// Extra programs to install: path -> line VM source
    pub programs: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk shell configuration.
///
/// ```toml
/// pool_capacity = 2
/// search_path = ["/bin", "/opt/bin"]
///
/// [programs]
/// "/opt/bin/hello" = "puts hello $1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub cwd: Option<String>,
    pub home: Option<String>,
    pub search_path: Option<Vec<String>>,
    pub pool_capacity: Option<usize>,
    pub programs: HashMap<String, String>,
}

impl ShellConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn into_options(self) -> ShellOptions {
        ShellOptions {
            cwd: self.cwd,
            home: self.home,
            search_path: self.search_path,
            pool_capacity: self.pool_capacity,
            programs: self.programs,
            ..Default::default()
        }
    }
}

/// Entry in the suspended-job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub command: String,
    pub context: Option<ContextId>,
}

/// An interactive shell session.
pub struct Shell {
    env: ExecEnv,
    session: SessionState,
    pause: PauseSignal,
    jobs: BTreeMap<JobId, SuspendedPipeline>,
    next_job: u32,
}

impl Shell {
    /// Create a new shell session.
    pub async fn new(options: ShellOptions) -> Result<Self, ShellError> {
        let use_default_layout = options.fs.is_none();
        let home = options.home.unwrap_or_else(|| DEFAULT_HOME.to_string());
        let cwd = options.cwd.unwrap_or_else(|| home.clone());
        let fs: Arc<dyn FileSystem> = options.fs.unwrap_or_else(|| Arc::new(InMemoryFs::new()));
        let engines: SharedEngineFactory = options.engines.unwrap_or_else(|| Arc::new(LineVmFactory));
        let search_path = options.search_path.unwrap_or_else(|| split_path(DEFAULT_PATH));
        let capacity = options.pool_capacity.unwrap_or(DEFAULT_POOL_CAPACITY);

        init_filesystem(fs.as_ref(), &[home.as_str(), cwd.as_str()], use_default_layout).await?;
        for (path, source) in &options.programs {
            fs.write_file(path, &assemble(source)?).await?;
        }

        let pool = if capacity > 0 {
            Some(ContextPool::new(capacity, engines.clone())?.shared())
        } else {
            None
        };
        info!(capacity, cwd = %cwd, "shell session started");

        Ok(Self {
            env: ExecEnv { fs, search_path, pool, engines },
            session: SessionState { cwd, home },
            pause: PauseSignal::new(),
            jobs: BTreeMap::new(),
            next_job: 1,
        })
    }

    /// Parse and run one command line. Never fails: errors become stderr
    /// text and `success = false`.
    pub async fn exec(&mut self, line: &str) -> ExecResult {
        let ast = match parse(line) {
            Ok(Some(ast)) => ast,
            Ok(None) => return ExecResult::ok(),
            Err(err) => return ExecResult::failure(format!("embsh: {}\n", err)),
        };

        let PipelineResult { mut result, suspended } =
            execute_pipeline(&self.env, &mut self.session, &self.pause, &ast).await;

        if let Some(parked) = suspended {
            let id = self.park(parked);
            result.suspended_job = Some(id);
        }
        self.cleanup();
        result
    }

    /// Continue a suspended job until it completes or suspends again. When
    /// it completes, the pipeline stages after it run over its output.
    pub async fn resume(&mut self, id: JobId) -> Result<ExecResult, ShellError> {
        let parked = self.jobs.remove(&id).ok_or(ShellError::NoSuchJob(id))?;
        debug!(job = %id, command = %parked.command(), "resuming");

        let PipelineResult { mut result, suspended } =
            resume_pipeline(&self.env, &mut self.session, &self.pause, parked).await?;
        if let Some(parked) = suspended {
            self.jobs.insert(id, parked);
            result.suspended_job = Some(id);
        }
        self.cleanup();
        Ok(result)
    }

    /// Drop a suspended job and the stages waiting on it. Its context goes
    /// back to the pool.
    pub fn kill(&mut self, id: JobId) -> Result<(), ShellError> {
        let parked = self.jobs.remove(&id).ok_or(ShellError::NoSuchJob(id))?;
        info!(job = %id, command = %parked.command(), "job killed");
        drop(parked);
        self.cleanup();
        Ok(())
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .iter()
            .map(|(id, parked)| JobInfo {
                id: *id,
                command: parked.command(),
                context: parked.job().context_id(),
            })
            .collect()
    }

    /// Most recently suspended job.
    pub fn last_job(&self) -> Option<JobId> {
        self.jobs.keys().next_back().copied()
    }

    /// Raising this parks the running job at its next checkpoint. A pause
    /// raised while no job runs is dropped when the next one starts.
    pub fn pause_signal(&self) -> PauseSignal {
        self.pause.clone()
    }

    pub fn cwd(&self) -> &str {
        &self.session.cwd
    }

    /// `None` when the session runs without a pool.
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.env.pool.as_ref().map(|pool| lock_pool(pool).stats())
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.env.fs
    }

    fn park(&mut self, parked: SuspendedPipeline) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        info!(job = %id, command = %parked.command(), "job suspended");
        self.jobs.insert(id, parked);
        id
    }

    fn cleanup(&self) {
        if let Some(pool) = &self.env.pool {
            lock_pool(pool).cleanup();
        }
    }
}

/// Initialize the filesystem with standard directories and stock programs.
async fn init_filesystem(
    fs: &dyn FileSystem,
    dirs: &[&str],
    use_default_layout: bool,
) -> Result<(), ShellError> {
    let recursive = MkdirOptions { recursive: true };
    fs.mkdir("/bin", &recursive).await?;
    fs.mkdir("/usr/bin", &recursive).await?;
    for dir in dirs {
        fs.mkdir(dir, &recursive).await?;
    }

    if use_default_layout {
        fs.mkdir("/tmp", &recursive).await?;
        for (path, source) in STOCK_PROGRAMS {
            fs.write_file(path, &assemble(source)?).await?;
        }
    }
    Ok(())
}
