use std::io::{BufRead, IsTerminal, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use embsh::{ExecResult, JobId, PauseSignal, Shell, ShellConfig, ShellOptions};

#[derive(Parser)]
#[command(name = "embsh")]
#[command(about = "An embedded shell running programs in pooled script contexts")]
#[command(version)]
struct Cli {
    /// Execute a single command line
    #[arg(short = 'c')]
    command: Option<String>,

    /// TOML configuration file
    #[arg(long = "config")]
    config: Option<String>,

    /// Number of pooled execution contexts (0 disables the pool)
    #[arg(long = "capacity")]
    capacity: Option<usize>,

    /// Search path directory (repeatable, in lookup order)
    #[arg(long = "path")]
    path: Vec<String>,

    /// Initial working directory
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, success)
    #[arg(long = "json")]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EMBSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(result: &ExecResult, json: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("embsh: cannot encode result: {}", e),
        }
        return;
    }
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
    if let Some(id) = result.suspended_job {
        eprintln!("[{}]+  Stopped", id.0);
    }
    let _ = std::io::stdout().flush();
}

/// Ctrl-C pauses the running job at its next checkpoint instead of
/// killing the shell.
fn forward_interrupts(pause: PauseSignal) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt: pausing running job");
            pause.raise();
        }
    });
}

fn parse_job_spec(spec: &str) -> Option<JobId> {
    spec.strip_prefix('%').unwrap_or(spec).parse().ok().map(JobId)
}

async fn foreground(shell: &mut Shell, id: JobId) -> ExecResult {
    match shell.resume(id).await {
        Ok(result) => result,
        Err(e) => ExecResult::failure(format!("fg: {}\n", e)),
    }
}

/// Job control handled by the prompt: `jobs`, `fg [%N]` and `kill %N...`.
/// Anything else goes to the shell.
async fn job_control(shell: &mut Shell, line: &str) -> Option<ExecResult> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let result = match words.as_slice() {
        ["jobs"] => {
            let listing: String = shell
                .jobs()
                .iter()
                .map(|job| format!("[{}]  Stopped  {}\n", job.id.0, job.command))
                .collect();
            ExecResult::output(listing)
        }
        ["fg"] => match shell.last_job() {
            Some(id) => foreground(shell, id).await,
            None => ExecResult::failure("fg: no current job\n"),
        },
        ["fg", spec] => match parse_job_spec(spec) {
            Some(id) => foreground(shell, id).await,
            None => ExecResult::failure(format!("fg: {}: no such job\n", spec)),
        },
        ["kill", specs @ ..] if !specs.is_empty() && specs.iter().all(|s| s.starts_with('%')) => {
            let mut result = ExecResult::ok();
            for spec in specs {
                let killed = parse_job_spec(spec).map(|id| shell.kill(id));
                if !matches!(killed, Some(Ok(()))) {
                    result.stderr.push_str(&format!("kill: {}: no such job\n", spec));
                    result.success = false;
                }
            }
            result
        }
        _ => return None,
    };
    Some(result)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ShellConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("embsh: {}", e);
                std::process::exit(2);
            }
        },
        None => ShellConfig::default(),
    };

    let mut options: ShellOptions = config.into_options();
    if cli.capacity.is_some() {
        options.pool_capacity = cli.capacity;
    }
    if !cli.path.is_empty() {
        options.search_path = Some(cli.path.clone());
    }
    if cli.cwd.is_some() {
        options.cwd = cli.cwd.clone();
    }

    let mut shell = match Shell::new(options).await {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("embsh: {}", e);
            std::process::exit(2);
        }
    };

    forward_interrupts(shell.pause_signal());

    if let Some(line) = cli.command {
        let result = shell.exec(&line).await;
        report(&result, cli.json);
        std::process::exit(if result.success { 0 } else { 1 });
    }

    let interactive = std::io::stdin().is_terminal();
    let mut last_success = true;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("{}$ ", shell.cwd());
            let _ = std::io::stdout().flush();
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("embsh: {}", e);
                break;
            }
            None => break,
        };
        let result = match job_control(&mut shell, &line).await {
            Some(result) => result,
            None => shell.exec(&line).await,
        };
        last_success = result.success;
        report(&result, cli.json);
    }

    std::process::exit(if last_success { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn shell_with_steps() -> Shell {
        let mut programs = HashMap::new();
        programs.insert("/bin/steps".to_string(), "puts a\nstop\nputs b".to_string());
        Shell::new(ShellOptions { pool_capacity: Some(1), programs, ..Default::default() })
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_job_spec() {
        assert_eq!(parse_job_spec("%2"), Some(JobId(2)));
        assert_eq!(parse_job_spec("7"), Some(JobId(7)));
        assert_eq!(parse_job_spec("%x"), None);
    }

    #[tokio::test]
    async fn test_jobs_and_fg() {
        let mut shell = shell_with_steps().await;
        let id = shell.exec("steps").await.suspended_job.unwrap();

        let listing = job_control(&mut shell, "jobs").await.unwrap();
        assert_eq!(listing.stdout, format!("[{}]  Stopped  steps\n", id.0));

        let resumed = job_control(&mut shell, "fg").await.unwrap();
        assert_eq!(resumed.stdout, "b\n");
        assert!(shell.jobs().is_empty());

        let missing = job_control(&mut shell, "fg %9").await.unwrap();
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn test_kill_job_spec() {
        let mut shell = shell_with_steps().await;
        let id = shell.exec("steps").await.suspended_job.unwrap();

        let result = job_control(&mut shell, &format!("kill %{}", id.0)).await.unwrap();
        assert!(result.success);
        assert!(shell.jobs().is_empty());
        assert_eq!(shell.pool_stats().unwrap().available, 1);

        assert!(job_control(&mut shell, "kill 1").await.is_none());
        assert!(job_control(&mut shell, "echo hi").await.is_none());
    }
}
