//! Command line argument definitions, following the OCI runtime command
//! line interface that callers like containerd-shims and docker expect.
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct GlobalOpts {
    /// root directory to store container state
    #[clap(long)]
    pub root: Option<PathBuf>,
    /// change log level to debug
    #[clap(long)]
    pub debug: bool,
    /// set the log file to write kontainer logs to (default is '/dev/stderr')
    #[clap(long)]
    pub log: Option<PathBuf>,
    /// set the log format ('text' (default), or 'json')
    #[clap(long)]
    pub log_format: Option<String>,
    /// accepted for compatibility with common OCI callers, cgroups are
    /// always managed through the unified hierarchy directly
    #[clap(long)]
    pub systemd_cgroup: bool,
}

/// Create a container
#[derive(Parser, Debug)]
pub struct Create {
    /// Path to the bundle directory, containing config.json and root filesystem
    #[clap(short, long, default_value = ".")]
    pub bundle: PathBuf,
    /// File to write pid of the container created
    #[clap(long)]
    pub pid_file: Option<PathBuf>,
    /// Pass N additional file descriptors to the container (stdio + $LISTEN_FDS + N in total)
    #[clap(long, default_value = "0")]
    pub preserve_fds: i32,
    /// Name of the container instance to be started
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
}

/// Start a previously created container
#[derive(Parser, Debug)]
pub struct Start {
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
}

/// Show the container state
#[derive(Parser, Debug)]
pub struct State {
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
}

/// Send the specified signal to the container
#[derive(Parser, Debug)]
pub struct Kill {
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// signal by number, by name, or by name with the SIG prefix
    pub signal: String,
}

/// Release any resources held by the container
#[derive(Parser, Debug)]
pub struct Delete {
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// forces deletion of the container if it is still running (using SIGKILL)
    #[clap(short, long)]
    pub force: bool,
}

/// Display the processes inside the container
#[derive(Parser, Debug)]
pub struct Ps {
    /// format to display processes: json (default) or table
    #[clap(short, long, default_value = "json")]
    pub format: String,
    #[clap(value_parser = clap::builder::NonEmptyStringValueParser::new(), required = true)]
    pub container_id: String,
    /// options will be passed to the ps utility
    #[clap(last = true)]
    pub ps_options: Vec<String>,
}
