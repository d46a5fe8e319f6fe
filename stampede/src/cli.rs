//! Command line surface of the `stampede` binary.
use crate::error::BenchError;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use mock_broker::{BrokerConfig, MockBroker};
use stampede_core::transport::ConnectOptions;
use stampede_core::{
    PublishMode, RunConfig, DEFAULT_CLIENT_ID, DEFAULT_CLUSTER_ID, DEFAULT_MAX_PUB_ACKS_INFLIGHT,
    DEFAULT_MESSAGE_SIZE, DEFAULT_NUM_MSGS, DEFAULT_NUM_PUBS, DEFAULT_NUM_SUBS,
    DEFAULT_SERVER_URL,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Flags spelled with a single dash despite being more than one letter long.
const LONG_FLAGS: &[&str] = &[
    "cluster", "np", "ns", "sync", "ms", "io", "mpa", "id", "csv", "qgroup", "creds", "cd", "cf",
    "ck", "pw",
];

const MEM_SCHEME: &str = "mem://";
const TLS_SCHEME: &str = "tls://";

#[derive(Parser, Debug)]
#[command(name = "stampede", version, about = "Pub/sub throughput benchmark")]
pub struct Args {
    /// Server URLs, separated by commas
    #[arg(short = 's', value_name = "URLS", default_value = DEFAULT_SERVER_URL)]
    pub servers: String,

    /// Cluster ID
    #[arg(short = 'c', long = "cluster", value_name = "CLUSTER_ID", default_value = DEFAULT_CLUSTER_ID)]
    pub cluster_id: String,

    /// Number of concurrent publishers
    #[arg(long = "np", value_name = "NUM_PUBLISHERS", default_value_t = DEFAULT_NUM_PUBS)]
    pub num_pubs: usize,

    /// Number of concurrent subscribers
    #[arg(long = "ns", value_name = "NUM_SUBSCRIBERS", default_value_t = DEFAULT_NUM_SUBS)]
    pub num_subs: usize,

    /// Number of messages to publish
    #[arg(short = 'n', value_name = "NUM_MSGS", default_value_t = DEFAULT_NUM_MSGS)]
    pub num_msgs: u64,

    /// Publish synchronously
    #[arg(long = "sync")]
    pub sync: bool,

    /// Message size in bytes
    #[arg(long = "ms", value_name = "MESSAGE_SIZE", default_value_t = DEFAULT_MESSAGE_SIZE)]
    pub message_size: usize,

    /// Subscribers ignore old messages
    #[arg(long = "io")]
    pub ignore_old: bool,

    /// Max number of published acks in flight
    #[arg(long = "mpa", value_name = "MAX", default_value_t = DEFAULT_MAX_PUB_ACKS_INFLIGHT)]
    pub max_pub_acks: usize,

    /// Base client ID
    #[arg(long = "id", value_name = "CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// Save bench data to a CSV file
    #[arg(long = "csv", value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Queue group name
    #[arg(long = "qgroup", value_name = "QUEUE_GROUP_NAME", default_value = "")]
    pub queue_group: String,

    /// Credentials file
    #[arg(long = "creds", value_name = "FILE")]
    pub creds: Option<PathBuf>,

    /// Directory of *.pem root certificates
    #[arg(long = "cd", value_name = "PATH")]
    pub cert_dir: Option<PathBuf>,

    /// Client certificate file
    #[arg(long = "cf", value_name = "FILE")]
    pub cert_file: Option<PathBuf>,

    /// Client certificate key
    #[arg(long = "ck", value_name = "FILE")]
    pub cert_key: Option<PathBuf>,

    /// User ID
    #[arg(short = 'u', value_name = "USER", default_value = "")]
    pub user: String,

    /// Password
    #[arg(long = "pw", value_name = "PASSWORD", default_value = "")]
    pub password: String,

    pub subject: String,
}

/// A validated command line.
#[derive(Debug)]
pub struct Invocation {
    pub servers: Vec<String>,
    pub options: ConnectOptions,
    pub config: RunConfig,
    pub csv: Option<PathBuf>,
}

/// Rewrite `-np 5` style flags to `--np 5` so that clap accepts them.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }

            match text.strip_prefix('-') {
                Some(flag) if !flag.starts_with('-') => {
                    let name = flag.split('=').next().unwrap_or(flag);
                    if LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{text}"))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

impl Args {
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    pub fn validate(self) -> Result<Invocation, BenchError> {
        let servers: Vec<String> = self
            .servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            return Err(BenchError::Config("no server URL given".to_string()));
        }

        let mut options = ConnectOptions {
            cluster_id: self.cluster_id,
            credentials: self.creds,
            max_pub_acks_inflight: self.max_pub_acks,
            ..ConnectOptions::default()
        };

        if !self.user.is_empty() && !self.password.is_empty() {
            options.user_password = Some((self.user, self.password));
        }

        if servers.iter().any(|url| url.starts_with(TLS_SCHEME)) {
            match (self.cert_dir, self.cert_file, self.cert_key) {
                (Some(dir), _, _) => options.root_certificates = pem_files(&dir)?,
                (None, Some(cert), Some(key)) => options.client_certificate = Some((cert, key)),
                _ => {
                    return Err(BenchError::Config(
                        "a tls:// server requires -cd, or both -cf and -ck".to_string(),
                    ))
                }
            }
        }

        let mode = if self.sync {
            PublishMode::Sync
        } else {
            PublishMode::Async
        };
        let config = RunConfig::new(&self.subject)
            .messages(self.num_msgs)
            .message_size(self.message_size)
            .publishers(self.num_pubs)
            .subscribers(self.num_subs)
            .publish_mode(mode)
            .max_pub_acks_inflight(self.max_pub_acks)
            .queue_group(&self.queue_group)
            .ignore_old(self.ignore_old)
            .client_id(&self.client_id);

        Ok(Invocation {
            servers,
            options,
            config,
            csv: self.csv,
        })
    }
}

/// A flag combination rejected by `validate`, as a clap error carrying the usage line.
pub fn usage_error(msg: &str) -> clap::Error {
    Args::command().error(ErrorKind::ArgumentConflict, msg)
}

/// Exit the way clap does for bad arguments when `err` is a configuration error.
pub fn exit_on_usage(err: BenchError) -> BenchError {
    if let BenchError::Config(msg) = &err {
        usage_error(msg).exit();
    }
    err
}

/// Every `*.pem` file in `dir`, sorted by name.
fn pem_files(dir: &Path) -> Result<Vec<PathBuf>, BenchError> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "pem") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Pick the messaging client for the given servers.
///
/// Only the in-process broker (`mem://`) ships with this crate.
pub fn connector_for(servers: &[String], options: &ConnectOptions) -> Result<MockBroker, BenchError> {
    if let Some(url) = servers.iter().find(|url| !url.starts_with(MEM_SCHEME)) {
        return Err(BenchError::Config(format!(
            "no messaging client available for {url:?} (supported: {MEM_SCHEME})"
        )));
    }

    let mut config = BrokerConfig::default().cluster_id(&options.cluster_id);
    if let Some((user, password)) = &options.user_password {
        config = config.credentials(user, password);
    }
    Ok(MockBroker::with_config(config))
}
