use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::MySqlParams;

/// Endpoints polled when no `--source` is given.
pub const DEFAULT_SOURCES: [(&str, &str); 2] = [
    (
        "trento",
        "https://os.smartcommunitylab.it/core.mobility/bikesharing/trento",
    ),
    (
        "rovereto",
        "https://os.smartcommunitylab.it/core.mobility/bikesharing/rovereto",
    ),
];

/// A city and the endpoint publishing its stations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub city: String,
    pub url: String,
}

impl Source {
    pub fn new(city: &str, url: &str) -> Self {
        Self {
            city: city.to_string(),
            url: url.to_string(),
        }
    }
}

/// Parses `city=url`.
impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((city, url)) if !city.trim().is_empty() && !url.trim().is_empty() => {
                Ok(Source::new(city.trim(), url.trim()))
            }
            _ => Err(format!("expected `city=url`, got `{}`", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File(PathBuf),
    Sqlite(PathBuf),
    MySql(MySqlParams),
}

/// Storage selection flags. Exactly one backend must be chosen.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct StorageArgs {
    /// Store stations in a JSON file
    #[clap(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Store stations in an SQLite database
    #[clap(long, value_name = "PATH")]
    pub sqlite: Option<PathBuf>,

    /// Store stations in a MySQL database reachable at this host
    #[clap(long, value_name = "HOST")]
    pub mysql_host: Option<String>,

    /// MySQL port
    #[clap(long, default_value_t = 3306)]
    pub mysql_port: u16,

    /// MySQL user
    #[clap(long)]
    pub mysql_user: Option<String>,

    /// MySQL password
    #[clap(long)]
    pub mysql_password: Option<String>,

    /// MySQL database name
    #[clap(long)]
    pub mysql_database: Option<String>,
}

impl TryFrom<StorageArgs> for StorageConfig {
    type Error = Error;

    fn try_from(args: StorageArgs) -> Result<Self> {
        let mysql = args.mysql_host.map(|host| (host, args.mysql_user, args.mysql_database));

        match (args.file, args.sqlite, mysql) {
            (Some(path), None, None) => Ok(StorageConfig::File(path)),
            (None, Some(path), None) => Ok(StorageConfig::Sqlite(path)),
            (None, None, Some((host, user, database))) => {
                let user = user.ok_or_else(|| {
                    Error::Configuration("--mysql-user is required with --mysql-host".into())
                })?;
                let database = database.ok_or_else(|| {
                    Error::Configuration("--mysql-database is required with --mysql-host".into())
                })?;

                Ok(StorageConfig::MySql(MySqlParams {
                    host,
                    port: args.mysql_port,
                    user,
                    password: args.mysql_password,
                    database,
                }))
            }
            (None, None, None) => Err(Error::Configuration(
                "no storage selected, use one of --file, --sqlite or --mysql-host".into(),
            )),
            _ => Err(Error::Configuration(
                "only one of --file, --sqlite or --mysql-host may be given".into(),
            )),
        }
    }
}

/// Everything one collector run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: Vec<Source>,
    /// `None` runs a single cycle.
    pub sleep_interval: Option<Duration>,
    pub storage: StorageConfig,
}

impl Config {
    pub fn new(sources: Vec<Source>, sleep_interval_secs: u64, storage: StorageArgs) -> Result<Self> {
        let sources = if sources.is_empty() {
            DEFAULT_SOURCES
                .iter()
                .map(|(city, url)| Source::new(city, url))
                .collect()
        } else {
            sources
        };

        let mut seen = HashSet::new();
        if let Some(dup) = sources.iter().find(|s| !seen.insert(s.city.as_str())) {
            return Err(Error::Configuration(format!(
                "city [{}] is configured more than once",
                dup.city
            )));
        }

        Ok(Self {
            sources,
            sleep_interval: (sleep_interval_secs > 0)
                .then(|| Duration::from_secs(sleep_interval_secs)),
            storage: storage.try_into()?,
        })
    }
}
