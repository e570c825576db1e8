use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use usernode::{DirectoryConfig, IdNode};

/// Runtime configuration for the `usernode-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "usernode-tonic-server",
    version,
    about = "A gRPC service for user identities and per-user profile documents"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:8082" or "/tmp/usernode.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8082"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Area code embedded in every generated user ID.
    ///
    /// Together with `NODE_ID` this must be unique per running instance,
    /// otherwise two instances can issue the same ID.
    ///
    /// Environment variable: `AREA_ID`
    #[arg(long, env = "AREA_ID", default_value_t = 0)]
    pub area_id: u64,

    /// Node code embedded in every generated user ID.
    ///
    /// Environment variable: `NODE_ID`
    #[arg(long, env = "NODE_ID", default_value_t = 0)]
    pub node_id: u64,

    /// Database holding the user and info collections.
    ///
    /// Environment variable: `DB_NAME`
    #[arg(long, env = "DB_NAME", default_value_t = String::from("usernode"))]
    pub db_name: String,

    /// Prefix prepended to every collection name.
    ///
    /// Environment variable: `COLLECTION_PREFIX`
    #[arg(long, env = "COLLECTION_PREFIX", default_value_t = String::new())]
    pub collection_prefix: String,

    /// Secret mixed into every stored password. Changing it invalidates all
    /// existing credentials.
    ///
    /// Environment variable: `USERNODE_SECRET`
    #[arg(long, env = "USERNODE_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Page size used when a query does not supply one.
    ///
    /// Environment variable: `DEFAULT_PAGE_SIZE`
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = usernode::DEFAULT_PAGE_SIZE)]
    pub default_page_size: u64,

    /// Number of leading user-ID characters that select an info collection.
    ///
    /// Changing it on a populated database makes existing info records
    /// unreachable.
    ///
    /// Environment variable: `SHARD_PREFIX_LEN`
    #[arg(long, env = "SHARD_PREFIX_LEN", default_value_t = usernode::DEFAULT_SHARD_PREFIX_LEN)]
    pub shard_prefix_len: usize,

    /// User field matched by free-text queries.
    ///
    /// Environment variable: `QUERY_FIELD`
    #[arg(long, env = "QUERY_FIELD", default_value_t = String::from(usernode::DEFAULT_TEXT_FIELD))]
    pub query_field: String,

    /// MongoDB connection string. Without it, data is kept in memory and lost
    /// on exit.
    ///
    /// Environment variable: `MONGODB_URI`
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: Option<String>,

    /// Seconds to wait for in-flight requests during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub directory: DirectoryConfig,
    pub mongodb_uri: Option<String>,
    pub shutdown_timeout: Duration,
}

impl core::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // The URI may embed credentials.
        f.debug_struct("ServerConfig")
            .field("server_addr", &self.server_addr)
            .field("uds", &self.uds)
            .field("directory", &self.directory)
            .field("mongodb_uri", &self.mongodb_uri.as_ref().map(|_| "<redacted>"))
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(node) = IdNode::new(args.area_id, args.node_id) else {
            bail!(
                "AREA_ID ({}) / NODE_ID ({}) exceed the ID layout (max = {} / {})",
                args.area_id,
                args.node_id,
                IdNode::max_area(),
                IdNode::max_node()
            );
        };

        if args.secret.is_empty() {
            bail!("USERNODE_SECRET must not be empty");
        }

        if args.db_name.is_empty() {
            bail!("DB_NAME must not be empty");
        }

        if args.default_page_size == 0 {
            bail!("DEFAULT_PAGE_SIZE must be greater than 0");
        }

        if args.shard_prefix_len == 0 {
            bail!("SHARD_PREFIX_LEN must be greater than 0");
        }

        if args.query_field.is_empty() {
            bail!("QUERY_FIELD must not be empty");
        }

        let mut directory = DirectoryConfig::new(node, args.db_name, args.secret)
            .with_prefix(args.collection_prefix);
        directory.default_page_size = args.default_page_size;
        directory.shard_prefix_len = args.shard_prefix_len;
        directory.text_field = args.query_field;

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            directory,
            mongodb_uri: args.mongodb_uri.filter(|uri| !uri.is_empty()),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = ["usernode-tonic-server", "--secret", "s3cret"]
            .iter()
            .chain(extra);
        ServerConfig::try_from(CliArgs::try_parse_from(args)?)
    }

    #[test]
    fn accepts_a_minimal_command_line() {
        let config = parse(&["--area-id", "3", "--node-id", "9"]).unwrap();
        assert_eq!(config.directory.node, IdNode::new(3, 9).unwrap());
        assert_eq!(config.directory.secret, "s3cret");
    }

    #[test]
    fn rejects_ids_outside_the_layout() {
        let area = (IdNode::max_area() + 1).to_string();
        assert!(parse(&["--area-id", &area]).is_err());
        let node = (IdNode::max_node() + 1).to_string();
        let err = parse(&["--node-id", &node]).unwrap_err();
        assert!(err.to_string().contains("exceed the ID layout"));

        let area = IdNode::max_area().to_string();
        let node = IdNode::max_node().to_string();
        let config = parse(&["--area-id", &area, "--node-id", &node]).unwrap();
        assert_eq!(config.directory.node.area(), IdNode::max_area());
        assert_eq!(config.directory.node.node(), IdNode::max_node());
    }

    #[test]
    fn rejects_empty_secret() {
        let args = CliArgs::try_parse_from(["usernode-tonic-server", "--secret", ""]).unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(parse(&["--default-page-size", "0"]).is_err());
        assert!(parse(&["--shard-prefix-len", "0"]).is_err());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config = parse(&["--mongodb-uri", "mongodb://user:pw@host"]).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret"));
        assert!(!printed.contains("user:pw"));
    }

    #[test]
    fn empty_mongodb_uri_means_memory() {
        let config = parse(&["--mongodb-uri", ""]).unwrap();
        assert_eq!(config.mongodb_uri, None);
    }
}
