use clap::Parser as ClapParser;
use tracing::Level;

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(ClapParser)]
#[command(
    name = "blobgate",
    version = VERSION_STRING,
    about = "EIP-4844 blob transaction proxy"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser)]
pub struct Options {
    #[arg(
        long = "env-file",
        value_name = "ENV_FILE_PATH",
        default_value = ".env",
        help = "Plain KEY=VALUE file loaded into the environment before the configuration is read.",
        help_heading = "Node options"
    )]
    pub env_file: String,
    #[arg(
        long = "http.addr",
        value_name = "ADDRESS",
        help = "Overrides PROXY_HTTP_ADDR.",
        help_heading = "Node options"
    )]
    pub http_addr: Option<String>,
    #[arg(
        long = "store",
        value_name = "STORE_PATH",
        help = "Overrides PROXY_STORE_PATH. If the path is the word `memory`, state is kept in RAM and lost on restart.",
        long_help = "Durable store for completion intents, job locks and the result cache. If the path is the word `memory`, blobgate will use the InMemory engine.",
        help_heading = "Node options"
    )]
    pub store_path: Option<String>,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Node options"
    )]
    pub log_level: Level,
}
