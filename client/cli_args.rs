use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "geostar-cli",
    version,
    about = "A command line interface for the geostar spatial index",
    long_about = "geostar-cli indexes point records stored in a block-paged data file with an R*-tree.\nIt can execute a single command or run an interactive session."
)]
pub struct CliArgs {
    /// 配置文件路径
    #[arg(short, long, default_value = "geostar.toml")]
    pub config: String,

    /// 生成默认配置文件并退出
    #[arg(long)]
    pub generate_config: bool,

    /// Maximum entries per node (overrides config file)
    #[arg(short = 'm', long)]
    pub max_entries: Option<usize>,

    /// Record data file (overrides config file)
    #[arg(short = 'd', long)]
    pub data_file: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enter interactive mode
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(max_entries) = self.max_entries {
            if max_entries < 2 {
                return Err("Max entries must be at least 2".to_string());
            }
        }
        Ok(())
    }

    pub fn should_run_interactive(&self) -> bool {
        self.interactive || self.command.is_empty()
    }
}
