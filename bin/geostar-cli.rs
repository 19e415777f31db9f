use std::io::{self, Write};

use geostar::client::{CliArgs, Command, OutputFormatter, Reply, Session};
use geostar::config::{GeoStarConfig, LoggingConfig};
use geostar::Result;
use tracing::{info, Level};

fn main() -> Result<()> {
    let args = CliArgs::parse_args();

    // 验证参数
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // 生成默认配置文件
    if args.generate_config {
        let config = GeoStarConfig::default();
        config.save_to_file(&args.config)?;
        println!("✅ Generated default configuration: {}", args.config);
        return Ok(());
    }

    // 加载配置
    let mut config = GeoStarConfig::from_file(&args.config)?;

    // 命令行参数覆盖配置文件
    if let Some(max_entries) = args.max_entries {
        config.tree.max_entries = max_entries;
    }
    if let Some(data_file) = &args.data_file {
        config.storage.data_file = data_file.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }

    // 验证配置
    config.validate()?;

    // 初始化日志系统
    init_logging(&config.logging)?;
    info!("📦 geostar {}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::open(&config)?;

    if args.should_run_interactive() {
        config.print_summary();
        run_interactive_mode(&mut session)?;
    } else {
        run_command_mode(&mut session, &args.command)?;
    }

    session.flush();
    Ok(())
}

fn run_command_mode(session: &mut Session, command: &[String]) -> Result<()> {
    let command = Command::parse(command)?;
    let reply = session.execute(command)?;
    println!("{}", OutputFormatter::format_reply(&reply));
    Ok(())
}

fn run_interactive_mode(session: &mut Session) -> Result<()> {
    println!("geostar-cli interactive mode");
    println!(
        "{}",
        OutputFormatter::format_welcome_message(
            &session.data_path().display().to_string(),
            session.rtree().len()
        )
    );
    println!("Type 'HELP' for available commands, 'QUIT' to exit.");
    println!();

    // 创建标准输入读取器
    let stdin = io::stdin();

    loop {
        // 显示提示符
        print!("{}", OutputFormatter::format_prompt(session.rtree().len()));
        io::stdout().flush()?;

        // 读取用户输入
        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => {
                // EOF (Ctrl+D)
                println!();
                break;
            }
            Ok(_) => {
                if input.trim().is_empty() {
                    continue;
                }

                let command = match Command::parse_line(&input) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", OutputFormatter::format_error(&e.to_string()));
                        continue;
                    }
                };

                match session.execute(command) {
                    Ok(Reply::Quit) => {
                        println!("{}", OutputFormatter::format_reply(&Reply::Quit));
                        break;
                    }
                    Ok(reply) => println!("{}", OutputFormatter::format_reply(&reply)),
                    Err(e) => println!("{}", OutputFormatter::format_error(&e.to_string())),
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// 初始化日志系统
fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    match (config.output.as_str(), &config.log_file) {
        ("file", Some(log_file)) => {
            // 确保日志目录存在
            if let Some(parent) = log_file.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(false),
                )
                .with(tracing_subscriber::filter::LevelFilter::from_level(filter))
                .init();
        }
        _ => {
            // 日志写到 stderr，不与命令输出混在一起
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(false),
                )
                .with(tracing_subscriber::filter::LevelFilter::from_level(filter))
                .init();
        }
    }

    Ok(())
}
