//! zhen-probe - H.264 码流探测工具
//!
//! 将 Annex-B 码流或 AVCC 负载分块送入打包器, 输出流参数与访问单元统计.

mod logging;
mod probe;

use clap::Parser;
use log::error;
use std::fs::File;
use std::io::BufReader;
use std::process;

use probe::{ProbeOptions, print_stream_text, print_summary_text, print_units_text};

/// Zhen H.264 码流探测工具
#[derive(Parser, Debug)]
#[command(name = "zhen-probe", version, about = "纯 Rust H.264 码流探测工具")]
struct Cli {
    /// 输入文件路径 (Annex-B 码流或 AVCC 负载)
    input: Option<String>,

    /// avcC 配置记录文件, 指定后输入按 AVCC 负载解析
    #[arg(long, value_name = "CONFIG_FILE")]
    avcc: Option<String>,

    /// Annex-B 输入的分块大小 (字节)
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// 列出每个访问单元
    #[arg(long)]
    show_units: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,

    /// 日志详细程度 (-v=debug, -vv=trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    logging::init("zhen-probe", cli.verbose, cli.quiet);

    let Some(input_path) = cli.input.as_deref() else {
        print_banner();
        return;
    };

    if !cli.quiet {
        eprintln!(
            "zhen-probe 版本 {} -- 纯 Rust H.264 码流探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入文件: {input_path}");
    }

    let avcc_config = match cli.avcc.as_deref().map(std::fs::read).transpose() {
        Ok(config) => config,
        Err(e) => {
            error!("无法读取 avcC 配置: {e}");
            eprintln!("错误: 无法读取 avcC 配置文件: {e}");
            process::exit(1);
        }
    };

    let file = match File::open(input_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("错误: 无法打开文件 '{input_path}': {e}");
            process::exit(1);
        }
    };

    let options = ProbeOptions {
        avcc_config,
        chunk_size: cli.chunk_size,
        show_units: cli.show_units,
    };
    let report = match probe::probe(BufReader::new(file), &options) {
        Ok(r) => r,
        Err(e) => {
            error!("探测失败: {e}");
            eprintln!("错误: 探测失败: {e}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: JSON 序列化失败: {e}");
                process::exit(1);
            }
        }
    } else {
        print_stream_text(&report.stream);
        if let Some(ref units) = report.units {
            print_units_text(units);
        }
        print_summary_text(&report.summary);
    }
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "zhen-probe 版本 {} -- 纯 Rust H.264 码流探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: zhen-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --avcc <文件>       使用 avcC 配置, 输入按 AVCC 负载解析");
    println!("  --chunk-size <N>    Annex-B 分块大小 (默认 4096)");
    println!("  --show-units        列出每个访问单元");
    println!("  --json              以 JSON 格式输出");
    println!("  -q, --quiet         静默模式");
    println!("  -v, -vv             提高日志文件详细程度");
    println!();
    println!("使用 --help 查看完整用法.");
}
