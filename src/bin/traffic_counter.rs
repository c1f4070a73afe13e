use anyhow::{Context, Result};
use clap::Parser;
/// Multi-camera vehicle line-crossing counter
///
/// 主程序入口 - 直接运行: cargo run --bin traffic-counter --release -- --config cameras.json
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traffic_counter::config::{CountingConfig, RunSettings, DEFAULT_OUTPUT_DIR};
use traffic_counter::{Orchestrator, ReplayFactory};

/// 多路摄像头过线计数程序
#[derive(Parser, Debug)]
#[command(author, version, about = "多摄像头车辆过线计数", long_about = None)]
struct Args {
    /// 摄像头配置文件 (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// 输出目录 (事件日志/状态/汇总)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    out: PathBuf,

    /// 调试用: 每路摄像头最多处理N帧 (N >= 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_frames: Option<u64>,

    /// 每路摄像头一个工作线程 (默认逐个顺序处理)
    #[arg(long)]
    concurrent: bool,

    /// 轨迹闲置N帧后清除 (默认不清除)
    #[arg(long)]
    track_idle_frames: Option<u64>,

    /// 日志级别 (trace/debug/info/warn/error), 覆盖 RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn settings(&self) -> RunSettings {
        RunSettings {
            output_dir: self.out.clone(),
            max_frames: self.max_frames,
            track_idle_frames: self.track_idle_frames,
            ..RunSettings::default()
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("traffic_counter={}", level)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("traffic_counter=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    info!("🚗 Traffic counter starting");
    let config = CountingConfig::load(&args.config)
        .with_context(|| format!("cannot load camera config {}", args.config.display()))?;
    let settings = args.settings();
    settings.print_summary();

    // Ctrl+C: 中断当前会话, 仍然写出最终汇总
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⏹️  interrupt received, finalizing sessions...");
                cancel.cancel();
            }
        });
    }

    let concurrent = args.concurrent;
    let report = tokio::task::spawn_blocking(move || {
        let orchestrator = Orchestrator::new(Arc::new(ReplayFactory), settings);
        let entries = config.camera_entries();
        if concurrent {
            info!("🧵 concurrent mode: one worker per camera");
            orchestrator.run_concurrent(entries, &cancel)
        } else {
            orchestrator.run_sequential(entries, &cancel)
        }
    })
    .await
    .context("orchestrator task failed")?
    .context("cannot write aggregate report")?;

    for outcome in &report.outcomes {
        info!(
            "  {} | {} frames | {} events | {} | {}",
            outcome.camera_id,
            outcome.frames,
            outcome.events,
            outcome.end,
            outcome.counts.summary_line()
        );
    }
    info!("✅ done, aggregate at {}", report.aggregate_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frame_cap_rejected() {
        let args = ["traffic-counter", "--config", "cams.json", "--max-frames", "0"];
        assert!(Args::try_parse_from(args).is_err());
    }

    #[test]
    fn test_settings_from_args() {
        let args = Args::try_parse_from([
            "traffic-counter",
            "--config",
            "cams.json",
            "--max-frames",
            "25",
            "--track-idle-frames",
            "90",
        ])
        .unwrap();
        let settings = args.settings();
        assert_eq!(settings.max_frames, Some(25));
        assert_eq!(settings.track_idle_frames, Some(90));
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(!args.concurrent);
    }
}
