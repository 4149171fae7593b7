//! # Ranger CLI
//!
//! 松灵 Ranger 底盘命令行工具。每个子命令独立执行：读取配置、连接、执行、断开。
//!
//! ```bash
//! # 配置默认接口与车型
//! ranger-cli config set --can can0 --mini false
//!
//! # 查询版本与状态
//! ranger-cli info
//!
//! # 以 0.3 m/s 前进 2 秒
//! ranger-cli drive --linear 0.3 --duration 2
//!
//! # 持续打印状态（Ctrl-C 退出）
//! ranger-cli monitor --frequency 5
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod session;

use commands::{
    ConfigCommand, DriveCommand, InfoCommand, LightCommand, ModeCommand, MonitorCommand,
};
use session::ConnectionArgs;

/// Ranger CLI - 移动底盘命令行工具
#[derive(Parser, Debug)]
#[command(name = "ranger-cli")]
#[command(about = "Command-line interface for AgileX Ranger UGV control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 连接并打印版本与状态
    Info {
        #[command(flatten)]
        args: InfoCommand,
    },

    /// 监控底盘状态
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 发送运动指令
    Drive {
        #[command(flatten)]
        args: DriveCommand,
    },

    /// 灯光控制
    Light {
        #[command(flatten)]
        args: LightCommand,
    },

    /// 切换运动模式
    Mode {
        #[command(flatten)]
        args: ModeCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ranger_sdk::init_logging_with("ranger=info,ranger_cli=info");

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&cli.connection.config_path()?),
        Commands::Info { args } => args.execute(&cli.connection),
        Commands::Monitor { args } => args.execute(&cli.connection),
        Commands::Drive { args } => args.execute(&cli.connection),
        Commands::Light { args } => args.execute(&cli.connection),
        Commands::Mode { args } => args.execute(&cli.connection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_drive() {
        let cli = Cli::try_parse_from([
            "ranger-cli",
            "--interface",
            "vcan0",
            "drive",
            "--linear",
            "-0.3",
            "--steer",
            "0.2",
            "--mode",
            "parallel",
        ])
        .unwrap();
        assert_eq!(cli.connection.interface.as_deref(), Some("vcan0"));
        match cli.command {
            Commands::Drive { args } => {
                assert_eq!(args.linear, -0.3);
                assert_eq!(args.steer, 0.2);
                assert_eq!(args.duration, 1.0);
                assert_eq!(args.mode, Some(commands::mode::ModeArg::Parallel));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ranger-cli", "info", "--mini-v1", "-i", "can1"]).unwrap();
        assert!(cli.connection.mini_v1);
        assert_eq!(cli.connection.interface.as_deref(), Some("can1"));
    }

    #[test]
    fn test_light_release_conflicts_with_settings() {
        assert!(Cli::try_parse_from(["ranger-cli", "light", "--release"]).is_ok());
        assert!(
            Cli::try_parse_from(["ranger-cli", "light", "--release", "--front", "off"]).is_err()
        );
        assert!(Cli::try_parse_from(["ranger-cli", "light", "--front", "custom:120"]).is_err());
    }

    #[test]
    fn test_parse_config_set() {
        let cli =
            Cli::try_parse_from(["ranger-cli", "config", "set", "--can", "can2", "--mini", "true"])
                .unwrap();
        match cli.command {
            Commands::Config(ConfigCommand::Set { can, mini }) => {
                assert_eq!(can.as_deref(), Some("can2"));
                assert_eq!(mini, Some(true));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mode_rejects_unknown() {
        assert!(Cli::try_parse_from(["ranger-cli", "mode", "spinning"]).is_ok());
        assert!(Cli::try_parse_from(["ranger-cli", "mode", "crab"]).is_err());
    }
}
