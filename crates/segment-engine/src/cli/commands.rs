//! CLI 命令定义

use clap::{Parser, Subcommand};

/// 客群规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "segment-engine")]
#[command(version, about = "CRM 客群规则引擎")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别，覆盖配置文件 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 输出注册表中的字段与各类型的操作符
    Fields,

    /// 计算客群人数
    ///
    /// 客群文件可以是完整的客群文档，也可以只包含 rules / combinators。
    Count {
        /// 客户数据文件（JSON 数组），缺省时使用配置 segment.population_path
        #[arg(short, long)]
        customers: Option<String>,

        /// 客群文档路径
        #[arg(short, long)]
        segment: String,

        /// 输出指定客户的逐条评估过程
        #[arg(long)]
        explain: Option<String>,
    },

    /// 根据自然语言请求生成规则
    Suggest {
        /// 客户数据文件（JSON 数组），缺省时使用配置 segment.population_path
        #[arg(short, long)]
        customers: Option<String>,

        /// 自然语言请求
        #[arg(short, long)]
        prompt: String,
    },
}
