//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `fields` - 输出可筛选字段与操作符
//! - `count` - 计算客群文档在客户数据上的人数
//! - `suggest` - 根据自然语言请求生成规则并计算人数
//!
//! # 使用示例
//!
//! ```bash
//! segment-engine fields
//! segment-engine count --customers customers.json --segment vip.json
//! segment-engine count -c customers.json -s vip.json --explain 665f1c2e9a
//! segment-engine suggest -c customers.json -p "active customers who spent over 10k"
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
