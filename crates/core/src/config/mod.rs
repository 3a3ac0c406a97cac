//! 应用配置
//!
//! 配置按模块划分为 database / api / assignment / jobs / notifications / ai / observability，
//! 加载顺序为内置默认值、TOML 配置文件、`HELPDESK_` 前缀的环境变量。

pub mod models;

#[cfg(test)]
mod tests;

pub use models::*;
