//! # zhen-core
//!
//! Zhen 打包器核心库, 提供错误类型、比特流读取与时间相关的基础类型.

pub mod bitreader;
pub mod error;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{ZhenError, ZhenResult};
pub use rational::Rational;
pub use timestamp::{NOPTS_VALUE, Timestamp};
