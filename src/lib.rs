//! # Zhen (帧)
//!
//! 纯 Rust 实现的 H.264 基本流打包器.
//!
//! 输入任意切分的字节流 (Annex B 起始码格式或 AVCC 长度前缀格式),
//! 输出按访问单元 (一帧) 组织、带时间戳的完整数据包:
//! - **重新同步**: 在任意分片边界上恢复 NAL 单元边界
//! - **字段提取**: 解析 SPS / PPS / slice header 中的 Exp-Golomb 字段
//! - **帧边界检测**: 按 H.264 §7.4.1.2.4 判定新图像的第一个 VCL NAL
//! - **参数集注入**: 在关键帧前重新插入缓存的 SPS / PPS
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use zhen::codec::{CodecParameters, H264Packetizer, Packet, Packetizer};
//!
//! let mut packetizer = H264Packetizer::new();
//! packetizer.open(&CodecParameters::annex_b()).unwrap();
//!
//! let stream: Vec<u8> = std::fs::read("input.h264").unwrap();
//! packetizer.send_packet(&Packet::from_data(stream)).unwrap();
//! packetizer.send_packet(&Packet::empty()).unwrap();
//! while let Ok(au) = packetizer.receive_packet() {
//!     println!("{:?} {} 字节", au.frame_type, au.size());
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `zhen-core` | 错误类型、比特流读取器、有理数、时间戳 |
//! | `zhen-codec` | 数据包、打包器框架、H.264 码流解析与打包 |

/// 核心类型与工具
pub use zhen_core as core;

/// 码流解析与打包框架
pub use zhen_codec as codec;

/// 获取 Zhen 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
