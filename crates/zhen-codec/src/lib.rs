//! # zhen-codec
//!
//! Zhen H.264 码流解析与打包库, 提供 Packet 抽象、NAL 解析与访问单元打包器.
//!
//! ## 使用示例
//!
//! ```rust
//! use zhen_codec::{CodecParameters, H264Packetizer, Packet, Packetizer};
//!
//! let mut packetizer = H264Packetizer::new();
//! packetizer.open(&CodecParameters::annex_b()).unwrap();
//!
//! // 送入任意切分的 Annex-B 码流, 空包表示流结束
//! packetizer.send_packet(&Packet::from_data(vec![0u8, 0, 0, 1, 0x09, 0xF0])).unwrap();
//! packetizer.send_packet(&Packet::empty()).unwrap();
//!
//! // 只有 AUD 的码流不会产生访问单元
//! assert!(packetizer.receive_packet().is_err());
//! ```

pub mod codec_parameters;
pub mod packet;
pub mod packetizer;
pub mod packetizers;
pub mod parsers;

// 重导出常用类型
pub use codec_parameters::{BitstreamFormat, CodecParameters, VideoCodecParams};
pub use packet::{FrameType, Packet, PacketFlags};
pub use packetizer::Packetizer;
pub use packetizers::h264::{H264Packetizer, ParameterSetCache};
