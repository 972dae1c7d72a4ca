//! 数据包 (Packet).
//!
//! 打包器的输入与输出单位: 输入为任意切分的码流片段,
//! 输出为一个完整的访问单元 (一帧).

use bitflags::bitflags;
use bytes::Bytes;
use zhen_core::Rational;
use zhen_core::timestamp::NOPTS_VALUE;

bitflags! {
    /// 输入数据包标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u32 {
        /// 与前一个数据包之间不连续 (seek、丢包等)
        const DISCONTINUITY = 0x0001;
        /// 数据包内容已损坏
        const CORRUPTED = 0x0002;
    }
}

/// 访问单元的帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameType {
    /// 未分类 (slice_type 非法或无法解析)
    #[default]
    Unclassified,
    /// I 帧 (帧内编码, 含 SI)
    I,
    /// P 帧 (前向预测, 含 SP)
    P,
    /// B 帧 (双向预测)
    B,
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unclassified => write!(f, "?"),
            Self::I => write!(f, "I"),
            Self::P => write!(f, "P"),
            Self::B => write!(f, "B"),
        }
    }
}

/// 数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位, 0 表示未知)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 是否为关键帧 (仅输出包有效)
    pub is_keyframe: bool,
    /// 帧类型 (仅输出包有效)
    pub frame_type: FrameType,
    /// 输入标志
    pub flags: PacketFlags,
}

impl Packet {
    /// 创建空数据包 (送入打包器表示流结束)
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            is_keyframe: false,
            frame_type: FrameType::Unclassified,
            flags: PacketFlags::empty(),
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 设置时间戳
    pub fn with_timestamps(mut self, pts: i64, dts: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }

    /// 追加输入标志
    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (流结束标记)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
