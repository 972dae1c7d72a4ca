//! 打包器参数.
//!
//! 描述输入码流的封装方式与附加数据, 以及打包器解析出的输出流参数.

use zhen_core::Rational;

/// 输入码流的 NAL 封装方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitstreamFormat {
    /// Annex B: 以 `00 00 01` / `00 00 00 01` 起始码分隔 NAL
    #[default]
    AnnexB,
    /// AVCC: 以 1-4 字节大端长度前缀分隔 NAL (MP4 / MKV)
    Avcc,
}

/// 打包器输入参数
///
/// 通常由上游解封装器提供.
#[derive(Debug, Clone, Default)]
pub struct CodecParameters {
    /// NAL 封装方式
    pub format: BitstreamFormat,
    /// 额外数据
    ///
    /// - AVCC: AVCDecoderConfigurationRecord (avcC box 内容)
    /// - Annex B: 可选的起始码格式 SPS / PPS
    pub extra_data: Vec<u8>,
    /// 输入时间戳的时间基, 原样传递到输出包
    pub time_base: Rational,
}

impl CodecParameters {
    /// Annex B 输入, 无额外数据
    pub fn annex_b() -> Self {
        Self {
            format: BitstreamFormat::AnnexB,
            extra_data: Vec::new(),
            time_base: Rational::MPEG_90K,
        }
    }

    /// AVCC 输入, 附带 avcC 配置记录
    pub fn avcc(config: impl Into<Vec<u8>>) -> Self {
        Self {
            format: BitstreamFormat::Avcc,
            extra_data: config.into(),
            time_base: Rational::MPEG_90K,
        }
    }
}

/// 输出视频流参数 (来自当前缓存的 SPS)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCodecParams {
    /// 宽度 (像素, 宏块对齐)
    pub width: u32,
    /// 高度 (像素, 宏块对齐)
    pub height: u32,
    /// 采样宽高比 (SAR), 未声明时为 [`Rational::UNDEFINED`]
    pub sample_aspect_ratio: Rational,
    /// 显示宽高比 (DAR), SAR 未声明时为 [`Rational::UNDEFINED`]
    pub display_aspect_ratio: Rational,
}
