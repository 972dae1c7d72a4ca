//! 码流探测: 分块送入打包器并汇总访问单元.

use std::io::Read;

use log::{debug, info};
use serde::Serialize;
use zhen_codec::{
    BitstreamFormat, CodecParameters, FrameType, H264Packetizer, Packet, Packetizer,
};
use zhen_core::{Rational, Timestamp, ZhenError, ZhenResult};

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub stream: StreamInfo,
    pub summary: UnitSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<UnitInfo>>,
}

/// 流参数
#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub codec_name: String,
    pub format: String,
    pub time_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_aspect_ratio: Option<String>,
    pub extra_data_size: usize,
}

/// 单个访问单元
#[derive(Debug, Serialize)]
pub struct UnitInfo {
    pub index: u64,
    pub frame_type: String,
    pub keyframe: bool,
    pub size: usize,
    pub pts: String,
}

/// 访问单元统计
#[derive(Debug, Default, Serialize)]
pub struct UnitSummary {
    pub total_units: u64,
    pub total_bytes: u64,
    pub i_units: u64,
    pub p_units: u64,
    pub b_units: u64,
    pub unclassified_units: u64,
    pub input_bytes: u64,
    pub input_chunks: u64,
}

impl UnitSummary {
    fn record(&mut self, packet: &Packet) {
        self.total_units += 1;
        self.total_bytes += packet.size() as u64;
        match packet.frame_type {
            FrameType::I => self.i_units += 1,
            FrameType::P => self.p_units += 1,
            FrameType::B => self.b_units += 1,
            FrameType::Unclassified => self.unclassified_units += 1,
        }
    }
}

/// 探测选项
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// avcC 配置记录, `None` 表示 Annex-B 输入
    pub avcc_config: Option<Vec<u8>>,
    /// Annex-B 输入的分块大小 (字节)
    pub chunk_size: usize,
    /// 是否记录每个访问单元
    pub show_units: bool,
}

// ============================================================
// 探测流程
// ============================================================

/// 读取整个输入并探测
///
/// Annex-B 输入按 `chunk_size` 分块送入, 用于检验跨块重组;
/// AVCC 输入的长度前缀不能跨包拆分, 整体作为一个包送入.
pub fn probe<R: Read>(mut reader: R, options: &ProbeOptions) -> ZhenResult<ProbeReport> {
    if options.chunk_size == 0 {
        return Err(ZhenError::InvalidArgument("分块大小必须大于 0".into()));
    }

    let params = match &options.avcc_config {
        Some(config) => CodecParameters::avcc(config.clone()),
        None => CodecParameters::annex_b(),
    };
    let mut packetizer = H264Packetizer::new();
    packetizer.open(&params)?;

    let mut summary = UnitSummary::default();
    let mut units = options.show_units.then(Vec::new);

    match params.format {
        BitstreamFormat::AnnexB => {
            let mut buf = vec![0u8; options.chunk_size];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                summary.input_bytes += n as u64;
                summary.input_chunks += 1;
                packetizer.send_packet(&Packet::from_data(buf[..n].to_vec()))?;
                collect_units(&mut packetizer, &mut summary, units.as_mut())?;
            }
        }
        BitstreamFormat::Avcc => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            debug!("AVCC 输入整体送入: {} 字节", data.len());
            summary.input_bytes = data.len() as u64;
            summary.input_chunks = 1;
            packetizer.send_packet(&Packet::from_data(data))?;
        }
    }

    packetizer.send_packet(&Packet::empty())?;
    collect_units(&mut packetizer, &mut summary, units.as_mut())?;
    info!(
        "探测完成: 输入 {} 字节, 访问单元 {} 个",
        summary.input_bytes, summary.total_units
    );

    Ok(ProbeReport {
        stream: build_stream_info(&packetizer, params.format, params.time_base),
        summary,
        units,
    })
}

/// 取出所有已完成的访问单元, 直到需要更多数据或流结束
fn collect_units(
    packetizer: &mut H264Packetizer,
    summary: &mut UnitSummary,
    mut units: Option<&mut Vec<UnitInfo>>,
) -> ZhenResult<()> {
    loop {
        match packetizer.receive_packet() {
            Ok(packet) => {
                if let Some(units) = units.as_deref_mut() {
                    units.push(UnitInfo {
                        index: summary.total_units,
                        frame_type: packet.frame_type.to_string(),
                        keyframe: packet.is_keyframe,
                        size: packet.size(),
                        pts: Timestamp::new(packet.pts, packet.time_base).to_string(),
                    });
                }
                summary.record(&packet);
            }
            Err(ZhenError::NeedMoreData) | Err(ZhenError::Eof) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn format_rational(r: Rational) -> Option<String> {
    r.is_valid().then(|| format!("{}:{}", r.num, r.den))
}

fn build_stream_info(
    packetizer: &H264Packetizer,
    format: BitstreamFormat,
    time_base: Rational,
) -> StreamInfo {
    let sps = packetizer.parameter_sets().sps();
    let video = packetizer.video_params();
    StreamInfo {
        codec_name: packetizer.name().to_string(),
        format: match format {
            BitstreamFormat::AnnexB => "annexb",
            BitstreamFormat::Avcc => "avcc",
        }
        .to_string(),
        time_base: format!("{}/{}", time_base.num, time_base.den),
        profile: sps.map(|s| s.profile_idc),
        level: sps.map(|s| s.level_idc),
        width: video.as_ref().map(|v| v.width),
        height: video.as_ref().map(|v| v.height),
        sample_aspect_ratio: video
            .as_ref()
            .and_then(|v| format_rational(v.sample_aspect_ratio)),
        display_aspect_ratio: video
            .as_ref()
            .and_then(|v| format_rational(v.display_aspect_ratio)),
        extra_data_size: packetizer.extra_data().len(),
    }
}

// ============================================================
// 文本输出
// ============================================================

/// 文本输出: 流参数
pub fn print_stream_text(info: &StreamInfo) {
    println!("[STREAM]");
    println!("  编解码器     : {}", info.codec_name);
    println!("  封装方式     : {}", info.format);
    println!("  时间基       : {}", info.time_base);
    if let (Some(profile), Some(level)) = (info.profile, info.level) {
        println!("  Profile      : {profile} (level {level})");
    }
    if let (Some(w), Some(h)) = (info.width, info.height) {
        println!("  分辨率       : {w}x{h}");
    }
    if let Some(ref sar) = info.sample_aspect_ratio {
        println!("  SAR          : {sar}");
    }
    if let Some(ref dar) = info.display_aspect_ratio {
        println!("  DAR          : {dar}");
    }
    println!("  额外数据     : {} 字节", info.extra_data_size);
    println!("[/STREAM]");
    println!();
}

/// 文本输出: 访问单元列表
pub fn print_units_text(units: &[UnitInfo]) {
    println!("[UNITS]");
    for unit in units {
        println!(
            "  #{:<6} {} {:>8} 字节  pts={}{}",
            unit.index,
            unit.frame_type,
            unit.size,
            unit.pts,
            if unit.keyframe { "  [关键帧]" } else { "" }
        );
    }
    println!("[/UNITS]");
    println!();
}

/// 文本输出: 访问单元统计
pub fn print_summary_text(summary: &UnitSummary) {
    println!("[SUMMARY]");
    println!(
        "  输入         : {} 字节 / {} 块",
        summary.input_bytes, summary.input_chunks
    );
    println!("  访问单元总数 : {}", summary.total_units);
    println!(
        "  帧类型       : I={} P={} B={} 未分类={}",
        summary.i_units, summary.p_units, summary.b_units, summary.unclassified_units
    );
    println!(
        "  输出总量     : {} 字节 ({:.2} KB)",
        summary.total_bytes,
        summary.total_bytes as f64 / 1024.0
    );
    println!("[/SUMMARY]");
    println!();
}
