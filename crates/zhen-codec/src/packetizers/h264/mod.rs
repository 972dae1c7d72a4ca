//! H.264 打包器.
//!
//! 将任意切分的 Annex-B 码流或 AVCC 长度前缀负载重组为完整的访问单元,
//! 每个 I 帧访问单元前自动插入缓存的 SPS / PPS.
//!
//! 处理流程:
//! 1. 重组: Annex-B 起始码扫描 / AVCC 长度前缀拆分, 得到 [`NalFragment`]
//! 2. 分类: 按 NAL 类型更新参数集缓存或累积到当前访问单元
//! 3. 帧边界: 比较相邻切片头字段 (H.264 §7.4.1.2.4)
//! 4. 输出: I 帧前置 SPS + PPS, 放入输出队列

mod param_cache;


use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace, warn};
use zhen_core::{NOPTS_VALUE, Rational, ZhenError, ZhenResult};

use crate::codec_parameters::{BitstreamFormat, CodecParameters, VideoCodecParams};
use crate::packet::{FrameType, Packet, PacketFlags};
use crate::packetizer::Packetizer;
use crate::parsers::h264::{
    AnnexBReframer, AvccReframer, NalFragment, NalUnitType, SliceHeader, build_avcc_config,
    is_new_picture, parse_avcc_config, parse_pps, parse_slice_header, parse_sps,
    remove_emulation_prevention,
};

pub use param_cache::ParameterSetCache;

/// AVCC 配置缺失或无效时使用的长度前缀字节数
const DEFAULT_LENGTH_SIZE: usize = 4;

/// 正在累积的访问单元
#[derive(Debug, Default)]
struct AccessUnit {
    fragments: Vec<Bytes>,
    /// 首个切片的帧类型
    frame_type: FrameType,
    /// 已包含至少一个切片
    has_slice: bool,
    pts: i64,
    dts: i64,
}

impl AccessUnit {
    fn push(&mut self, fragment: NalFragment) {
        if self.fragments.is_empty() {
            self.pts = fragment.pts;
            self.dts = fragment.dts;
        }
        self.fragments.push(fragment.data);
    }

    fn size(&self) -> usize {
        self.fragments.iter().map(Bytes::len).sum()
    }

    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// H.264 打包器
pub struct H264Packetizer {
    format: BitstreamFormat,
    time_base: Rational,
    annex_b: AnnexBReframer,
    avcc: Option<AvccReframer>,
    cache: ParameterSetCache,
    /// 是否已输出过带参数集的 I 帧
    header_emitted: bool,
    current: AccessUnit,
    /// 上一个已解析的切片头 (帧边界检测)
    prev_slice: Option<SliceHeader>,
    output_queue: VecDeque<Packet>,
    opened: bool,
    flushing: bool,
}

impl Default for H264Packetizer {
    fn default() -> Self {
        Self::new()
    }
}

impl H264Packetizer {
    /// 创建打包器实例
    pub fn new() -> Self {
        Self {
            format: BitstreamFormat::AnnexB,
            time_base: Rational::MPEG_90K,
            annex_b: AnnexBReframer::new(),
            avcc: None,
            cache: ParameterSetCache::default(),
            header_emitted: false,
            current: AccessUnit::default(),
            prev_slice: None,
            output_queue: VecDeque::new(),
            opened: false,
            flushing: false,
        }
    }

    /// 创建打包器实例 (trait 对象)
    pub fn create() -> ZhenResult<Box<dyn Packetizer>> {
        Ok(Box::new(Self::new()))
    }

    /// 参数集缓存
    pub fn parameter_sets(&self) -> &ParameterSetCache {
        &self.cache
    }

    /// 当前 SPS 描述的视频参数, 未见过 SPS 时返回 `None`
    pub fn video_params(&self) -> Option<VideoCodecParams> {
        let sps = self.cache.sps()?;
        Some(VideoCodecParams {
            width: sps.width,
            height: sps.height,
            sample_aspect_ratio: sps.sar.unwrap_or(Rational::UNDEFINED),
            display_aspect_ratio: sps.display_aspect_ratio().unwrap_or(Rational::UNDEFINED),
        })
    }

    /// 输出流额外数据: 起始码格式的 SPS + PPS
    ///
    /// 任一参数集缺失时为空.
    pub fn extra_data(&self) -> Vec<u8> {
        self.cache.header().map(|h| h.to_vec()).unwrap_or_default()
    }

    /// 由当前参数集构建 avcC 配置记录
    pub fn avcc_config(&self) -> ZhenResult<Vec<u8>> {
        let (Some(sps), Some(pps)) = self.cache.nal_payloads() else {
            return Err(ZhenError::InvalidData(
                "H264: 缺少 SPS/PPS, 无法构建 avcC".into(),
            ));
        };
        let length_size = self
            .avcc
            .as_ref()
            .map(AvccReframer::length_size)
            .unwrap_or(DEFAULT_LENGTH_SIZE);
        build_avcc_config(&[sps], &[pps], length_size)
    }

    /// 丢弃流内状态 (保留参数集缓存与输出队列)
    fn reset_stream(&mut self) {
        self.annex_b.reset();
        self.current = AccessUnit::default();
        self.prev_slice = None;
    }

    /// 从 avcC 记录预填充参数集缓存, 返回长度前缀字节数
    fn seed_from_avcc(&mut self, extra_data: &[u8]) -> usize {
        if extra_data.is_empty() {
            debug!("H264: 无 avcC 配置, 等待码流中的 SPS/PPS");
            return DEFAULT_LENGTH_SIZE;
        }
        let config = match parse_avcc_config(extra_data) {
            Ok(config) => config,
            Err(err) => {
                warn!("H264: 忽略无效的 avcC 配置, err={}", err);
                return DEFAULT_LENGTH_SIZE;
            }
        };
        for nal in config.sps_list.iter().chain(config.pps_list.iter()) {
            self.handle_fragment(NalFragment::from_nal(nal, NOPTS_VALUE, NOPTS_VALUE));
        }
        if !config.sps_list.is_empty() && !config.pps_list.is_empty() {
            self.header_emitted = true;
        }
        debug!(
            "H264: avcC profile={}, level={}, length_size={}, sps={}, pps={}",
            config.profile_idc,
            config.level_idc,
            config.length_size,
            config.sps_list.len(),
            config.pps_list.len()
        );
        config.length_size
    }

    /// 从 Annex-B 额外数据预填充参数集缓存
    fn seed_from_annex_b(&mut self, extra_data: &[u8]) {
        if extra_data.is_empty() {
            return;
        }
        let mut fragments = self.annex_b.push(extra_data, NOPTS_VALUE, NOPTS_VALUE);
        fragments.extend(self.annex_b.finish());
        for fragment in fragments {
            self.handle_fragment(fragment);
        }
        // 额外数据只用于填充缓存
        self.reset_stream();
        self.output_queue.clear();
    }

    /// 分类一个 NAL 片段
    fn handle_fragment(&mut self, fragment: NalFragment) {
        if !fragment.has_header() {
            return;
        }

        if self.current.has_slice && !self.cache.is_complete() {
            warn!(
                "H264: 等待 SPS/PPS, 丢弃 {} 个 NAL",
                self.current.fragments.len()
            );
            self.current = AccessUnit::default();
        }

        let nal_type = fragment.nal_type();
        match nal_type {
            t if t.is_slice() => self.handle_slice(fragment),
            NalUnitType::Sps => self.handle_sps(fragment),
            NalUnitType::Pps => self.handle_pps(fragment),
            t if t.starts_access_unit() => {
                if self.current.has_slice {
                    self.output_access_unit();
                }
                self.current.push(fragment);
            }
            _ => self.current.push(fragment),
        }
    }

    fn handle_slice(&mut self, fragment: NalFragment) {
        let (Some(sps), Some(pps)) = (self.cache.sps(), self.cache.pps()) else {
            // 参数集未到达, 暂存等待
            self.current.has_slice = true;
            self.current.push(fragment);
            return;
        };

        let header = parse_slice_header(
            fragment.nal_type(),
            fragment.ref_idc(),
            fragment.payload(),
            sps,
            pps,
        );
        let new_picture = is_new_picture(self.prev_slice.as_ref(), &header, sps.poc_type);
        let frame_type = header.frame_type;
        self.prev_slice = Some(header);

        if new_picture && self.current.has_slice {
            self.output_access_unit();
        }
        if !self.current.has_slice {
            self.current.frame_type = frame_type;
            self.current.has_slice = true;
        }
        self.current.push(fragment);
    }

    fn handle_sps(&mut self, fragment: NalFragment) {
        let sps = parse_sps(&remove_emulation_prevention(fragment.payload()));
        debug!(
            "H264: SPS id={}, profile={}, level={}, {}x{}, poc_type={}",
            sps.sps_id, sps.profile_idc, sps.level_idc, sps.width, sps.height, sps.poc_type
        );
        if self.current.has_slice {
            self.output_access_unit();
        }
        self.cache.set_sps(fragment.data, sps);
    }

    fn handle_pps(&mut self, fragment: NalFragment) {
        let pps = parse_pps(&remove_emulation_prevention(fragment.payload()));
        debug!(
            "H264: PPS id={}, sps_id={}, cabac={}",
            pps.pps_id, pps.sps_id, pps.entropy_coding_mode
        );
        if self.current.has_slice {
            self.output_access_unit();
        }
        self.cache.set_pps(fragment.data, pps);
    }

    /// 结束当前访问单元并放入输出队列
    fn output_access_unit(&mut self) {
        let au = std::mem::take(&mut self.current);
        if au.is_empty() {
            return;
        }
        if !au.has_slice {
            debug!("H264: 丢弃不含切片的 {} 个 NAL", au.fragments.len());
            return;
        }
        let Some(header) = self.cache.header() else {
            warn!("H264: 缺少 SPS/PPS, 丢弃访问单元 ({} 字节)", au.size());
            return;
        };
        let is_keyframe = au.frame_type == FrameType::I;
        if !self.header_emitted && !is_keyframe {
            debug!(
                "H264: 首个关键帧之前的 {} 帧被丢弃 ({} 字节)",
                au.frame_type,
                au.size()
            );
            return;
        }

        let prefix_len = if is_keyframe { header.len() } else { 0 };
        let mut data = BytesMut::with_capacity(prefix_len + au.size());
        if is_keyframe {
            data.put_slice(&header);
            self.header_emitted = true;
        }
        for fragment in &au.fragments {
            data.put_slice(fragment);
        }

        trace!(
            "H264: 输出访问单元 type={}, nal={}, size={}, pts={}, dts={}",
            au.frame_type,
            au.fragments.len(),
            data.len(),
            au.pts,
            au.dts
        );
        self.output_queue.push_back(Packet {
            data: data.freeze(),
            pts: au.pts,
            dts: au.dts,
            duration: 0,
            time_base: self.time_base,
            is_keyframe,
            frame_type: au.frame_type,
            flags: PacketFlags::empty(),
        });
    }

    /// 流结束: 取出缓冲的尾部 NAL 并输出最后一个访问单元
    fn drain(&mut self) {
        if let Some(fragment) = self.annex_b.finish() {
            self.handle_fragment(fragment);
        }
        self.output_access_unit();
        self.prev_slice = None;
    }
}

impl Packetizer for H264Packetizer {
    fn name(&self) -> &str {
        "h264"
    }

    fn open(&mut self, params: &CodecParameters) -> ZhenResult<()> {
        self.reset_stream();
        self.output_queue.clear();
        self.flushing = false;
        self.format = params.format;
        self.time_base = params.time_base;

        match params.format {
            BitstreamFormat::Avcc => {
                let length_size = self.seed_from_avcc(&params.extra_data);
                self.avcc = Some(AvccReframer::new(length_size)?);
            }
            BitstreamFormat::AnnexB => {
                self.avcc = None;
                self.seed_from_annex_b(&params.extra_data);
            }
        }

        self.opened = true;
        debug!(
            "H264 打包器已打开: format={:?}, sps={}, pps={}",
            self.format,
            self.cache.sps().is_some(),
            self.cache.pps().is_some()
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> ZhenResult<()> {
        if !self.opened {
            return Err(ZhenError::InvalidData("H264 打包器未打开".into()));
        }
        if packet.is_empty() {
            self.flushing = true;
            self.drain();
            return Ok(());
        }
        self.flushing = false;

        if packet.flags.contains(PacketFlags::CORRUPTED) {
            debug!("H264: 输入包已损坏, 丢弃 {} 字节并重新同步", packet.size());
            self.reset_stream();
            return Ok(());
        }
        if packet.flags.contains(PacketFlags::DISCONTINUITY) {
            debug!("H264: 码流不连续, 重新同步");
            self.reset_stream();
        }

        let fragments = match (&self.format, &self.avcc) {
            (BitstreamFormat::Avcc, Some(avcc)) => avcc.split(&packet.data, packet.pts, packet.dts),
            _ => self.annex_b.push(&packet.data, packet.pts, packet.dts),
        };
        for fragment in fragments {
            self.handle_fragment(fragment);
        }
        Ok(())
    }

    fn receive_packet(&mut self) -> ZhenResult<Packet> {
        if let Some(packet) = self.output_queue.pop_front() {
            Ok(packet)
        } else if self.flushing {
            Err(ZhenError::Eof)
        } else {
            Err(ZhenError::NeedMoreData)
        }
    }

    fn flush(&mut self) {
        self.reset_stream();
        self.output_queue.clear();
        self.flushing = false;
    }
}
