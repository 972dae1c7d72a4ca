//! H.264 NAL (Network Abstraction Layer) 单元.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 打包器内部统一使用 4 字节起始码 `00 00 00 01` 作为 NAL 前缀,
//! 无论输入是 Annex B 还是 AVCC.
//!
//! # AVCDecoderConfigurationRecord
//! ```text
//! version(8) profile(8) compat(8) level(8)
//! reserved(6) lengthSizeMinusOne(2)
//! reserved(3) numOfSPS(5)  { length(16) sps }*
//! numOfPPS(8)              { length(16) pps }*
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use zhen_core::{ZhenError, ZhenResult};

/// 规范化后的 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// avcC 中 numOfSequenceParameterSets 只有 5 位
const MAX_AVCC_SPS_COUNT: usize = 31;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 前缀 NAL (SVC)
    Prefix,
    /// 子集 SPS (SVC/MVC)
    SubsetSps,
    /// 保留类型 16-18
    Reserved(u8),
    /// 其他类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            14 => Self::Prefix,
            15 => Self::SubsetSps,
            16..=18 => Self::Reserved(type_id),
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Prefix => 14,
            Self::SubsetSps => 15,
            Self::Reserved(id) | Self::Unknown(id) => *id,
        }
    }

    /// 是否为切片 (类型 1-5)
    pub fn is_slice(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为 IDR 切片
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 是否开启新的访问单元 (AUD、SEI 以及类型 13-18)
    ///
    /// 这类 NAL 只能出现在一帧的第一个 VCL NAL 之前.
    pub fn starts_access_unit(&self) -> bool {
        matches!(
            self,
            Self::Sei
                | Self::Aud
                | Self::SpsExtension
                | Self::Prefix
                | Self::SubsetSps
                | Self::Reserved(_)
        )
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Prefix => write!(f, "Prefix"),
            Self::SubsetSps => write!(f, "SubsetSPS"),
            Self::Reserved(id) => write!(f, "Reserved({id})"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 一个完整的 NAL 片段
///
/// 数据以 4 字节起始码开头, 负载仍包含防竞争字节.
/// 时间戳取自该 NAL 起始码所在的输入包.
#[derive(Debug, Clone)]
pub struct NalFragment {
    /// `00 00 00 01` + NAL 头部 + 负载
    pub data: Bytes,
    /// 显示时间戳
    pub pts: i64,
    /// 解码时间戳
    pub dts: i64,
}

impl NalFragment {
    /// 由不含起始码的 NAL 数据构造片段
    pub fn from_nal(nal: &[u8], pts: i64, dts: i64) -> Self {
        let mut buf = BytesMut::with_capacity(START_CODE.len() + nal.len());
        buf.put_slice(&START_CODE);
        buf.put_slice(nal);
        Self {
            data: buf.freeze(),
            pts,
            dts,
        }
    }

    /// NAL 头部字节 (起始码之后的第一个字节)
    fn header(&self) -> u8 {
        self.data.get(START_CODE.len()).copied().unwrap_or(0)
    }

    /// NAL 单元类型
    pub fn nal_type(&self) -> NalUnitType {
        NalUnitType::from_type_id(self.header() & 0x1F)
    }

    /// nal_ref_idc (参考重要性, 0-3)
    pub fn ref_idc(&self) -> u8 {
        (self.header() >> 5) & 0x03
    }

    /// NAL 头部之后的负载 (含防竞争字节)
    pub fn payload(&self) -> &[u8] {
        self.data.get(START_CODE.len() + 1..).unwrap_or(&[])
    }

    /// 片段是否至少包含 NAL 头部
    pub fn has_header(&self) -> bool {
        self.data.len() > START_CODE.len()
    }
}

/// 移除 emulation prevention 字节 (`00 00 03` → `00 00`)
///
/// H.264 在 RBSP 中出现连续两个 0x00 后会插入 0x03, 防止与起始码混淆.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let is_emulation_prevention =
            i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03;
        if is_emulation_prevention {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3;
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}

/// avcC 配置解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvccConfig {
    /// profile_idc
    pub profile_idc: u8,
    /// level_idc
    pub level_idc: u8,
    /// NAL 长度前缀大小 (字节, 1-4)
    pub length_size: usize,
    /// SPS 列表 (不含起始码)
    pub sps_list: Vec<Vec<u8>>,
    /// PPS 列表 (不含起始码)
    pub pps_list: Vec<Vec<u8>>,
}

/// 解析 AVCDecoderConfigurationRecord (MP4 avcC box 内容)
///
/// 任一长度字段越界或为 0 时整体拒绝.
pub fn parse_avcc_config(data: &[u8]) -> ZhenResult<AvccConfig> {
    if data.len() < 7 {
        return Err(ZhenError::InvalidData("H264: avcC 数据太短".into()));
    }

    let profile_idc = data[1];
    let level_idc = data[3];
    let length_size = ((data[4] & 0x03) + 1) as usize;

    let num_sps = (data[5] & 0x1F) as usize;
    let mut pos = 6;
    let sps_list = read_parameter_sets(data, &mut pos, num_sps, "SPS")?;

    if pos >= data.len() {
        return Err(ZhenError::InvalidData(
            "H264: avcC 缺少 numOfPictureParameterSets 字段".into(),
        ));
    }
    let num_pps = data[pos] as usize;
    pos += 1;
    let pps_list = read_parameter_sets(data, &mut pos, num_pps, "PPS")?;

    Ok(AvccConfig {
        profile_idc,
        level_idc,
        length_size,
        sps_list,
        pps_list,
    })
}

/// 读取 `count` 个 `{u16 BE 长度, 数据}` 条目
fn read_parameter_sets(
    data: &[u8],
    pos: &mut usize,
    count: usize,
    kind: &str,
) -> ZhenResult<Vec<Vec<u8>>> {
    let mut list = Vec::with_capacity(count);
    for i in 0..count {
        if *pos + 2 > data.len() {
            return Err(ZhenError::InvalidData(format!(
                "H264: avcC {kind} 长度字段截断, index={i}"
            )));
        }
        let len = (usize::from(data[*pos]) << 8) | usize::from(data[*pos + 1]);
        *pos += 2;
        if len == 0 {
            return Err(ZhenError::InvalidData(format!(
                "H264: avcC {kind} 长度非法, index={i}, len=0"
            )));
        }
        if *pos + len > data.len() {
            return Err(ZhenError::InvalidData(format!(
                "H264: avcC {kind} 数据截断, index={}, declared_len={}, remain={}",
                i,
                len,
                data.len().saturating_sub(*pos)
            )));
        }
        list.push(data[*pos..*pos + len].to_vec());
        *pos += len;
    }
    Ok(list)
}

/// 构建 AVCDecoderConfigurationRecord
///
/// SPS / PPS 均不含起始码.
pub fn build_avcc_config(
    sps_list: &[&[u8]],
    pps_list: &[&[u8]],
    length_size: usize,
) -> ZhenResult<Vec<u8>> {
    if !(1..=4).contains(&length_size) {
        return Err(ZhenError::InvalidArgument(format!(
            "H264: NAL 长度前缀大小非法, length_size={length_size}"
        )));
    }
    let Some(sps0) = sps_list.first() else {
        return Err(ZhenError::InvalidData(
            "H264: 构建 avcC 需要至少一个 SPS".into(),
        ));
    };
    if sps0.len() < 4 {
        return Err(ZhenError::InvalidData("H264: SPS 数据太短".into()));
    }
    if sps_list.len() > MAX_AVCC_SPS_COUNT {
        return Err(ZhenError::InvalidData(format!(
            "H264: avcC 最多容纳 {MAX_AVCC_SPS_COUNT} 个 SPS, 实际 {}",
            sps_list.len()
        )));
    }
    let num_pps = u8::try_from(pps_list.len()).map_err(|_| {
        ZhenError::InvalidData(format!(
            "H264: avcC 最多容纳 255 个 PPS, 实际 {}",
            pps_list.len()
        ))
    })?;

    let mut out = vec![
        1,                                // configurationVersion
        sps0[1],                          // profile_idc
        sps0[2],                          // profile_compatibility
        sps0[3],                          // level_idc
        0xFC | ((length_size as u8) - 1), // lengthSizeMinusOne
        0xE0 | (sps_list.len() as u8),    // numOfSPS
    ];
    for sps in sps_list {
        write_parameter_set(&mut out, sps, "SPS")?;
    }

    out.push(num_pps);
    for pps in pps_list {
        write_parameter_set(&mut out, pps, "PPS")?;
    }

    Ok(out)
}

/// 写入 16 位长度前缀与参数集数据
fn write_parameter_set(out: &mut Vec<u8>, nal: &[u8], kind: &str) -> ZhenResult<()> {
    let len = u16::try_from(nal.len()).map_err(|_| {
        ZhenError::InvalidData(format!(
            "H264: {kind} 长度超出 avcC 16 位字段, len={}",
            nal.len()
        ))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(nal);
    Ok(())
}
