//! H.264 SPS (Sequence Parameter Set) 字段提取.
//!
//! 打包器只关心帧边界检测与输出参数所需的字段:
//! - `log2_max_frame_num`, `pic_order_cnt_type` 及其附属字段 (slice header 解析)
//! - 宏块对齐的宽高与 VUI 中的采样宽高比 (输出流参数)
//!
//! 字段提取是宽松的: 数据提前耗尽时, 已读取的字段保留,
//! 其余字段保持默认值, 调用方照常使用结果.

use log::debug;
use zhen_core::bitreader::BitReader;
use zhen_core::{Rational, ZhenResult};

/// `log2_max_frame_num_minus4` / `log2_max_pic_order_cnt_lsb_minus4` 上限
const MAX_LOG2_MINUS4: u32 = 12;

/// `num_ref_frames_in_pic_order_cnt_cycle` 上限
const MAX_POC_CYCLE: u32 = 256;

/// aspect_ratio_idc 中表示 Extended_SAR 的取值
const EXTENDED_SAR: u32 = 255;

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1)
const SAR_TABLE: [(u32, u32); 17] = [
    (0, 1),    // 0: 未指定
    (1, 1),    // 1: 1:1
    (12, 11),  // 2: 12:11
    (10, 11),  // 3: 10:11
    (16, 11),  // 4: 16:11
    (40, 33),  // 5: 40:33
    (24, 11),  // 6: 24:11
    (20, 11),  // 7: 20:11
    (32, 11),  // 8: 32:11
    (80, 33),  // 9: 80:33
    (18, 11),  // 10: 18:11
    (15, 11),  // 11: 15:11
    (64, 33),  // 12: 64:33
    (160, 99), // 13: 160:99
    (4, 3),    // 14: 4:3
    (3, 2),    // 15: 3:2
    (2, 1),    // 16: 2:1
];

/// SPS 字段提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// log2(max_frame_num) = log2_max_frame_num_minus4 + 4
    pub log2_max_frame_num: u32,
    /// 图像顺序计数类型 (0, 1, 2)
    pub poc_type: u32,
    /// log2(max_pic_order_cnt_lsb) (仅 poc_type==0)
    pub log2_max_poc_lsb: u32,
    /// delta_pic_order_always_zero_flag (仅 poc_type==1)
    pub delta_pic_order_always_zero_flag: bool,
    /// 最大参考帧数
    pub max_num_ref_frames: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// 宽度 (像素) = 16 × (pic_width_in_mbs_minus1 + 1)
    pub width: u32,
    /// 高度 (像素) = 16 × (pic_height_in_map_units_minus1 + 1)
    pub height: u32,
    /// cropping 偏移 (左, 右, 上, 下), 以色度采样单位计
    pub crop: [u32; 4],
    /// 采样宽高比, VUI 未声明或未指定时为 `None`
    pub sar: Option<Rational>,
    /// 数据在所有字段读完之前耗尽
    pub truncated: bool,
}

impl Default for Sps {
    fn default() -> Self {
        Self {
            profile_idc: 0,
            constraint_set_flags: 0,
            level_idc: 0,
            sps_id: 0,
            chroma_format_idc: 1,
            bit_depth_luma: 8,
            bit_depth_chroma: 8,
            log2_max_frame_num: 4,
            poc_type: 0,
            log2_max_poc_lsb: 4,
            delta_pic_order_always_zero_flag: false,
            max_num_ref_frames: 0,
            frame_mbs_only: false,
            width: 0,
            height: 0,
            crop: [0; 4],
            sar: None,
            truncated: false,
        }
    }
}

impl Sps {
    /// 显示宽高比 DAR = (sar_w × width) : (sar_h × height)
    pub fn display_aspect_ratio(&self) -> Option<Rational> {
        let sar = self.sar?;
        let num = u64::try_from(sar.num).ok()? * u64::from(self.width);
        let den = u64::try_from(sar.den).ok()? * u64::from(self.height);
        Rational::from_u64_reduced(num, den)
    }
}

/// 从 RBSP 数据 (已去除 NAL 头部与防竞争字节) 提取 SPS 字段
pub fn parse_sps(rbsp: &[u8]) -> Sps {
    let mut sps = Sps::default();
    let mut br = BitReader::new(rbsp);
    if let Err(err) = read_sps_fields(&mut br, &mut sps) {
        debug!(
            "H264: SPS 字段提前结束, bits_read={}, err={}",
            br.bits_read(),
            err
        );
        sps.truncated = true;
    }
    sps
}

fn read_sps_fields(br: &mut BitReader, sps: &mut Sps) -> ZhenResult<()> {
    sps.profile_idc = br.read_bits(8)? as u8;
    sps.constraint_set_flags = br.read_bits(8)? as u8;
    sps.level_idc = br.read_bits(8)? as u8;
    sps.sps_id = br.read_ue()?;

    // High profile 及以上有额外字段
    if is_high_profile(sps.profile_idc) {
        sps.chroma_format_idc = br.read_ue()?;
        if sps.chroma_format_idc == 3 {
            br.skip_bits(1)?; // separate_colour_plane_flag
        }
        sps.bit_depth_luma = br.read_ue()?.saturating_add(8);
        sps.bit_depth_chroma = br.read_ue()?.saturating_add(8);
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if br.read_flag()? {
            let list_count = if sps.chroma_format_idc != 3 { 8 } else { 12 };
            for list_idx in 0..list_count {
                if br.read_flag()? {
                    skip_scaling_list(br, if list_idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    sps.log2_max_frame_num = br.read_ue()?.min(MAX_LOG2_MINUS4) + 4;

    sps.poc_type = br.read_ue()?;
    match sps.poc_type {
        0 => {
            sps.log2_max_poc_lsb = br.read_ue()?.min(MAX_LOG2_MINUS4) + 4;
        }
        1 => {
            sps.delta_pic_order_always_zero_flag = br.read_flag()?;
            let _offset_for_non_ref_pic = br.read_se()?;
            let _offset_for_top_to_bottom_field = br.read_se()?;
            let cycle = br.read_ue()?.min(MAX_POC_CYCLE);
            for _ in 0..cycle {
                let _offset_for_ref_frame = br.read_se()?;
            }
        }
        _ => {}
    }

    sps.max_num_ref_frames = br.read_ue()?;
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    sps.width = macroblocks_to_pixels(br.read_ue()?);
    sps.height = macroblocks_to_pixels(br.read_ue()?);

    sps.frame_mbs_only = br.read_flag()?;
    if !sps.frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1)?; // direct_8x8_inference_flag

    if br.read_flag()? {
        for slot in sps.crop.iter_mut() {
            *slot = br.read_ue()?;
        }
    }

    if br.read_flag()? {
        sps.sar = read_vui_aspect_ratio(br)?;
    }

    Ok(())
}

/// 读取 VUI 中的 aspect_ratio_info
fn read_vui_aspect_ratio(br: &mut BitReader) -> ZhenResult<Option<Rational>> {
    if !br.read_flag()? {
        return Ok(None);
    }
    let idc = br.read_bits(8)?;
    let (w, h) = if idc == EXTENDED_SAR {
        let w = br.read_bits(16)?;
        let h = br.read_bits(16)?;
        (w, h)
    } else if let Some(&entry) = SAR_TABLE.get(idc as usize) {
        entry
    } else {
        debug!("H264: 保留的 aspect_ratio_idc={}, 忽略 SAR", idc);
        return Ok(None);
    };
    if w == 0 || h == 0 {
        return Ok(None);
    }
    Ok(Some(Rational::new(w as i32, h as i32)))
}

/// 跳过一个 scaling_list (只消耗比特, 不保留矩阵)
fn skip_scaling_list(br: &mut BitReader, size: usize) -> ZhenResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = br.read_se()?;
            next_scale = (last_scale + delta_scale).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 是否为 High Profile 或更高 (SPS 含 chroma_format_idc 等附加字段)
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// 宏块数 (minus1) 换算为像素
fn macroblocks_to_pixels(minus1: u32) -> u32 {
    minus1.saturating_add(1).saturating_mul(16)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // ============================================================
    // 测试辅助: 构造 SPS RBSP 数据
    // ============================================================

    /// 写入定长无符号值
    pub(crate) fn write_bits(bits: &mut Vec<bool>, val: u32, n: u32) {
        for i in (0..n).rev() {
            bits.push(((val >> i) & 1) != 0);
        }
    }

    /// 写入 ue(v)
    pub(crate) fn write_ue(bits: &mut Vec<bool>, val: u32) {
        if val == 0 {
            bits.push(true);
            return;
        }
        let code = val + 1;
        let num_bits = 32 - code.leading_zeros();
        for _ in 0..num_bits - 1 {
            bits.push(false);
        }
        for i in (0..num_bits).rev() {
            bits.push(((code >> i) & 1) != 0);
        }
    }

    /// 写入 se(v)
    pub(crate) fn write_se(bits: &mut Vec<bool>, val: i32) {
        let code_num = if val <= 0 {
            (-2 * val) as u32
        } else {
            (2 * val - 1) as u32
        };
        write_ue(bits, code_num);
    }

    /// 将 bit 向量转为字节 (末尾补 rbsp_stop_one_bit)
    pub(crate) fn bits_to_rbsp(bits: &[bool]) -> Vec<u8> {
        let mut bits = bits.to_vec();
        bits.push(true);
        let mut bytes = Vec::new();
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit {
                    byte |= 1 << (7 - i);
                }
            }
            bytes.push(byte);
        }
        bytes
    }

    /// 构造测试用 SPS RBSP
    ///
    /// `aspect`: `None` 表示不带 VUI, `Some((idc, w, h))` 写入 aspect_ratio_info.
    pub(crate) fn build_sps_rbsp(
        profile: u8,
        mbs: (u32, u32),
        poc_type: u32,
        frame_mbs_only: bool,
        aspect: Option<(u32, u32, u32)>,
    ) -> Vec<u8> {
        let mut bits = Vec::new();
        write_bits(&mut bits, u32::from(profile), 8);
        write_bits(&mut bits, 0, 8); // constraint_set_flags
        write_bits(&mut bits, 30, 8); // level_idc
        write_ue(&mut bits, 0); // sps_id

        if is_high_profile(profile) {
            write_ue(&mut bits, 1); // chroma_format_idc
            write_ue(&mut bits, 0); // bit_depth_luma_minus8
            write_ue(&mut bits, 0); // bit_depth_chroma_minus8
            bits.push(false); // qpprime_y_zero_transform_bypass_flag
            bits.push(false); // seq_scaling_matrix_present_flag
        }

        write_ue(&mut bits, 0); // log2_max_frame_num_minus4
        write_ue(&mut bits, poc_type);
        match poc_type {
            0 => write_ue(&mut bits, 2), // log2_max_pic_order_cnt_lsb_minus4
            1 => {
                bits.push(false); // delta_pic_order_always_zero_flag
                write_se(&mut bits, 0);
                write_se(&mut bits, 0);
                write_ue(&mut bits, 2);
                write_se(&mut bits, 1);
                write_se(&mut bits, -1);
            }
            _ => {}
        }
        write_ue(&mut bits, 1); // max_num_ref_frames
        bits.push(false); // gaps_in_frame_num_value_allowed_flag
        write_ue(&mut bits, mbs.0 - 1);
        write_ue(&mut bits, mbs.1 - 1);
        bits.push(frame_mbs_only);
        if !frame_mbs_only {
            bits.push(false); // mb_adaptive_frame_field_flag
        }
        bits.push(true); // direct_8x8_inference_flag
        bits.push(false); // frame_cropping_flag

        match aspect {
            None => bits.push(false),
            Some((idc, w, h)) => {
                bits.push(true); // vui_parameters_present_flag
                bits.push(true); // aspect_ratio_info_present_flag
                write_bits(&mut bits, idc, 8);
                if idc == EXTENDED_SAR {
                    write_bits(&mut bits, w, 16);
                    write_bits(&mut bits, h, 16);
                }
                // 其余 VUI 字段: 全部不存在
                for _ in 0..5 {
                    bits.push(false);
                }
            }
        }

        bits_to_rbsp(&bits)
    }

    #[test]
    fn test_sps_baseline_profile() {
        let rbsp = build_sps_rbsp(66, (20, 15), 0, true, None);
        let sps = parse_sps(&rbsp);
        assert!(!sps.truncated);
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.width, 320);
        assert_eq!(sps.height, 240);
        assert_eq!(sps.log2_max_frame_num, 4);
        assert_eq!(sps.poc_type, 0);
        assert_eq!(sps.log2_max_poc_lsb, 6);
        assert!(sps.frame_mbs_only);
        assert_eq!(sps.sar, None);
        assert_eq!(sps.display_aspect_ratio(), None);
    }

    #[test]
    fn test_sps_high_profile_fields_skipped_correctly() {
        let rbsp = build_sps_rbsp(100, (120, 68), 2, true, None);
        let sps = parse_sps(&rbsp);
        assert!(!sps.truncated);
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.bit_depth_luma, 8);
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1088);
    }

    #[test]
    fn test_sps_poc_type1_fields() {
        let rbsp = build_sps_rbsp(77, (11, 9), 1, false, None);
        let sps = parse_sps(&rbsp);
        assert!(!sps.truncated);
        assert_eq!(sps.poc_type, 1);
        assert!(!sps.delta_pic_order_always_zero_flag);
        assert!(!sps.frame_mbs_only);
        assert_eq!(sps.width, 176);
        assert_eq!(sps.height, 144);
    }

    #[test]
    fn test_sps_sar_from_table() {
        // idc=2 → 12:11, 720x576 → DAR = 8640:6336 = 15:11
        let rbsp = build_sps_rbsp(66, (45, 36), 0, true, Some((2, 0, 0)));
        let sps = parse_sps(&rbsp);
        assert_eq!(sps.sar, Some(Rational::new(12, 11)));
        assert_eq!(sps.display_aspect_ratio(), Some(Rational::new(15, 11)));
    }

    #[test]
    fn test_sps_sar_extended() {
        let rbsp = build_sps_rbsp(66, (45, 36), 0, true, Some((EXTENDED_SAR, 64, 45)));
        let sps = parse_sps(&rbsp);
        assert_eq!(sps.sar, Some(Rational::new(64, 45)));
        // 64×720 : 45×576 = 16:9
        assert_eq!(sps.display_aspect_ratio(), Some(Rational::new(16, 9)));
    }

    #[test]
    fn test_sps_sar_table_tail_entries_read_no_extra_bits() {
        // idc 14..=16 查表, 不读取 16 位宽高
        for (idc, sar) in [
            (14, Rational::new(4, 3)),
            (15, Rational::new(3, 2)),
            (16, Rational::new(2, 1)),
        ] {
            let rbsp = build_sps_rbsp(66, (20, 15), 0, true, Some((idc, 0, 0)));
            let sps = parse_sps(&rbsp);
            assert!(!sps.truncated, "idc={idc} 不应截断");
            assert_eq!(sps.sar, Some(sar), "idc={idc}");
        }
        // 320x240, SAR 4:3 → DAR 16:9
        let rbsp = build_sps_rbsp(66, (20, 15), 0, true, Some((14, 0, 0)));
        assert_eq!(
            parse_sps(&rbsp).display_aspect_ratio(),
            Some(Rational::new(16, 9))
        );
    }

    #[test]
    fn test_sps_sar_unspecified_and_reserved() {
        let rbsp = build_sps_rbsp(66, (20, 15), 0, true, Some((0, 0, 0)));
        assert_eq!(parse_sps(&rbsp).sar, None);
        let rbsp = build_sps_rbsp(66, (20, 15), 0, true, Some((100, 0, 0)));
        assert_eq!(parse_sps(&rbsp).sar, None);
    }

    #[test]
    fn test_sps_clamps_log2_fields() {
        let mut bits = Vec::new();
        write_bits(&mut bits, 66, 8);
        write_bits(&mut bits, 0, 8);
        write_bits(&mut bits, 30, 8);
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 40); // log2_max_frame_num_minus4 超出上限
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 99); // log2_max_pic_order_cnt_lsb_minus4 超出上限
        let sps = parse_sps(&bits_to_rbsp(&bits));
        assert_eq!(sps.log2_max_frame_num, 16);
        assert_eq!(sps.log2_max_poc_lsb, 16);
        assert!(sps.truncated);
    }

    #[test]
    fn test_sps_truncated_keeps_read_fields() {
        let rbsp = build_sps_rbsp(66, (20, 15), 0, true, None);
        // 只保留 profile / constraint / level / sps_id 及少量比特
        let sps = parse_sps(&rbsp[..4]);
        assert!(sps.truncated);
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.width, 0);
        assert_eq!(sps.height, 0);

        let empty = parse_sps(&[]);
        assert!(empty.truncated);
        assert_eq!(empty, Sps { truncated: true, ..Sps::default() });
    }
}
