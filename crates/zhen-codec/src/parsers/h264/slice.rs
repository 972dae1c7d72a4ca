//! H.264 slice header 字段提取与帧边界检测.
//!
//! 只解析判定"新图像的第一个 VCL NAL"(H.264 §7.4.1.2.4) 所需的前导字段,
//! 且只对 NAL 负载的前 [`SLICE_HEADER_PROBE_LEN`] 字节去除防竞争字节.

use log::trace;
use zhen_core::bitreader::BitReader;
use zhen_core::ZhenResult;

use super::nal::{NalUnitType, remove_emulation_prevention};
use super::pps::Pps;
use super::sps::Sps;
use crate::packet::FrameType;

/// slice header 解析时读取的负载前缀长度 (字节)
pub const SLICE_HEADER_PROBE_LEN: usize = 60;

/// slice header 字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    /// NAL 单元类型 (1-5)
    pub nal_type: NalUnitType,
    /// nal_ref_idc
    pub nal_ref_idc: u8,
    /// 由 slice_type 映射得到的帧类型
    pub frame_type: FrameType,
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// frame_num
    pub frame_num: u32,
    /// field_pic_flag
    pub field_pic: bool,
    /// bottom_field_flag (仅 field_pic 时存在)
    pub bottom_field: Option<bool>,
    /// idr_pic_id (仅 IDR 切片存在)
    pub idr_pic_id: Option<u32>,
    /// pic_order_cnt_lsb (仅 poc_type==0 存在)
    pub pic_order_cnt_lsb: Option<u32>,
    /// delta_pic_order_cnt_bottom (仅 poc_type==0 且 PPS 声明时存在)
    pub delta_pic_order_cnt_bottom: Option<i32>,
    /// delta_pic_order_cnt[0] (poc_type==1)
    pub delta_pic_order_cnt0: i32,
    /// delta_pic_order_cnt[1] (poc_type==1)
    pub delta_pic_order_cnt1: i32,
}

impl SliceHeader {
    fn new(nal_type: NalUnitType, nal_ref_idc: u8) -> Self {
        Self {
            nal_type,
            nal_ref_idc,
            frame_type: FrameType::Unclassified,
            pps_id: 0,
            frame_num: 0,
            field_pic: false,
            bottom_field: None,
            idr_pic_id: None,
            pic_order_cnt_lsb: None,
            delta_pic_order_cnt_bottom: None,
            delta_pic_order_cnt0: 0,
            delta_pic_order_cnt1: 0,
        }
    }
}

/// slice_type → 帧类型 (SP 归为 P, SI 归为 I)
pub fn frame_type_from_slice_type(slice_type: u32) -> FrameType {
    match slice_type {
        0 | 5 | 3 | 8 => FrameType::P,
        1 | 6 => FrameType::B,
        2 | 7 | 4 | 9 => FrameType::I,
        _ => FrameType::Unclassified,
    }
}

/// 解析 slice header
///
/// `payload` 为 NAL 头部之后的数据 (含防竞争字节).
/// 数据提前耗尽时返回已读取的字段, 其余保持默认值.
pub fn parse_slice_header(
    nal_type: NalUnitType,
    nal_ref_idc: u8,
    payload: &[u8],
    sps: &Sps,
    pps: &Pps,
) -> SliceHeader {
    let probe = &payload[..payload.len().min(SLICE_HEADER_PROBE_LEN)];
    let rbsp = remove_emulation_prevention(probe);
    let mut br = BitReader::new(&rbsp);
    let mut header = SliceHeader::new(nal_type, nal_ref_idc);
    if let Err(err) = read_slice_fields(&mut br, &mut header, sps, pps) {
        trace!("H264: slice header 字段提前结束, err={}", err);
    }
    header
}

fn read_slice_fields(
    br: &mut BitReader,
    header: &mut SliceHeader,
    sps: &Sps,
    pps: &Pps,
) -> ZhenResult<()> {
    let _first_mb_in_slice = br.read_ue()?;
    header.frame_type = frame_type_from_slice_type(br.read_ue()?);
    header.pps_id = br.read_ue()?;
    header.frame_num = br.read_bits(sps.log2_max_frame_num)?;

    if !sps.frame_mbs_only {
        header.field_pic = br.read_flag()?;
        if header.field_pic {
            header.bottom_field = Some(br.read_flag()?);
        }
    }

    if header.nal_type.is_idr() {
        header.idr_pic_id = Some(br.read_ue()?);
    }

    match sps.poc_type {
        0 => {
            header.pic_order_cnt_lsb = Some(br.read_bits(sps.log2_max_poc_lsb)?);
            if pps.pic_order_present && !header.field_pic {
                header.delta_pic_order_cnt_bottom = Some(br.read_se()?);
            }
        }
        1 if !sps.delta_pic_order_always_zero_flag => {
            header.delta_pic_order_cnt0 = br.read_se()?;
            if pps.pic_order_present && !header.field_pic {
                header.delta_pic_order_cnt1 = br.read_se()?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// 判定 `cur` 是否为新图像的第一个切片
///
/// 没有前一个切片时总是新图像.
pub fn is_new_picture(prev: Option<&SliceHeader>, cur: &SliceHeader, poc_type: u32) -> bool {
    let Some(prev) = prev else {
        return true;
    };

    if cur.frame_num != prev.frame_num
        || cur.pps_id != prev.pps_id
        || cur.field_pic != prev.field_pic
        || cur.nal_ref_idc != prev.nal_ref_idc
    {
        return true;
    }

    if matches!((cur.bottom_field, prev.bottom_field), (Some(a), Some(b)) if a != b) {
        return true;
    }

    match poc_type {
        0 if cur.pic_order_cnt_lsb != prev.pic_order_cnt_lsb
            || cur.delta_pic_order_cnt_bottom != prev.delta_pic_order_cnt_bottom =>
        {
            return true;
        }
        1 if cur.delta_pic_order_cnt0 != prev.delta_pic_order_cnt0
            || cur.delta_pic_order_cnt1 != prev.delta_pic_order_cnt1 =>
        {
            return true;
        }
        _ => {}
    }

    (cur.nal_type.is_idr() || prev.nal_type.is_idr())
        && (cur.nal_type != prev.nal_type || cur.idr_pic_id != prev.idr_pic_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h264::sps::tests::{bits_to_rbsp, write_bits, write_se, write_ue};

    fn baseline_sps() -> Sps {
        Sps {
            log2_max_frame_num: 4,
            poc_type: 0,
            log2_max_poc_lsb: 6,
            frame_mbs_only: true,
            ..Sps::default()
        }
    }

    fn header(frame_num: u32, pps_id: u32) -> SliceHeader {
        SliceHeader {
            frame_num,
            pps_id,
            pic_order_cnt_lsb: Some(frame_num * 2),
            ..SliceHeader::new(NalUnitType::Slice, 2)
        }
    }

    #[test]
    fn test_frame_type_mapping() {
        let expected = [
            FrameType::P,
            FrameType::B,
            FrameType::I,
            FrameType::P,
            FrameType::I,
        ];
        for (slice_type, want) in expected.iter().enumerate() {
            assert_eq!(frame_type_from_slice_type(slice_type as u32), *want);
            assert_eq!(frame_type_from_slice_type(slice_type as u32 + 5), *want);
        }
        assert_eq!(frame_type_from_slice_type(10), FrameType::Unclassified);
    }

    #[test]
    fn test_parse_idr_slice_header() {
        let mut bits = Vec::new();
        write_ue(&mut bits, 0); // first_mb_in_slice
        write_ue(&mut bits, 7); // slice_type = I
        write_ue(&mut bits, 0); // pps_id
        write_bits(&mut bits, 0, 4); // frame_num
        write_ue(&mut bits, 3); // idr_pic_id
        write_bits(&mut bits, 0, 6); // pic_order_cnt_lsb
        let payload = bits_to_rbsp(&bits);

        let hdr = parse_slice_header(
            NalUnitType::SliceIdr,
            3,
            &payload,
            &baseline_sps(),
            &Pps::default(),
        );
        assert_eq!(hdr.frame_type, FrameType::I);
        assert_eq!(hdr.idr_pic_id, Some(3));
        assert_eq!(hdr.pic_order_cnt_lsb, Some(0));
        assert_eq!(hdr.delta_pic_order_cnt_bottom, None);
        assert_eq!(hdr.bottom_field, None);
    }

    #[test]
    fn test_parse_field_slice_with_poc_bottom() {
        let sps = Sps {
            frame_mbs_only: false,
            ..baseline_sps()
        };
        let pps = Pps {
            pic_order_present: true,
            ..Pps::default()
        };

        // 场切片: field_pic=1, bottom=1, 不读 delta_pic_order_cnt_bottom
        let mut bits = Vec::new();
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 5); // P
        write_ue(&mut bits, 1);
        write_bits(&mut bits, 9, 4);
        bits.push(true);
        bits.push(true);
        write_bits(&mut bits, 18, 6);
        let hdr = parse_slice_header(NalUnitType::Slice, 2, &bits_to_rbsp(&bits), &sps, &pps);
        assert_eq!(hdr.frame_type, FrameType::P);
        assert_eq!(hdr.pps_id, 1);
        assert_eq!(hdr.frame_num, 9);
        assert!(hdr.field_pic);
        assert_eq!(hdr.bottom_field, Some(true));
        assert_eq!(hdr.pic_order_cnt_lsb, Some(18));
        assert_eq!(hdr.delta_pic_order_cnt_bottom, None);

        // 帧切片: 读取 delta_pic_order_cnt_bottom
        let mut bits = Vec::new();
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 1); // B
        write_ue(&mut bits, 0);
        write_bits(&mut bits, 2, 4);
        bits.push(false);
        write_bits(&mut bits, 4, 6);
        write_se(&mut bits, -3);
        let hdr = parse_slice_header(NalUnitType::Slice, 0, &bits_to_rbsp(&bits), &sps, &pps);
        assert_eq!(hdr.frame_type, FrameType::B);
        assert!(!hdr.field_pic);
        assert_eq!(hdr.delta_pic_order_cnt_bottom, Some(-3));
    }

    #[test]
    fn test_parse_poc_type1_deltas() {
        let sps = Sps {
            poc_type: 1,
            ..baseline_sps()
        };
        let pps = Pps {
            pic_order_present: true,
            ..Pps::default()
        };
        let mut bits = Vec::new();
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 0);
        write_bits(&mut bits, 1, 4);
        write_se(&mut bits, 2);
        write_se(&mut bits, -1);
        let hdr = parse_slice_header(NalUnitType::Slice, 2, &bits_to_rbsp(&bits), &sps, &pps);
        assert_eq!(hdr.delta_pic_order_cnt0, 2);
        assert_eq!(hdr.delta_pic_order_cnt1, -1);
        assert_eq!(hdr.pic_order_cnt_lsb, None);
    }

    #[test]
    fn test_parse_truncated_slice_keeps_prefix_fields() {
        // 只有 first_mb / slice_type / pps_id, frame_num 之前数据耗尽
        let mut bits = Vec::new();
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 2);
        write_ue(&mut bits, 1);
        let payload = bits_to_rbsp(&bits);
        assert_eq!(payload.len(), 1);
        let hdr = parse_slice_header(
            NalUnitType::Slice,
            1,
            &payload,
            &baseline_sps(),
            &Pps::default(),
        );
        assert_eq!(hdr.frame_type, FrameType::I);
        assert_eq!(hdr.pps_id, 1);
        assert_eq!(hdr.frame_num, 0);
        assert_eq!(hdr.pic_order_cnt_lsb, None);
    }

    #[test]
    fn test_parse_reads_only_probe_prefix() {
        // 前缀之外的数据不影响结果
        let mut bits = Vec::new();
        write_ue(&mut bits, 0);
        write_ue(&mut bits, 2);
        write_ue(&mut bits, 0);
        write_bits(&mut bits, 5, 4);
        write_bits(&mut bits, 10, 6);
        let mut payload = bits_to_rbsp(&bits);
        payload.resize(SLICE_HEADER_PROBE_LEN * 4, 0xAB);
        let hdr = parse_slice_header(
            NalUnitType::Slice,
            2,
            &payload,
            &baseline_sps(),
            &Pps::default(),
        );
        assert_eq!(hdr.frame_num, 5);
        assert_eq!(hdr.pic_order_cnt_lsb, Some(10));
    }

    #[test]
    fn test_new_picture_without_previous() {
        assert!(is_new_picture(None, &header(0, 0), 0));
    }

    #[test]
    fn test_identical_headers_never_boundary() {
        let a = header(3, 0);
        assert!(!is_new_picture(Some(&a), &a.clone(), 0));
        assert!(!is_new_picture(Some(&a), &a.clone(), 1));
        assert!(!is_new_picture(Some(&a), &a.clone(), 2));
    }

    #[test]
    fn test_boundary_on_pps_id_only() {
        let a = header(3, 0);
        let b = header(3, 1);
        assert!(is_new_picture(Some(&a), &b, 0));
    }

    #[test]
    fn test_boundary_conditions() {
        let base = header(3, 0);

        let mut cur = base.clone();
        cur.frame_num = 4;
        assert!(is_new_picture(Some(&base), &cur, 2));

        let mut cur = base.clone();
        cur.nal_ref_idc = 0;
        assert!(is_new_picture(Some(&base), &cur, 2));

        let mut cur = base.clone();
        cur.field_pic = true;
        assert!(is_new_picture(Some(&base), &cur, 2));

        // bottom_field 只有两侧都存在时才比较
        let mut prev = base.clone();
        prev.bottom_field = Some(false);
        let mut cur = base.clone();
        cur.bottom_field = Some(true);
        assert!(is_new_picture(Some(&prev), &cur, 2));
        cur.bottom_field = None;
        assert!(!is_new_picture(Some(&prev), &cur, 2));

        // poc_type 0 比较 lsb 与 delta_bottom, poc_type 2 不比较
        let mut cur = base.clone();
        cur.pic_order_cnt_lsb = Some(99);
        assert!(is_new_picture(Some(&base), &cur, 0));
        assert!(!is_new_picture(Some(&base), &cur, 2));
        let mut cur = base.clone();
        cur.delta_pic_order_cnt_bottom = Some(1);
        assert!(is_new_picture(Some(&base), &cur, 0));

        // poc_type 1 比较 delta0 / delta1
        let mut cur = base.clone();
        cur.delta_pic_order_cnt1 = 7;
        assert!(is_new_picture(Some(&base), &cur, 1));
        assert!(!is_new_picture(Some(&base), &cur, 0));
    }

    #[test]
    fn test_boundary_on_idr_changes() {
        let mut idr_a = header(0, 0);
        idr_a.nal_type = NalUnitType::SliceIdr;
        idr_a.idr_pic_id = Some(0);
        let mut idr_b = idr_a.clone();
        idr_b.idr_pic_id = Some(1);
        assert!(is_new_picture(Some(&idr_a), &idr_b, 0));
        assert!(!is_new_picture(Some(&idr_a), &idr_a.clone(), 0));

        // IDR 之后同 frame_num 的非 IDR 切片
        let non_idr = header(0, 0);
        assert!(is_new_picture(Some(&idr_a), &non_idr, 0));
    }
}
