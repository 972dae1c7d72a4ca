//! H.264 PPS (Picture Parameter Set) 字段提取.
//!
//! 只读取到 `bottom_field_pic_order_in_frame_present_flag` 为止,
//! 这是 slice header 中 `delta_pic_order_cnt_bottom` 是否存在的依据.

use log::debug;
use zhen_core::bitreader::BitReader;
use zhen_core::ZhenResult;

/// PPS 字段提取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 熵编码模式 (false=CAVLC, true=CABAC)
    pub entropy_coding_mode: bool,
    /// bottom_field_pic_order_in_frame_present_flag
    pub pic_order_present: bool,
    /// 数据在所有字段读完之前耗尽
    pub truncated: bool,
}

/// 从 RBSP 数据提取 PPS 字段
pub fn parse_pps(rbsp: &[u8]) -> Pps {
    let mut pps = Pps::default();
    let mut br = BitReader::new(rbsp);
    if let Err(err) = read_pps_fields(&mut br, &mut pps) {
        debug!("H264: PPS 字段提前结束, err={}", err);
        pps.truncated = true;
    }
    pps
}

fn read_pps_fields(br: &mut BitReader, pps: &mut Pps) -> ZhenResult<()> {
    pps.pps_id = br.read_ue()?;
    pps.sps_id = br.read_ue()?;
    pps.entropy_coding_mode = br.read_flag()?;
    pps.pic_order_present = br.read_flag()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pps_fields() {
        // pps_id=1 (010), sps_id=0 (1), entropy=1, pic_order_present=1, stop=1
        let rbsp = [0b0101_1111];
        let pps = parse_pps(&rbsp);
        assert_eq!(pps.pps_id, 1);
        assert_eq!(pps.sps_id, 0);
        assert!(pps.entropy_coding_mode);
        assert!(pps.pic_order_present);
        assert!(!pps.truncated);
    }

    #[test]
    fn test_pps_truncated_defaults_remaining() {
        // pps_id=0, sps_id=0, 随后数据耗尽
        let rbsp = [0b1100_0000];
        let pps = parse_pps(&rbsp[..0]);
        assert!(pps.truncated);
        assert_eq!(pps, Pps { truncated: true, ..Pps::default() });

        // 8 位只够读 pps_id / sps_id / 两个标志
        let pps = parse_pps(&rbsp);
        assert!(!pps.truncated);
        assert!(!pps.pic_order_present);
    }
}
