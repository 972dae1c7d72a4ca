//! H.264/AVC 码流解析.
//!
//! 提供打包器所需的底层能力:
//! - NAL 单元类型识别与防竞争字节去除
//! - Annex B / AVCC 重新分帧
//! - SPS / PPS / slice header 字段提取
//! - 帧边界 (新图像第一个切片) 判定

pub mod nal;
pub mod pps;
pub mod reframe;
pub mod slice;
pub mod sps;

pub use nal::{
    AvccConfig, NalFragment, NalUnitType, START_CODE, build_avcc_config, parse_avcc_config,
    remove_emulation_prevention,
};
pub use pps::{Pps, parse_pps};
pub use reframe::{AnnexBReframer, AvccReframer};
pub use slice::{SLICE_HEADER_PROBE_LEN, SliceHeader, is_new_picture, parse_slice_header};
pub use sps::{Sps, parse_sps};
