//! SPS / PPS 缓存.
//!
//! 各保存一份最近解析的参数集: 原始字节 (4 字节起始码格式) 与提取出的字段.
//! 新参数集直接替换旧参数集.

use bytes::{BufMut, Bytes, BytesMut};

use crate::parsers::h264::nal::START_CODE;
use crate::parsers::h264::{Pps, Sps};

/// 参数集缓存
#[derive(Debug, Default, Clone)]
pub struct ParameterSetCache {
    sps: Option<(Bytes, Sps)>,
    pps: Option<(Bytes, Pps)>,
}

impl ParameterSetCache {
    /// 替换缓存的 SPS
    pub fn set_sps(&mut self, raw: Bytes, sps: Sps) {
        self.sps = Some((raw, sps));
    }

    /// 替换缓存的 PPS
    pub fn set_pps(&mut self, raw: Bytes, pps: Pps) {
        self.pps = Some((raw, pps));
    }

    /// 当前 SPS 字段
    pub fn sps(&self) -> Option<&Sps> {
        self.sps.as_ref().map(|(_, sps)| sps)
    }

    /// 当前 PPS 字段
    pub fn pps(&self) -> Option<&Pps> {
        self.pps.as_ref().map(|(_, pps)| pps)
    }

    /// 当前 SPS 原始字节 (含起始码)
    pub fn sps_raw(&self) -> Option<&Bytes> {
        self.sps.as_ref().map(|(raw, _)| raw)
    }

    /// 当前 PPS 原始字节 (含起始码)
    pub fn pps_raw(&self) -> Option<&Bytes> {
        self.pps.as_ref().map(|(raw, _)| raw)
    }

    /// SPS 与 PPS 是否都已缓存
    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// 关键帧前缀: SPS 后接 PPS
    ///
    /// 任一缺失时返回 `None`.
    pub fn header(&self) -> Option<Bytes> {
        let (sps, pps) = (self.sps_raw()?, self.pps_raw()?);
        let mut buf = BytesMut::with_capacity(sps.len() + pps.len());
        buf.put_slice(sps);
        buf.put_slice(pps);
        Some(buf.freeze())
    }

    /// 去掉起始码的 SPS / PPS (用于构建 avcC)
    pub fn nal_payloads(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        fn strip(raw: &Bytes) -> &[u8] {
            raw.get(START_CODE.len()..).unwrap_or(&[])
        }
        (self.sps_raw().map(strip), self.pps_raw().map(strip))
    }
}
