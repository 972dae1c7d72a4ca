//! NAL 重新分帧.
//!
//! 把任意切分的输入恢复为完整的 NAL 片段 ([`NalFragment`]):
//! - [`AnnexBReframer`]: 增量扫描 `00 00 01` 起始码, 跨输入包缓存未完成的 NAL
//! - [`AvccReframer`]: 按 1-4 字节大端长度前缀切分单个输入包
//!
//! 两者输出的片段都以 4 字节起始码开头.

use std::collections::VecDeque;

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};
use log::warn;
use zhen_core::{ZhenError, ZhenResult};

use super::nal::NalFragment;

/// 3 字节起始码
const START_CODE_3: [u8; 3] = [0x00, 0x00, 0x01];

/// Annex B 扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// 尚未找到起始码, 丢弃前导字节
    Seeking,
    /// 缓冲区以起始码开头, 等待下一个起始码
    Found,
}

/// 输入包时间戳在缓冲区中的起点
#[derive(Debug, Clone, Copy)]
struct TimestampMark {
    offset: usize,
    pts: i64,
    dts: i64,
}

/// Annex B 增量分帧器
///
/// 一个 NAL 在遇到下一个起始码时才算完整; 最后一个 NAL 由 [`finish`](Self::finish) 取出.
#[derive(Debug)]
pub struct AnnexBReframer {
    buf: BytesMut,
    state: ScanState,
    /// 下一次查找起始码的起点
    scan_pos: usize,
    /// 缓冲区中各输入包的起点, 按偏移递增
    marks: VecDeque<TimestampMark>,
}

impl Default for AnnexBReframer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnexBReframer {
    /// 创建分帧器
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            state: ScanState::Seeking,
            scan_pos: 0,
            marks: VecDeque::new(),
        }
    }

    /// 送入一段字节, 返回由此完成的 NAL 片段
    pub fn push(&mut self, data: &[u8], pts: i64, dts: i64) -> Vec<NalFragment> {
        if !data.is_empty() {
            self.marks.push_back(TimestampMark {
                offset: self.buf.len(),
                pts,
                dts,
            });
            self.buf.extend_from_slice(data);
        }

        let mut out = Vec::new();
        loop {
            match self.state {
                ScanState::Seeking => {
                    let Some(pos) = self.find_start_code() else {
                        // 保留末尾 2 字节, 它们可能是下一个起始码的前缀
                        let keep = self.buf.len().min(2);
                        self.consume(self.buf.len() - keep);
                        self.scan_pos = 0;
                        break;
                    };
                    self.consume(pos);
                    self.state = ScanState::Found;
                    self.scan_pos = START_CODE_3.len();
                }
                ScanState::Found => {
                    let Some(next) = self.find_start_code() else {
                        self.scan_pos = self.buf.len().saturating_sub(2).max(START_CODE_3.len());
                        break;
                    };
                    if let Some(fragment) = self.take_nal(next) {
                        out.push(fragment);
                    }
                    self.scan_pos = START_CODE_3.len();
                }
            }
        }
        out
    }

    /// 流结束: 取出缓冲区中最后一个 NAL 并复位
    pub fn finish(&mut self) -> Option<NalFragment> {
        let fragment = match self.state {
            ScanState::Found => {
                let end = self.buf.len();
                self.take_nal(end)
            }
            ScanState::Seeking => None,
        };
        self.reset();
        fragment
    }

    /// 丢弃所有缓存数据, 回到查找起始码状态
    pub fn reset(&mut self) {
        self.buf.clear();
        self.marks.clear();
        self.state = ScanState::Seeking;
        self.scan_pos = 0;
    }

    /// 当前缓存的字节数
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn find_start_code(&self) -> Option<usize> {
        let from = self.scan_pos.min(self.buf.len());
        self.buf[from..]
            .windows(START_CODE_3.len())
            .position(|w| w == START_CODE_3)
            .map(|p| p + from)
    }

    /// 取出 `buf[..end]` 作为一个 NAL (缓冲区以 3 字节起始码开头)
    fn take_nal(&mut self, end: usize) -> Option<NalFragment> {
        let (pts, dts) = self
            .marks
            .front()
            .map(|m| (m.pts, m.dts))
            .unwrap_or((zhen_core::NOPTS_VALUE, zhen_core::NOPTS_VALUE));
        let nal = self.buf.split_to(end);
        self.advance_marks(end);

        let mut nal_end = nal.len();
        while nal_end > START_CODE_3.len() && nal[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        let payload = nal.get(START_CODE_3.len()..nal_end)?;
        if payload.is_empty() {
            return None;
        }
        Some(NalFragment::from_nal(payload, pts, dts))
    }

    /// 丢弃缓冲区前 `n` 字节
    fn consume(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buf.advance(n);
        self.advance_marks(n);
    }

    /// 缓冲区前移 `n` 字节后修正时间戳起点
    ///
    /// 保留覆盖新缓冲区首字节的那个输入包.
    fn advance_marks(&mut self, n: usize) {
        while self.marks.len() >= 2 && self.marks[1].offset <= n {
            self.marks.pop_front();
        }
        for mark in self.marks.iter_mut() {
            mark.offset = mark.offset.saturating_sub(n);
        }
        if self.buf.is_empty() {
            self.marks.clear();
        }
    }
}

/// AVCC 长度前缀分帧器
#[derive(Debug, Clone, Copy)]
pub struct AvccReframer {
    length_size: usize,
}

impl AvccReframer {
    /// 创建分帧器, `length_size` 必须在 1..=4 之内
    pub fn new(length_size: usize) -> ZhenResult<Self> {
        if !(1..=4).contains(&length_size) {
            return Err(ZhenError::InvalidArgument(format!(
                "H264: NAL 长度前缀大小非法, length_size={length_size}"
            )));
        }
        Ok(Self { length_size })
    }

    /// NAL 长度前缀大小 (字节)
    pub fn length_size(&self) -> usize {
        self.length_size
    }

    /// 切分一个输入包
    ///
    /// 长度为 0 或超出剩余数据时停止, 此前已切出的 NAL 照常返回.
    pub fn split(&self, data: &[u8], pts: i64, dts: i64) -> Vec<NalFragment> {
        let mut out = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let remain = data.len() - pos;
            if remain < self.length_size {
                warn!(
                    "H264: AVCC 帧损坏, 长度前缀截断, remain={}, length_size={}",
                    remain, self.length_size
                );
                break;
            }
            let nal_len =
                BigEndian::read_uint(&data[pos..pos + self.length_size], self.length_size) as usize;
            pos += self.length_size;

            if nal_len == 0 || nal_len > data.len() - pos {
                warn!(
                    "H264: AVCC 帧损坏, nal_len={}, remain={}",
                    nal_len,
                    data.len() - pos
                );
                break;
            }
            out.push(NalFragment::from_nal(&data[pos..pos + nal_len], pts, dts));
            pos += nal_len;
        }

        out
    }
}
