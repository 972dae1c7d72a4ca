//! 打包器 trait 定义.

use zhen_core::ZhenResult;

use crate::codec_parameters::CodecParameters;
use crate::packet::Packet;

/// 打包器 trait
///
/// 将任意切分的码流片段重组为按帧组织的数据包.
///
/// 打包流程:
/// 1. 调用 `open()` 提供封装方式与额外数据
/// 2. 调用 `send_packet()` 送入码流片段
/// 3. 调用 `receive_packet()` 取出已完成的访问单元, 直到返回 `NeedMoreData`
/// 4. 送入空包表示流结束, 取出剩余访问单元直到返回 `Eof`
pub trait Packetizer: Send {
    /// 获取打包器名称
    fn name(&self) -> &str;

    /// 使用参数配置打包器
    ///
    /// 额外数据格式错误不会导致失败: 打包器以空参数集缓存启动,
    /// 等待码流中的 SPS / PPS.
    fn open(&mut self, params: &CodecParameters) -> ZhenResult<()>;

    /// 送入一个码流片段
    ///
    /// # 参数
    /// - `packet`: 码流片段. 送入空包表示流结束.
    ///
    /// # 返回
    /// - `Ok(())`: 数据已接受
    /// - `Err(ZhenError::InvalidData)`: 打包器未打开
    fn send_packet(&mut self, packet: &Packet) -> ZhenResult<()>;

    /// 取出一个访问单元
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功取出一帧
    /// - `Err(ZhenError::NeedMoreData)`: 需要送入更多数据
    /// - `Err(ZhenError::Eof)`: 流已结束且所有帧已取出
    fn receive_packet(&mut self) -> ZhenResult<Packet>;

    /// 清空内部状态 (保留参数集缓存)
    ///
    /// 用于 seek 后重新同步.
    fn flush(&mut self);
}
