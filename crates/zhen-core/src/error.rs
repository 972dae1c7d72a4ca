//! 统一错误类型定义.
//!
//! 所有 Zhen crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Zhen 统一错误类型
#[derive(Debug, Error)]
pub enum ZhenError {
    /// 无效参数 (调用方传入的值超出允许范围)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏或截断的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾 (比特流读取越界或输出已全部取出)
    #[error("已到达流末尾")]
    Eof,
}

/// Zhen 统一 Result 类型
pub type ZhenResult<T> = Result<T, ZhenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_chinese() {
        let err = ZhenError::InvalidData("H264: avcC 数据太短".into());
        assert_eq!(format!("{err}"), "无效数据: H264: avcC 数据太短");
        assert_eq!(format!("{}", ZhenError::Eof), "已到达流末尾");
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ZhenError = io.into();
        assert!(matches!(err, ZhenError::Io(_)));
    }
}
