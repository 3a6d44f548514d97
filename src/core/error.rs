use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("未知的输入格式: {0}")]
    InvalidFormat(String),

    #[error("无法打开媒体: {0}")]
    OpenError(ffmpeg_next::Error),

    #[error("探测流信息失败: {0}")]
    ProbeError(ffmpeg_next::Error),

    #[error("当前状态不允许该操作: {0}")]
    InvalidOperation(String),

    #[error("Seek 失败: {0}")]
    SeekError(ffmpeg_next::Error),

    #[error("解码器打开失败: {0}")]
    CodecOpenError(String),

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DemuxError>;
