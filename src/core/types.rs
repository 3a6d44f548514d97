use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 媒体类型（按流的 codec_type 区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Subtitle => "subtitle",
        }
    }
}

/// 媒体源类型
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// 本地文件路径
    LocalFile(PathBuf),

    /// 网络流 URL
    NetworkStream {
        url: String,
        protocol: StreamProtocol,
    },
}

impl MediaSource {
    /// 从 URL 字符串解析媒体源
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("rtsp://") {
            MediaSource::NetworkStream {
                url: url.to_string(),
                protocol: StreamProtocol::RTSP,
            }
        } else if url.starts_with("rtmp://") {
            MediaSource::NetworkStream {
                url: url.to_string(),
                protocol: StreamProtocol::RTMP,
            }
        } else if url.ends_with(".m3u8") || url.contains("/hls/") {
            MediaSource::NetworkStream {
                url: url.to_string(),
                protocol: StreamProtocol::HLS,
            }
        } else if url.starts_with("http://") || url.starts_with("https://") {
            MediaSource::NetworkStream {
                url: url.to_string(),
                protocol: StreamProtocol::HTTP,
            }
        } else {
            // 默认当作本地文件
            MediaSource::LocalFile(PathBuf::from(url))
        }
    }

    /// 判断是否为网络流
    pub fn is_network_stream(&self) -> bool {
        matches!(self, MediaSource::NetworkStream { .. })
    }
}

/// 流媒体协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamProtocol {
    /// RTSP - 实时流协议（监控摄像头）
    RTSP,
    /// RTMP - 实时消息协议（直播流）
    RTMP,
    /// HLS - HTTP Live Streaming
    HLS,
    /// HTTP - 普通 HTTP 流
    HTTP,
}

impl StreamProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamProtocol::RTSP => "RTSP",
            StreamProtocol::RTMP => "RTMP",
            StreamProtocol::HLS => "HLS",
            StreamProtocol::HTTP => "HTTP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_classification() {
        assert!(MediaSource::from_url("rtsp://cam/1").is_network_stream());
        assert!(MediaSource::from_url("https://a.b/v.mp4").is_network_stream());
        assert!(MediaSource::from_url("http://a.b/live/index.m3u8").is_network_stream());
        assert!(!MediaSource::from_url("/data/movie.mkv").is_network_stream());
    }

    #[test]
    fn hls_detected_by_suffix() {
        match MediaSource::from_url("http://a.b/x.m3u8") {
            MediaSource::NetworkStream { protocol, .. } => {
                assert_eq!(protocol, StreamProtocol::HLS)
            }
            _ => panic!("应识别为网络流"),
        }
    }
}
