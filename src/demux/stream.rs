use crate::core::MediaType;
use crate::demux::codec::{AudioCodec, VideoCodec};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use parking_lot::Mutex;
use std::sync::Arc;

/// 流描述快照 - 创建后不再变化，查询接口按值返回副本
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// 容器内的流索引
    pub index: usize,
    pub media_type: MediaType,
    pub codec_name: String,
    /// 该流时间戳的时间基
    pub time_base: ffmpeg::Rational,
}

impl StreamInfo {
    pub(crate) unsafe fn from_raw(index: usize, stream: *const ffi::AVStream) -> Self {
        let par = (*stream).codecpar;
        let media_type = match (*par).codec_type {
            ffi::AVMediaType::AVMEDIA_TYPE_VIDEO => MediaType::Video,
            ffi::AVMediaType::AVMEDIA_TYPE_AUDIO => MediaType::Audio,
            _ => MediaType::Subtitle,
        };
        let tb = (*stream).time_base;
        Self {
            index,
            media_type,
            codec_name: ffmpeg::codec::Id::from((*par).codec_id).name().to_string(),
            time_base: ffmpeg::Rational::new(tb.num, tb.den),
        }
    }
}

/// 各媒体类型对应的解码器：音/视频各带一个已打开的解码器，
/// 字幕流不挂解码器，负载按原始包透传
#[derive(Clone)]
pub(crate) enum StreamCodec {
    Video(Arc<Mutex<VideoCodec>>),
    Audio(Arc<Mutex<AudioCodec>>),
    Subtitle,
}

/// 一条基本流：快照 + 解码器，生命周期为一次 load/unload
pub(crate) struct StreamDescriptor {
    pub info: StreamInfo,
    pub codec: StreamCodec,
}

impl StreamDescriptor {
    pub(crate) fn video(info: StreamInfo, codec: VideoCodec) -> Self {
        Self {
            info,
            codec: StreamCodec::Video(Arc::new(Mutex::new(codec))),
        }
    }

    pub(crate) fn audio(info: StreamInfo, codec: AudioCodec) -> Self {
        Self {
            info,
            codec: StreamCodec::Audio(Arc::new(Mutex::new(codec))),
        }
    }

    pub(crate) fn subtitle(info: StreamInfo) -> Self {
        Self {
            info,
            codec: StreamCodec::Subtitle,
        }
    }
}
