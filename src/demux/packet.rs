use crate::demux::stream::StreamInfo;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::packet::Mut;
use ffmpeg_next::util::frame;

/// 压缩数据包 - 从容器读出的一个访问单元
///
/// 读取后根据所属流补上时间基；未选中流/字幕流的包不带时间基
pub struct Packet {
    inner: ffmpeg::Packet,
    time_base: Option<ffmpeg::Rational>,
}

// AVPacket 内部是裸指针，跨线程传递由调用方保证独占使用
unsafe impl Send for Packet {}

impl Packet {
    /// 空包（哨兵值）：无数据、无时间基
    pub fn empty() -> Self {
        Self {
            inner: ffmpeg::Packet::empty(),
            time_base: None,
        }
    }

    /// 是否为空包（未读到数据 / EOF / 读取失败）
    pub fn is_empty(&self) -> bool {
        self.inner.data().is_none()
    }

    /// 包所属的流索引
    pub fn stream_index(&self) -> usize {
        self.inner.stream()
    }

    /// 所属流的时间基（仅当包属于当前选中的音/视频流）
    pub fn time_base(&self) -> Option<ffmpeg::Rational> {
        self.time_base
    }

    pub(crate) fn set_time_base(&mut self, time_base: ffmpeg::Rational) {
        self.time_base = Some(time_base);
    }

    /// 显示时间戳（流时间基单位）
    pub fn pts(&self) -> Option<i64> {
        self.inner.pts()
    }

    /// PTS 换算为秒（需要时间基）
    pub fn pts_seconds(&self) -> Option<f64> {
        let tb = self.time_base?;
        let pts = self.inner.pts()?;
        if tb.denominator() == 0 {
            return None;
        }
        Some(pts as f64 * tb.numerator() as f64 / tb.denominator() as f64)
    }

    pub fn is_key(&self) -> bool {
        self.inner.is_key()
    }

    /// 原始负载（字幕流的包由调用方直接消费）
    pub fn data(&self) -> Option<&[u8]> {
        self.inner.data()
    }

    pub fn inner(&self) -> &ffmpeg::Packet {
        &self.inner
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffmpeg::ffi::AVPacket {
        self.inner.as_mut_ptr()
    }

    #[cfg(test)]
    pub(crate) fn with_payload(size: usize, stream_index: i32) -> Self {
        let mut inner = ffmpeg::Packet::new(size);
        unsafe {
            (*inner.as_mut_ptr()).stream_index = stream_index;
        }
        Self {
            inner,
            time_base: None,
        }
    }
}

/// 解码产物
pub enum FrameData {
    Video(frame::Video),
    Audio(frame::Audio),
}

/// 解码帧 - 带上来源流的描述信息
///
/// 解码器在缓冲时合法地产出零帧，此时返回空帧；
/// 调用方不能假设包和帧是 1:1 的关系
pub struct Frame {
    stream: Option<StreamInfo>,
    data: Option<FrameData>,
}

unsafe impl Send for Frame {}

impl Frame {
    /// 空帧（哨兵值）
    pub fn empty() -> Self {
        Self {
            stream: None,
            data: None,
        }
    }

    pub(crate) fn video(stream: StreamInfo, frame: frame::Video) -> Self {
        Self {
            stream: Some(stream),
            data: Some(FrameData::Video(frame)),
        }
    }

    pub(crate) fn audio(stream: StreamInfo, frame: frame::Audio) -> Self {
        Self {
            stream: Some(stream),
            data: Some(FrameData::Audio(frame)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// 来源流描述
    pub fn stream(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn data(&self) -> Option<&FrameData> {
        self.data.as_ref()
    }

    /// 取出解码数据（所有权移交调用方）
    pub fn into_data(self) -> Option<FrameData> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_packet_is_sentinel() {
        let pkt = Packet::empty();
        assert!(pkt.is_empty());
        assert!(pkt.time_base().is_none());
        assert!(pkt.pts_seconds().is_none());
    }

    #[test]
    fn empty_frame_has_no_origin() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert!(frame.stream().is_none());
        assert!(frame.into_data().is_none());
    }
}
