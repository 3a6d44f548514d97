use crate::core::{DemuxError, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, ffi, util};
use log::{debug, warn};

/// 从容器的 codecpar 构造一份自持有的参数副本
///
/// 描述符不能借用容器内部的参数（容器会先于解码器被 unload 释放），
/// 因此复制一份，所有权交给 ffmpeg-next 的 Parameters 包装
unsafe fn copy_parameters(par: *const ffi::AVCodecParameters) -> Result<codec::Parameters> {
    let mut params = codec::Parameters::new();
    let ret = ffi::avcodec_parameters_copy(params.as_mut_ptr(), par);
    if ret < 0 {
        return Err(DemuxError::FFmpegError(ffmpeg::Error::from(ret)));
    }
    Ok(params)
}

/// 视频解码器
pub struct VideoCodec {
    decoder: codec::decoder::Video,
    hw_name: Option<&'static str>,
}

// 解码器句柄内部是裸指针，但每个实例只会在单一解码调用方中使用
unsafe impl Send for VideoCodec {}

impl VideoCodec {
    /// 按流参数打开解码器，随后尝试挂接硬件加速（失败回退软解）
    pub(crate) unsafe fn open(par: *const ffi::AVCodecParameters) -> Result<Self> {
        let context = codec::context::Context::from_parameters(copy_parameters(par)?)
            .map_err(|e| DemuxError::CodecOpenError(e.to_string()))?;
        #[allow(unused_mut)]
        let mut decoder = context
            .decoder()
            .video()
            .map_err(|e| DemuxError::CodecOpenError(e.to_string()))?;

        #[cfg(feature = "hwaccel")]
        let hw_name = crate::demux::hw_device::setup(&mut decoder);
        #[cfg(not(feature = "hwaccel"))]
        let hw_name: Option<&'static str> = None;

        debug!(
            "视频解码器: {}x{}, 格式: {:?}, 硬件加速: {}",
            decoder.width(),
            decoder.height(),
            decoder.format(),
            hw_name.unwrap_or("无")
        );

        Ok(Self { decoder, hw_name })
    }

    /// 解码数据包 → 至多一帧
    ///
    /// 解码器缓冲中（EAGAIN）返回 None，调用方继续喂包即可
    pub(crate) fn decode(&mut self, packet: &ffmpeg::Packet) -> Option<util::frame::Video> {
        match self.decoder.send_packet(packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                debug!("视频解码器收到 EOF（send_packet），执行 flush 并忽略本次包");
                self.decoder.flush();
                return None;
            }
            Err(e) => {
                warn!("视频解码错误（已跳过）: {}", e);
                return None;
            }
        }

        let mut decoded = util::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(_) => Some(decoded),
            Err(ffmpeg::Error::Other { errno: 11 }) => None, // EAGAIN
            Err(ffmpeg::Error::Eof) => None,
            Err(e) => {
                // 网络流里参考帧丢失等错误是可容忍的，按无输出处理
                warn!("视频解码错误（已跳过）: {}", e);
                None
            }
        }
    }

    /// 当前使用的硬件加速名称（软解为 None）
    pub fn hw_name(&self) -> Option<&'static str> {
        self.hw_name
    }
}

/// 音频解码器
pub struct AudioCodec {
    decoder: codec::decoder::Audio,
}

unsafe impl Send for AudioCodec {}

impl AudioCodec {
    pub(crate) unsafe fn open(par: *const ffi::AVCodecParameters) -> Result<Self> {
        let context = codec::context::Context::from_parameters(copy_parameters(par)?)
            .map_err(|e| DemuxError::CodecOpenError(e.to_string()))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| DemuxError::CodecOpenError(e.to_string()))?;

        debug!(
            "音频解码器: {} Hz, {} 声道, 格式: {:?}",
            decoder.rate(),
            decoder.channels(),
            decoder.format()
        );

        Ok(Self { decoder })
    }

    pub(crate) fn decode(&mut self, packet: &ffmpeg::Packet) -> Option<util::frame::Audio> {
        match self.decoder.send_packet(packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                debug!("音频解码器收到 EOF（send_packet），执行 flush 并忽略本次包");
                self.decoder.flush();
                return None;
            }
            Err(e) => {
                warn!("音频解码错误（已跳过）: {}", e);
                return None;
            }
        }

        let mut decoded = util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(_) => Some(decoded),
            Err(ffmpeg::Error::Other { errno: 11 }) => None, // EAGAIN
            Err(ffmpeg::Error::Eof) => None,
            Err(e) => {
                warn!("音频解码错误（已跳过）: {}", e);
                None
            }
        }
    }
}
