//! 自定义 IO 字节源接入
//!
//! 把一个可读（可选可定位）的字节源桥接为容器的 AVIOContext，
//! 替代 FFmpeg 的原生文件/网络 IO。

use crate::core::{DemuxError, Result};
use ffmpeg_next::ffi;
use log::debug;
use std::io::SeekFrom;
use std::os::raw::{c_int, c_void};

const IO_BUFFER_SIZE: usize = 32 * 1024;
const AVERROR_EIO: c_int = -5; // AVERROR(EIO)

/// 自定义字节源抽象
///
/// 非文件系统来源（内存缓冲、加密流、自定义协议）实现该接口后
/// 即可作为容器的输入
pub trait IoDevice: Send {
    /// 读取至多 buf.len() 字节；返回 0 表示到达末尾
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// 随机定位，返回新位置；不可定位的源返回 Err
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64>;

    /// 总字节数，未知返回 None
    fn size(&self) -> Option<u64> {
        None
    }

    /// 是否支持随机访问（决定容器层的可 seek 性）
    fn is_seekable(&self) -> bool;
}

struct BridgeState {
    device: Box<dyn IoDevice>,
}

unsafe extern "C" fn read_packet_cb(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    if opaque.is_null() || buf.is_null() || buf_size <= 0 {
        return AVERROR_EIO;
    }
    let state = &mut *(opaque as *mut BridgeState);
    let slice = std::slice::from_raw_parts_mut(buf, buf_size as usize);
    match state.device.read(slice) {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(e) => {
            debug!("自定义 IO 读取失败: {}", e);
            AVERROR_EIO
        }
    }
}

unsafe extern "C" fn seek_cb(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    if opaque.is_null() {
        return AVERROR_EIO as i64;
    }
    let state = &mut *(opaque as *mut BridgeState);
    map_seek(state.device.as_mut(), offset, whence)
}

/// whence → SeekFrom 的映射（AVSEEK_SIZE 查询总长度）
fn map_seek(device: &mut dyn IoDevice, offset: i64, whence: c_int) -> i64 {
    if whence & ffi::AVSEEK_SIZE as c_int != 0 {
        return match device.size() {
            Some(size) => size as i64,
            None => AVERROR_EIO as i64,
        };
    }

    let pos = match whence & !(ffi::AVSEEK_FORCE as c_int) {
        0 => SeekFrom::Start(offset.max(0) as u64), // SEEK_SET
        1 => SeekFrom::Current(offset),             // SEEK_CUR
        2 => SeekFrom::End(offset),                 // SEEK_END
        _ => return AVERROR_EIO as i64,
    };

    match device.seek(pos) {
        Ok(new_pos) => new_pos as i64,
        Err(e) => {
            debug!("自定义 IO seek 失败: {}", e);
            AVERROR_EIO as i64
        }
    }
}

/// 把 IoDevice 装配成 AVIOContext，并负责其全部释放
pub(crate) struct IoBridge {
    avio: *mut ffi::AVIOContext,
    opaque: *mut BridgeState,
}

unsafe impl Send for IoBridge {}

impl IoBridge {
    pub(crate) fn new(device: Box<dyn IoDevice>) -> Result<Self> {
        let seekable = device.is_seekable();
        unsafe {
            let buffer = ffi::av_malloc(IO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                return Err(DemuxError::Other("无法分配 IO 缓冲区".to_string()));
            }

            let opaque = Box::into_raw(Box::new(BridgeState { device }));
            let avio = ffi::avio_alloc_context(
                buffer,
                IO_BUFFER_SIZE as c_int,
                0, // 只读
                opaque as *mut c_void,
                Some(read_packet_cb),
                None,
                if seekable { Some(seek_cb) } else { None },
            );
            if avio.is_null() {
                ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(opaque));
                return Err(DemuxError::Other("无法分配 AVIO 上下文".to_string()));
            }

            // 流式源：禁止 FFmpeg 尝试 seek
            if !seekable {
                (*avio).seekable = 0;
            }

            Ok(Self { avio, opaque })
        }
    }

    pub(crate) fn avio(&self) -> *mut ffi::AVIOContext {
        self.avio
    }
}

impl Drop for IoBridge {
    fn drop(&mut self) {
        unsafe {
            if !self.avio.is_null() {
                // avio_alloc_context 的缓冲区归调用方释放
                ffi::av_freep(&mut (*self.avio).buffer as *mut _ as *mut c_void);
                ffi::avio_context_free(&mut self.avio);
            }
            drop(Box::from_raw(self.opaque));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Seek};

    struct MemoryDevice {
        cursor: Cursor<Vec<u8>>,
    }

    impl MemoryDevice {
        fn new(data: Vec<u8>) -> Self {
            Self {
                cursor: Cursor::new(data),
            }
        }
    }

    impl IoDevice for MemoryDevice {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.cursor.read(buf)
        }

        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.cursor.seek(pos)
        }

        fn size(&self) -> Option<u64> {
            Some(self.cursor.get_ref().len() as u64)
        }

        fn is_seekable(&self) -> bool {
            true
        }
    }

    #[test]
    fn avseek_size_reports_length() {
        let mut dev = MemoryDevice::new(vec![0u8; 123]);
        assert_eq!(map_seek(&mut dev, 0, ffi::AVSEEK_SIZE as c_int), 123);
    }

    #[test]
    fn seek_whence_mapping() {
        let mut dev = MemoryDevice::new((0..100u8).collect());
        assert_eq!(map_seek(&mut dev, 10, 0), 10); // SEEK_SET
        assert_eq!(map_seek(&mut dev, 5, 1), 15); // SEEK_CUR
        assert_eq!(map_seek(&mut dev, -10, 2), 90); // SEEK_END
    }

    #[test]
    fn unknown_whence_is_error() {
        let mut dev = MemoryDevice::new(vec![]);
        assert!(map_seek(&mut dev, 0, 7) < 0);
    }

    #[test]
    fn read_callback_reaches_device_and_eof() {
        let mut state = BridgeState {
            device: Box::new(MemoryDevice::new(vec![1, 2, 3])),
        };
        let mut buf = [0u8; 8];
        let opaque = &mut state as *mut BridgeState as *mut c_void;
        let n = unsafe { read_packet_cb(opaque, buf.as_mut_ptr(), buf.len() as c_int) };
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        let eof = unsafe { read_packet_cb(opaque, buf.as_mut_ptr(), buf.len() as c_int) };
        assert_eq!(eof, ffi::AVERROR_EOF);
    }
}
