//! 解封装核心
//!
//! 打开容器、发现基本流、按媒体类型维护当前选中流，并把压缩包
//! 分发到所属流的解码器。所有可变状态由单把互斥锁保护；唯一的
//! 例外是 read()：阻塞读包期间会释放锁，使 abort()/seek()/流切换
//! 不会被一次长时间的网络读饿死。
//!
//! load()/unload() 与另一个线程上进行中的 read()/decode() 之间
//! 没有跨调用原子性 — 锁只保证内部一致性，调用方必须围绕读循环
//! 的生命周期串行化 load/unload。

use crate::core::{DemuxError, MediaSource, MediaType, Result};
use crate::demux::codec::{AudioCodec, VideoCodec};
use crate::demux::io_device::{IoBridge, IoDevice};
use crate::demux::packet::{Frame, Packet};
use crate::demux::stream::{StreamCodec, StreamDescriptor, StreamInfo};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

/// "-f <格式> -i <输入>" 覆写语法的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedUrl {
    input: String,
    format: String,
}

/// 解析源字符串：以 '-' 开头时按 " -" 切分出格式/输入两段，
/// 否则整串就是输入
fn parse_url(url: &str) -> ParsedUrl {
    let trimmed = url.trim();
    if !trimmed.starts_with('-') {
        return ParsedUrl {
            input: trimmed.to_string(),
            format: String::new(),
        };
    }

    let padded = format!(" {}", trimmed);
    let mut input = String::new();
    let mut format = String::new();
    for item in padded.split(" -") {
        if item.is_empty() {
            continue;
        }
        if let Some(rest) = item.strip_prefix('i') {
            input = rest.trim().to_string();
        } else if let Some(rest) = item.strip_prefix('f') {
            format = rest.trim().to_string();
        }
    }

    ParsedUrl { input, format }
}

/// 中断回调：FFmpeg 在阻塞操作（打开/探测/读包）内部轮询，
/// 返回非零即中止当前操作。只读原子标志，不碰状态锁
unsafe extern "C" fn interrupt_cb(opaque: *mut c_void) -> c_int {
    if opaque.is_null() {
        return 0;
    }
    let abort = &*(opaque as *const AtomicBool);
    abort.load(Ordering::SeqCst) as c_int
}

/// 把 FFmpeg 的日志行转发进 log
///
/// va_list 的 ABI 因平台而异，只在 x86_64 Unix 上接管日志回调；
/// 其余平台仅压低后端日志级别
#[cfg(all(unix, target_arch = "x86_64"))]
unsafe extern "C" fn log_cb(
    ptr: *mut c_void,
    level: c_int,
    fmt: *const c_char,
    vl: *mut ffi::__va_list_tag,
) {
    if level > ffi::av_log_get_level() {
        return;
    }
    let mut line = [0 as c_char; 1024];
    let mut print_prefix: c_int = 1;
    ffi::av_log_format_line(
        ptr,
        level,
        fmt,
        vl,
        line.as_mut_ptr(),
        line.len() as c_int,
        &mut print_prefix,
    );
    let msg = CStr::from_ptr(line.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() {
        return;
    }
    if level <= ffi::AV_LOG_ERROR as c_int {
        log::error!("FFmpeg: {}", msg);
    } else if level <= ffi::AV_LOG_WARNING as c_int {
        log::warn!("FFmpeg: {}", msg);
    } else {
        // 后端的 INFO 很啰嗦，统一降为 debug
        log::debug!("FFmpeg: {}", msg);
    }
}

static BACKEND_INIT: Once = Once::new();

/// 进程级一次性初始化：注册后端 + 接管其日志输出
fn ensure_backend_init() {
    BACKEND_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            warn!("FFmpeg 初始化失败: {}", e);
        }
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);
        #[cfg(all(unix, target_arch = "x86_64"))]
        unsafe {
            ffi::av_log_set_callback(Some(log_cb));
        }
    });
}

/// 支持的容器格式名（进程内只枚举一次）
static SUPPORTED_FORMATS: Lazy<Vec<String>> = Lazy::new(|| {
    ensure_backend_init();
    let mut values = Vec::new();
    unsafe {
        let mut it: *mut c_void = ptr::null_mut();
        loop {
            let fmt = ffi::av_demuxer_iterate(&mut it);
            if fmt.is_null() {
                break;
            }
            if !(*fmt).name.is_null() {
                let name = CStr::from_ptr((*fmt).name).to_string_lossy();
                values.extend(
                    name.split(',')
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string()),
                );
            }
        }
    }
    values
});

/// 支持的 IO 协议名（进程内只枚举一次）
static SUPPORTED_PROTOCOLS: Lazy<Vec<String>> = Lazy::new(|| {
    ensure_backend_init();
    let mut values = Vec::new();
    unsafe {
        let mut opaque: *mut c_void = ptr::null_mut();
        loop {
            let name = ffi::avio_enum_protocols(&mut opaque, 0);
            if name.is_null() {
                break;
            }
            values.push(CStr::from_ptr(name).to_string_lossy().into_owned());
        }
    }
    values
});

/// 选流守卫：索引在范围内、与当前选择不同、且目标描述符类型匹配
fn selection_allowed(
    types: &[Option<MediaType>],
    current: Option<usize>,
    index: usize,
    want: MediaType,
) -> bool {
    index < types.len() && current != Some(index) && types[index] == Some(want)
}

/// 把猜测的帧率倒数成单帧时长（秒）；退化值（分子/分母为 0）返回 0
fn invert_frame_rate(num: i32, den: i32) -> f64 {
    if num != 0 && den != 0 {
        den as f64 / num as f64
    } else {
        0.0
    }
}

struct DemuxerState {
    ctx: *mut ffi::AVFormatContext,
    io: Option<IoBridge>,
    seekable: bool,
    /// 按容器流索引排布；解码器打不开或类型不支持的位置为 None
    streams: Vec<Option<StreamDescriptor>>,
    current_video: Option<usize>,
    current_audio: Option<usize>,
    current_subtitle: Option<usize>,
    eof: bool,
}

// 上下文指针只在持锁期间解引用；read() 释放锁后仅把指针交给
// av_read_frame（load/unload 与读循环的串行化由调用方负责）
unsafe impl Send for DemuxerState {}

/// 解封装器 - 打开媒体源并分离/解码基本流
pub struct Demuxer {
    state: Mutex<DemuxerState>,
    abort_requested: Arc<AtomicBool>,
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DemuxerState {
                ctx: ptr::null_mut(),
                io: None,
                seekable: false,
                streams: Vec::new(),
                current_video: None,
                current_audio: None,
                current_subtitle: None,
                eof: false,
            }),
            abort_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 请求中止进行中的阻塞操作（打开/探测/读包）
    ///
    /// 没有硬抢占：后端在下一个轮询点观察到标志后返回错误
    pub fn abort(&self, stop: bool) {
        self.abort_requested.store(stop, Ordering::SeqCst);
    }

    /// 打开媒体源（URL 或本地路径，支持 "-f <格式> -i <输入>" 覆写）
    pub fn load(&self, url: &str) -> Result<()> {
        self.load_impl(url, None)
    }

    /// 打开媒体源，字节由自定义 IO 设备提供
    pub fn load_with_io(&self, url: &str, device: Box<dyn IoDevice>) -> Result<()> {
        self.load_impl(url, Some(device))
    }

    fn load_impl(&self, url: &str, device: Option<Box<dyn IoDevice>>) -> Result<()> {
        ensure_backend_init();

        let parsed = parse_url(url);
        let format_cstr;
        let input_format: *const ffi::AVInputFormat = if !parsed.format.is_empty() {
            info!("🎬 加载: -f {} -i {}", parsed.format, parsed.input);
            format_cstr = CString::new(parsed.format.as_str())
                .map_err(|e| DemuxError::Other(format!("格式名不合法: {}", e)))?;
            let fmt = unsafe { ffi::av_find_input_format(format_cstr.as_ptr()) };
            if fmt.is_null() {
                warn!("❌ 未知的输入格式: {}", parsed.format);
                return Err(DemuxError::InvalidFormat(parsed.format));
            }
            fmt
        } else {
            info!("🎬 加载: {}", parsed.input);
            ptr::null()
        };
        let input_cstr = CString::new(parsed.input.as_str())
            .map_err(|e| DemuxError::Other(format!("输入路径不合法: {}", e)))?;

        let mut state = self.state.lock();
        if state.ctx.is_null() {
            state.ctx = unsafe { ffi::avformat_alloc_context() };
            if state.ctx.is_null() {
                return Err(DemuxError::Other("无法分配容器上下文".to_string()));
            }
        }
        let ctx = state.ctx;
        let device_seekable = device.as_ref().map(|d| d.is_seekable());
        unsafe {
            (*ctx).flags |= ffi::AVFMT_FLAG_GENPTS as c_int;
            (*ctx).interrupt_callback.callback = Some(interrupt_cb);
            (*ctx).interrupt_callback.opaque =
                Arc::as_ptr(&self.abort_requested) as *mut c_void;
            if let Some(dev) = device {
                let bridge = IoBridge::new(dev)?;
                (*ctx).pb = bridge.avio();
                (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;
                state.io = Some(bridge);
            }
        }

        // 网络源的打开选项（降低起播延迟、容忍损坏分片）
        let source = MediaSource::from_url(&parsed.input);
        let mut options = ffmpeg::Dictionary::new();
        if source.is_network_stream() {
            info!("🌐 检测到网络流，应用优化选项");
            options.set("fflags", "+discardcorrupt+genpts+nobuffer+igndts");
            options.set("analyzeduration", "5000000");
            options.set("probesize", "10000000");
            options.set("rw_timeout", "8000000");
            options.set("reconnect", "1");
            options.set("reconnect_streamed", "1");
            options.set("reconnect_delay_max", "4");
        }

        // 打开与探测都是阻塞调用（由中断回调驱动取消）：先释放锁
        drop(state);

        let mut ctx_ptr = ctx;
        let mut opts = unsafe { options.disown() };
        let ret = unsafe {
            ffi::avformat_open_input(&mut ctx_ptr, input_cstr.as_ptr(), input_format, &mut opts)
        };
        unsafe { ffi::av_dict_free(&mut opts) };
        if ret < 0 {
            // 打开失败时 FFmpeg 已释放上下文
            let mut state = self.state.lock();
            state.ctx = ptr::null_mut();
            state.io = None;
            return Err(DemuxError::OpenError(ffmpeg::Error::from(ret)));
        }

        let ret = unsafe { ffi::avformat_find_stream_info(ctx_ptr, ptr::null_mut()) };
        if ret < 0 {
            let mut state = self.state.lock();
            unsafe { ffi::avformat_close_input(&mut state.ctx) };
            state.io = None;
            return Err(DemuxError::ProbeError(ffmpeg::Error::from(ret)));
        }

        let mut state = self.state.lock();

        // 默认选流：各类型取 best stream，音频优先靠近选中的视频，
        // 字幕优先靠近选中的音频（其次视频）
        unsafe {
            let wanted = |v: Option<usize>| v.map(|i| i as c_int).unwrap_or(-1);
            let video = ffi::av_find_best_stream(
                ctx,
                ffi::AVMediaType::AVMEDIA_TYPE_VIDEO,
                wanted(state.current_video),
                -1,
                ptr::null_mut(),
                0,
            );
            let audio = ffi::av_find_best_stream(
                ctx,
                ffi::AVMediaType::AVMEDIA_TYPE_AUDIO,
                wanted(state.current_audio),
                video,
                ptr::null_mut(),
                0,
            );
            let subtitle = ffi::av_find_best_stream(
                ctx,
                ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE,
                wanted(state.current_subtitle),
                if audio >= 0 { audio } else { video },
                ptr::null_mut(),
                0,
            );
            state.current_video = (video >= 0).then(|| video as usize);
            state.current_audio = (audio >= 0).then(|| audio as usize);
            state.current_subtitle = (subtitle >= 0).then(|| subtitle as usize);
        }
        debug!(
            "默认选流: video={:?} audio={:?} subtitle={:?}",
            state.current_video, state.current_audio, state.current_subtitle
        );

        // 构建流描述符：音/视频流打开解码器（失败只跳过该流），
        // 字幕流不挂解码器
        state.streams.clear();
        let nb_streams = unsafe { (*ctx).nb_streams } as usize;
        for i in 0..nb_streams {
            let descriptor = unsafe {
                let stream = *(*ctx).streams.add(i);
                let par = (*stream).codecpar;
                match (*par).codec_type {
                    ffi::AVMediaType::AVMEDIA_TYPE_VIDEO => {
                        let info = StreamInfo::from_raw(i, stream);
                        match VideoCodec::open(par) {
                            Ok(codec) => Some(StreamDescriptor::video(info, codec)),
                            Err(e) => {
                                warn!("⚠ 无法打开视频解码器（流 {}）: {}，跳过该流", i, e);
                                None
                            }
                        }
                    }
                    ffi::AVMediaType::AVMEDIA_TYPE_AUDIO => {
                        let info = StreamInfo::from_raw(i, stream);
                        match AudioCodec::open(par) {
                            Ok(codec) => Some(StreamDescriptor::audio(info, codec)),
                            Err(e) => {
                                warn!("⚠ 无法打开音频解码器（流 {}）: {}，跳过该流", i, e);
                                None
                            }
                        }
                    }
                    ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE => {
                        Some(StreamDescriptor::subtitle(StreamInfo::from_raw(i, stream)))
                    }
                    _ => None,
                }
            };
            state.streams.push(descriptor);
        }

        // 可 seek 性：容器格式支持原生 seek，或字节源自报可定位
        state.seekable = unsafe {
            let iformat = (*ctx).iformat;
            let native = !iformat.is_null()
                && ((*iformat).read_seek.is_some() || (*iformat).read_seek2.is_some());
            let pb = (*ctx).pb;
            native || (!pb.is_null() && (*pb).seekable != 0)
        };
        if let Some(dev_seekable) = device_seekable {
            state.seekable |= dev_seekable;
        }
        state.eof = false;

        info!(
            "✅ 加载完成: {} 路流（video={} audio={} subtitle={}），seekable={}",
            nb_streams,
            state
                .streams
                .iter()
                .flatten()
                .filter(|d| d.info.media_type == MediaType::Video)
                .count(),
            state
                .streams
                .iter()
                .flatten()
                .filter(|d| d.info.media_type == MediaType::Audio)
                .count(),
            state
                .streams
                .iter()
                .flatten()
                .filter(|d| d.info.media_type == MediaType::Subtitle)
                .count(),
            state.seekable
        );
        Ok(())
    }

    /// 读取下一个压缩包（阻塞，可被 abort 中断）
    ///
    /// 未加载或已 EOF 时立即返回空包；到达流末尾置 eof 并返回空包；
    /// 其余读取错误同样返回空包且不置 eof（按"暂时无数据"处理，
    /// 调用方重试即可 — 这是有意的宽松策略）
    pub fn read(&self) -> Packet {
        let ctx = {
            let state = self.state.lock();
            if state.ctx.is_null() || state.eof {
                return Packet::empty();
            }
            state.ctx
        };

        // 阻塞读包期间不持锁
        let mut packet = Packet::empty();
        let ret = unsafe { ffi::av_read_frame(ctx, packet.as_mut_ptr()) };
        if ret < 0 {
            let end_of_stream = matches!(ffmpeg::Error::from(ret), ffmpeg::Error::Eof)
                || unsafe { !(*ctx).pb.is_null() && ffi::avio_feof((*ctx).pb) != 0 };
            if end_of_stream {
                let mut state = self.state.lock();
                state.eof = true;
                debug!("📄 到达流末尾");
            } else {
                debug!("读包失败（按空包处理）: {}", ffmpeg::Error::from(ret));
            }
            return Packet::empty();
        }

        // 重新持锁：只为当前选中的音/视频流补时间基
        let state = self.state.lock();
        let index = packet.stream_index();
        if state.current_video == Some(index) || state.current_audio == Some(index) {
            if let Some(Some(descriptor)) = state.streams.get(index) {
                packet.set_time_base(descriptor.info.time_base);
            }
        }
        packet
    }

    /// 把压缩包分发给所属流的解码器
    ///
    /// 流索引越界或该流无解码器（字幕流按原始包透传）时返回空帧；
    /// 解码器缓冲中也会合法地返回空帧。不触碰解封装状态；
    /// 同一条流的解码不可并发（单生产者解码循环是预期用法）
    pub fn decode(&self, packet: &Packet) -> Frame {
        if packet.is_empty() {
            return Frame::empty();
        }
        let index = packet.stream_index();

        // 仅短暂持锁取出描述符，实际解码在各流自己的锁上进行
        let (info, codec) = {
            let state = self.state.lock();
            match state.streams.get(index) {
                Some(Some(descriptor)) => (descriptor.info.clone(), descriptor.codec.clone()),
                _ => return Frame::empty(),
            }
        };

        match codec {
            StreamCodec::Video(codec) => match codec.lock().decode(packet.inner()) {
                Some(frame) => Frame::video(info, frame),
                None => Frame::empty(),
            },
            StreamCodec::Audio(codec) => match codec.lock().decode(packet.inner()) {
                Some(frame) => Frame::audio(info, frame),
                None => Frame::empty(),
            },
            StreamCodec::Subtitle => Frame::empty(),
        }
    }

    /// 定位到指定秒数（向前取最近的关键帧）
    pub fn seek(&self, seconds: f64) -> Result<()> {
        let mut state = self.state.lock();
        if state.ctx.is_null() {
            return Err(DemuxError::InvalidOperation("尚未加载媒体".to_string()));
        }
        if !state.seekable {
            return Err(DemuxError::InvalidOperation(
                "当前源不支持 seek".to_string(),
            ));
        }

        state.eof = false;
        let target = (seconds * ffi::AV_TIME_BASE as f64) as i64;
        let ret = unsafe {
            ffi::avformat_seek_file(
                state.ctx,
                -1,
                i64::MIN,
                target,
                target,
                ffi::AVSEEK_FLAG_BACKWARD as c_int,
            )
        };
        if ret < 0 {
            return Err(DemuxError::SeekError(ffmpeg::Error::from(ret)));
        }
        Ok(())
    }

    /// 关闭容器并重置全部状态，之后可再次 load
    pub fn unload(&self) {
        let mut state = self.state.lock();
        if !state.ctx.is_null() {
            unsafe { ffi::avformat_close_input(&mut state.ctx) };
        }
        // 自定义 IO 要在容器关闭之后释放
        state.io = None;
        state.seekable = false;
        state.eof = false;
        state.streams.clear();
        state.current_video = None;
        state.current_audio = None;
        state.current_subtitle = None;
        self.abort_requested.store(false, Ordering::SeqCst);
    }

    /// 是否已到流末尾（粘滞，unload/重新 load 前保持）
    pub fn eof(&self) -> bool {
        self.state.lock().eof
    }

    pub fn seekable(&self) -> bool {
        self.state.lock().seekable
    }

    /// 容器时长（秒），未知返回 0
    pub fn duration(&self) -> f64 {
        let state = self.state.lock();
        if state.ctx.is_null() {
            return 0.0;
        }
        let duration = unsafe { (*state.ctx).duration };
        if duration == ffi::AV_NOPTS_VALUE {
            0.0
        } else {
            duration as f64 / ffi::AV_TIME_BASE as f64
        }
    }

    /// 当前视频流的单帧时长（秒）
    ///
    /// 未选中视频流时返回默认 1/24；帧率猜测退化时返回 0
    pub fn video_frame_rate(&self) -> f64 {
        let state = self.state.lock();
        let index = match state.current_video {
            Some(i) if !state.ctx.is_null() => i,
            _ => return 1.0 / 24.0,
        };
        let rate = unsafe {
            ffi::av_guess_frame_rate(state.ctx, *(*state.ctx).streams.add(index), ptr::null_mut())
        };
        invert_frame_rate(rate.num, rate.den)
    }

    /// 容器级元数据（未加载时为空映射）
    pub fn metadata(&self) -> HashMap<String, String> {
        let state = self.state.lock();
        let mut result = HashMap::new();
        if state.ctx.is_null() {
            return result;
        }
        unsafe {
            let empty_key = CStr::from_bytes_with_nul_unchecked(b"\0");
            let mut tag: *mut ffi::AVDictionaryEntry = ptr::null_mut();
            loop {
                tag = ffi::av_dict_get(
                    (*state.ctx).metadata,
                    empty_key.as_ptr(),
                    tag,
                    ffi::AV_DICT_IGNORE_SUFFIX as c_int,
                );
                if tag.is_null() {
                    break;
                }
                result.insert(
                    CStr::from_ptr((*tag).key).to_string_lossy().into_owned(),
                    CStr::from_ptr((*tag).value).to_string_lossy().into_owned(),
                );
            }
        }
        result
    }

    /// 全部视频流的描述快照
    pub fn video_streams(&self) -> Vec<StreamInfo> {
        self.streams_of(MediaType::Video)
    }

    pub fn audio_streams(&self) -> Vec<StreamInfo> {
        self.streams_of(MediaType::Audio)
    }

    pub fn subtitle_streams(&self) -> Vec<StreamInfo> {
        self.streams_of(MediaType::Subtitle)
    }

    fn streams_of(&self, media_type: MediaType) -> Vec<StreamInfo> {
        let state = self.state.lock();
        state
            .streams
            .iter()
            .flatten()
            .filter(|d| d.info.media_type == media_type)
            .map(|d| d.info.clone())
            .collect()
    }

    /// 当前选中的视频流（未选中/越界时为 None）
    pub fn video_stream(&self) -> Option<StreamInfo> {
        let state = self.state.lock();
        state
            .current_video
            .and_then(|i| state.streams.get(i)?.as_ref())
            .map(|d| d.info.clone())
    }

    pub fn audio_stream(&self) -> Option<StreamInfo> {
        let state = self.state.lock();
        state
            .current_audio
            .and_then(|i| state.streams.get(i)?.as_ref())
            .map(|d| d.info.clone())
    }

    /// 切换当前视频流；索引越界、类型不符或与当前相同时不生效
    pub fn set_video_stream(&self, stream: &StreamInfo) -> bool {
        self.set_current(stream, MediaType::Video)
    }

    pub fn set_audio_stream(&self, stream: &StreamInfo) -> bool {
        self.set_current(stream, MediaType::Audio)
    }

    fn set_current(&self, stream: &StreamInfo, want: MediaType) -> bool {
        let mut state = self.state.lock();
        let types: Vec<Option<MediaType>> = state
            .streams
            .iter()
            .map(|d| d.as_ref().map(|d| d.info.media_type))
            .collect();
        let current = match want {
            MediaType::Video => state.current_video,
            MediaType::Audio => state.current_audio,
            MediaType::Subtitle => return false,
        };
        if !selection_allowed(&types, current, stream.index, want) {
            return false;
        }
        match want {
            MediaType::Video => state.current_video = Some(stream.index),
            MediaType::Audio => state.current_audio = Some(stream.index),
            MediaType::Subtitle => unreachable!(),
        }
        true
    }

    pub(crate) fn media_type_of(&self, index: usize) -> Option<MediaType> {
        let state = self.state.lock();
        state
            .streams
            .get(index)?
            .as_ref()
            .map(|d| d.info.media_type)
    }

    /// 支持的容器格式名列表（进程生命周期内缓存）
    pub fn supported_formats() -> &'static [String] {
        &SUPPORTED_FORMATS
    }

    /// 支持的 IO 协议名列表（进程生命周期内缓存）
    pub fn supported_protocols() -> &'static [String] {
        &SUPPORTED_PROTOCOLS
    }
}

impl Drop for Demuxer {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_with_format_override() {
        let parsed = parse_url("-f mp4 -i /path/clip.raw");
        assert_eq!(parsed.format, "mp4");
        assert_eq!(parsed.input, "/path/clip.raw");
    }

    #[test]
    fn parse_url_plain_path() {
        let parsed = parse_url("/data/电影/movie.mkv");
        assert_eq!(parsed.format, "");
        assert_eq!(parsed.input, "/data/电影/movie.mkv");
    }

    #[test]
    fn parse_url_reversed_order_and_padding() {
        let parsed = parse_url("  -i rtsp://cam/1 -f rtsp  ");
        assert_eq!(parsed.format, "rtsp");
        assert_eq!(parsed.input, "rtsp://cam/1");
    }

    #[test]
    fn load_with_unknown_format_fails() {
        let demuxer = Demuxer::new();
        match demuxer.load("-f 不存在的格式 -i /tmp/x.bin") {
            Err(DemuxError::InvalidFormat(name)) => assert_eq!(name, "不存在的格式"),
            other => panic!("应返回 InvalidFormat，实际: {:?}", other.err()),
        }
    }

    #[test]
    fn fresh_demuxer_is_inert() {
        let demuxer = Demuxer::new();
        assert!(!demuxer.eof());
        assert!(!demuxer.seekable());
        assert_eq!(demuxer.duration(), 0.0);
        assert!(demuxer.metadata().is_empty());
        assert!(demuxer.video_streams().is_empty());
        assert!(demuxer.audio_streams().is_empty());
        assert!(demuxer.video_stream().is_none());
        assert!(demuxer.read().is_empty());
        assert!(demuxer.decode(&Packet::empty()).is_empty());
        assert!(matches!(
            demuxer.seek(1.0),
            Err(DemuxError::InvalidOperation(_))
        ));
        // seek 失败不得动 eof
        assert!(!demuxer.eof());
    }

    #[test]
    fn unload_is_idempotent() {
        let demuxer = Demuxer::new();
        demuxer.abort(true);
        demuxer.unload();
        demuxer.unload();
        assert!(!demuxer.eof());
        assert!(demuxer.video_streams().is_empty());
        // unload 同时复位 abort
        assert!(!demuxer.abort_requested.load(Ordering::SeqCst));
    }

    #[test]
    fn selection_guard_rejects_invalid_targets() {
        let types = vec![
            Some(MediaType::Video),
            Some(MediaType::Audio),
            None,
            Some(MediaType::Subtitle),
        ];
        // 类型不符
        assert!(!selection_allowed(&types, None, 1, MediaType::Video));
        assert!(!selection_allowed(&types, None, 3, MediaType::Video));
        // 无描述符（解码器未打开的流）
        assert!(!selection_allowed(&types, None, 2, MediaType::Video));
        // 越界
        assert!(!selection_allowed(&types, None, 9, MediaType::Video));
        // 与当前相同
        assert!(!selection_allowed(&types, Some(0), 0, MediaType::Video));
        // 合法切换
        assert!(selection_allowed(&types, None, 0, MediaType::Video));
        assert!(selection_allowed(&types, None, 1, MediaType::Audio));
    }

    #[test]
    fn set_stream_on_fresh_demuxer_is_noop() {
        let demuxer = Demuxer::new();
        let info = StreamInfo {
            index: 0,
            media_type: MediaType::Video,
            codec_name: "h264".to_string(),
            time_base: ffmpeg::Rational::new(1, 90000),
        };
        assert!(!demuxer.set_video_stream(&info));
        assert!(demuxer.video_stream().is_none());
    }

    #[test]
    fn decode_out_of_range_returns_empty_frame() {
        let demuxer = Demuxer::new();
        // 空包直接得到空帧
        assert!(demuxer.decode(&Packet::empty()).is_empty());
        // 带负载但流索引越界的包同样得到空帧，且无副作用
        let packet = Packet::with_payload(16, 42);
        assert!(!packet.is_empty());
        assert!(demuxer.decode(&packet).is_empty());
        assert!(!demuxer.eof());
    }

    #[test]
    fn interrupt_callback_reflects_abort_flag() {
        let flag = AtomicBool::new(false);
        let opaque = &flag as *const AtomicBool as *mut c_void;
        unsafe {
            assert_eq!(interrupt_cb(opaque), 0);
            flag.store(true, Ordering::SeqCst);
            assert_eq!(interrupt_cb(opaque), 1);
            assert_eq!(interrupt_cb(ptr::null_mut()), 0);
        }
    }

    #[test]
    fn frame_rate_fallback_and_inversion() {
        let demuxer = Demuxer::new();
        assert!((demuxer.video_frame_rate() - 1.0 / 24.0).abs() < f64::EPSILON);
        assert!((invert_frame_rate(24, 1) - 1.0 / 24.0).abs() < f64::EPSILON);
        assert_eq!(invert_frame_rate(0, 1), 0.0);
        assert_eq!(invert_frame_rate(30, 0), 0.0);
    }

    #[test]
    fn supported_lists_are_cached_and_nonempty() {
        let formats = Demuxer::supported_formats();
        assert!(!formats.is_empty());
        assert!(std::ptr::eq(formats, Demuxer::supported_formats()));
        assert!(!Demuxer::supported_protocols().is_empty());
    }
}
