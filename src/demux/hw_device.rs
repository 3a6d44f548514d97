//! 硬件加速设备选择
//!
//! 按平台条件组装候选表，逐个匹配当前显示后端；命中后为解码器
//! 挂接硬件设备上下文。任何一步失败都静默回退软件解码 —
//! 硬件加速是尽力而为的优化，从不是硬依赖。

use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, ffi};
use log::{debug, info, warn};
use std::ffi::CStr;
use std::os::raw::c_int;

/// 设置该环境变量可彻底禁用硬件加速（无视平台）
const NO_HWDEVICE_ENV: &str = "MYY_DEMUX_NO_HWDEVICE";

/// 一个平台候选：显示后端谓词 + FFmpeg 硬件设备类型
pub(crate) struct HwCandidate {
    pub name: &'static str,
    pub device_type: ffi::AVHWDeviceType,
    pub pixel_format: ffi::AVPixelFormat,
    /// 显示后端是否匹配（按优先级顺序逐个求值）
    pub matches: fn(&str) -> bool,
}

/// 当前平台可用的候选，按优先级排序
pub(crate) fn candidates() -> Vec<HwCandidate> {
    #[allow(unused_mut)]
    let mut list: Vec<HwCandidate> = Vec::new();

    #[cfg(target_os = "windows")]
    list.push(HwCandidate {
        name: "D3D11VA",
        device_type: ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
        pixel_format: ffi::AVPixelFormat::AV_PIX_FMT_D3D11,
        matches: |backend| backend == "windows",
    });

    #[cfg(target_os = "linux")]
    list.push(HwCandidate {
        name: "VAAPI",
        device_type: ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
        pixel_format: ffi::AVPixelFormat::AV_PIX_FMT_VAAPI,
        matches: |backend| backend == "x11" || backend == "wayland",
    });

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    list.push(HwCandidate {
        name: "VideoToolbox",
        device_type: ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
        pixel_format: ffi::AVPixelFormat::AV_PIX_FMT_VIDEOTOOLBOX,
        matches: |backend| backend == "cocoa" || backend == "ios",
    });

    // 跨平台候选（需显式启用 feature）
    #[cfg(feature = "hwaccel-cuda")]
    list.push(HwCandidate {
        name: "CUDA",
        device_type: ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
        pixel_format: ffi::AVPixelFormat::AV_PIX_FMT_CUDA,
        matches: |_| true,
    });

    #[cfg(feature = "hwaccel-qsv")]
    list.push(HwCandidate {
        name: "QSV",
        device_type: ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
        pixel_format: ffi::AVPixelFormat::AV_PIX_FMT_QSV,
        matches: |_| true,
    });

    list
}

/// 探测当前显示后端标识
pub(crate) fn detect_backend() -> String {
    #[cfg(target_os = "linux")]
    {
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            "wayland".to_string()
        } else if std::env::var_os("DISPLAY").is_some() {
            "x11".to_string()
        } else {
            "headless".to_string()
        }
    }
    #[cfg(target_os = "windows")]
    {
        "windows".to_string()
    }
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        "cocoa".to_string()
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "windows",
        target_os = "macos",
        target_os = "ios"
    )))]
    {
        "unknown".to_string()
    }
}

fn hw_disabled() -> bool {
    std::env::var_os(NO_HWDEVICE_ENV).is_some()
}

/// 为已打开的视频解码器挂接硬件设备上下文
///
/// 返回挂接成功的候选名；所有失败路径都回退软解并返回 None
pub(crate) fn setup(decoder: &mut codec::decoder::Video) -> Option<&'static str> {
    if hw_disabled() {
        debug!("{} 已设置，跳过硬件加速", NO_HWDEVICE_ENV);
        return None;
    }

    let backend = detect_backend();
    let candidate = candidates()
        .into_iter()
        .find(|c| (c.matches)(&backend))?;

    unsafe {
        let avctx = decoder.as_mut_ptr();

        // 枚举该解码器支持的硬件设备上下文
        let mut supported = Vec::new();
        let mut i: c_int = 0;
        loop {
            let config = ffi::avcodec_get_hw_config((*avctx).codec, i);
            if config.is_null() {
                break;
            }
            if (*config).methods as u32 & ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as u32 != 0 {
                supported.push((*config).device_type);
            }
            i += 1;
        }

        if supported.is_empty() {
            warn!("该解码器不支持任何硬件设备上下文，使用软件解码");
            return None;
        }
        for t in &supported {
            let name = ffi::av_hwdevice_get_type_name(*t);
            if !name.is_null() {
                debug!("  支持的硬件设备: {}", CStr::from_ptr(name).to_string_lossy());
            }
        }

        if !supported.contains(&candidate.device_type) {
            debug!("{} 不在解码器支持列表中，使用软件解码", candidate.name);
            return None;
        }

        let mut hw_device_ctx: *mut ffi::AVBufferRef = std::ptr::null_mut();
        let ret = ffi::av_hwdevice_ctx_create(
            &mut hw_device_ctx,
            candidate.device_type,
            std::ptr::null(),
            std::ptr::null_mut(),
            0,
        );
        if ret < 0 {
            debug!(
                "创建 {} 设备上下文失败: {}，回退软件解码",
                candidate.name,
                ffmpeg::Error::from(ret)
            );
            return None;
        }

        (*avctx).hw_device_ctx = hw_device_ctx;
        (*avctx).pix_fmt = candidate.pixel_format;
    }

    info!("✓ 硬件加速已挂接: {}", candidate.name);
    Some(candidate.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_predicates_follow_backend() {
        for c in candidates() {
            match c.name {
                "VAAPI" => {
                    assert!((c.matches)("x11"));
                    assert!((c.matches)("wayland"));
                    assert!(!(c.matches)("headless"));
                }
                "D3D11VA" => assert!((c.matches)("windows")),
                "VideoToolbox" => assert!((c.matches)("cocoa")),
                // CUDA/QSV 不挑后端
                _ => assert!((c.matches)("anything")),
            }
        }
    }

    #[test]
    fn backend_detection_returns_identifier() {
        assert!(!detect_backend().is_empty());
    }
}
