//! 媒体解封装与解码调度引擎
//!
//! 打开容器（文件/网络流/自定义 IO）、发现基本流、按媒体类型选流，
//! 把压缩包流解码为帧序列。渲染、音频输出与播放状态机在本 crate
//! 之外实现。

pub mod core;
pub mod demux;

pub use crate::core::{DemuxError, MediaSource, MediaType, Result, StreamProtocol};
pub use crate::demux::{Demuxer, DemuxRunner, Frame, FrameData, IoDevice, Packet, StreamInfo};
