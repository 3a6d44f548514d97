//! 媒体探测工具：加载一个源，打印流信息与元数据，
//! 并试读若干包验证解码链路

use anyhow::Result;
use log::info;
use myy_demux::{Demuxer, FrameData};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
struct StreamEntry {
    index: usize,
    codec: String,
}

#[derive(Serialize)]
struct ProbeReport {
    url: String,
    duration: f64,
    frame_interval: f64,
    seekable: bool,
    video_streams: Vec<StreamEntry>,
    audio_streams: Vec<StreamEntry>,
    subtitle_streams: Vec<StreamEntry>,
    metadata: HashMap<String, String>,
}

fn entries(streams: &[myy_demux::StreamInfo]) -> Vec<StreamEntry> {
    streams
        .iter()
        .map(|s| StreamEntry {
            index: s.index,
            codec: s.codec_name.clone(),
        })
        .collect()
}

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let url = match args.next() {
        Some(url) => url,
        None => {
            eprintln!("用法: probe <url> [--json]");
            std::process::exit(2);
        }
    };
    let as_json = args.any(|a| a == "--json");

    let demuxer = Demuxer::new();
    demuxer.load(&url)?;

    let report = ProbeReport {
        url: url.clone(),
        duration: demuxer.duration(),
        frame_interval: demuxer.video_frame_rate(),
        seekable: demuxer.seekable(),
        video_streams: entries(&demuxer.video_streams()),
        audio_streams: entries(&demuxer.audio_streams()),
        subtitle_streams: entries(&demuxer.subtitle_streams()),
        metadata: demuxer.metadata(),
    };

    // 试读若干包，验证解码链路
    let mut packets = 0usize;
    let mut video_frames = 0usize;
    let mut audio_frames = 0usize;
    while packets < 256 && !demuxer.eof() {
        let packet = demuxer.read();
        if packet.is_empty() {
            break;
        }
        packets += 1;
        match demuxer.decode(&packet).into_data() {
            Some(FrameData::Video(_)) => video_frames += 1,
            Some(FrameData::Audio(_)) => audio_frames += 1,
            None => {}
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("📄 源: {}", report.url);
        info!("   时长: {:.3}s, 单帧: {:.5}s, seekable: {}", report.duration, report.frame_interval, report.seekable);
        info!(
            "   流: video={} audio={} subtitle={}",
            report.video_streams.len(),
            report.audio_streams.len(),
            report.subtitle_streams.len()
        );
        for (key, value) in &report.metadata {
            info!("   元数据 {} = {}", key, value);
        }
    }
    info!(
        "✅ 试读 {} 包 → {} 视频帧 / {} 音频帧",
        packets, video_frames, audio_frames
    );

    demuxer.unload();
    Ok(())
}
