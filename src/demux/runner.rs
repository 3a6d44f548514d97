use crate::core::{DemuxError, MediaType, Result};
use crate::demux::demuxer::Demuxer;
use crate::demux::packet::{Frame, Packet};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{error, info, warn};
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 解封装线程命令
pub enum RunnerCommand {
    Seek(f64), // 秒
    Stop,
}

/// 解封装线程管理器
/// - 生产者线程循环 read()/decode()，把解码帧送进有界通道（背压）
/// - Seek/Stop 从其他线程经命令通道下发，非阻塞处理
/// - 字幕流的包不解码，按原始包透传到独立通道
pub struct DemuxRunner {
    thread_handle: Option<JoinHandle<()>>,
    command_tx: Sender<RunnerCommand>,

    // 保留发送端的 clone，stop() 会 drop 它们以让接收端退出
    video_frame_tx: Option<Sender<Frame>>,
    audio_frame_tx: Option<Sender<Frame>>,
    subtitle_packet_tx: Option<Sender<Packet>>,

    // 外部消费端（接收端），使用 Option 以便可以取出
    pub video_frames: Option<Receiver<Frame>>,
    pub audio_frames: Option<Receiver<Frame>>,
    pub subtitle_packets: Option<Receiver<Packet>>,
}

impl DemuxRunner {
    /// 启动解封装线程
    /// 容量可调：按目标缓冲时间与典型帧率估算
    pub fn start(demuxer: Arc<Demuxer>) -> Self {
        // 命令通道（unbounded 足够）
        let (command_tx, command_rx) = unbounded::<RunnerCommand>();

        // 有界帧通道（背压）
        const VIDEO_CAPACITY: usize = 64; // ≈ 2.5秒（25fps）
        const AUDIO_CAPACITY: usize = 128;
        const SUBTITLE_CAPACITY: usize = 32;

        let (video_tx, video_rx) = bounded::<Frame>(VIDEO_CAPACITY);
        let (audio_tx, audio_rx) = bounded::<Frame>(AUDIO_CAPACITY);
        let (subtitle_tx, subtitle_rx) = bounded::<Packet>(SUBTITLE_CAPACITY);

        let video_tx_for_struct = video_tx.clone();
        let audio_tx_for_struct = audio_tx.clone();
        let subtitle_tx_for_struct = subtitle_tx.clone();

        let thread_handle = thread::spawn(move || {
            Self::demux_loop(demuxer, command_rx, video_tx, audio_tx, subtitle_tx);
        });

        Self {
            thread_handle: Some(thread_handle),
            command_tx,
            video_frame_tx: Some(video_tx_for_struct),
            audio_frame_tx: Some(audio_tx_for_struct),
            subtitle_packet_tx: Some(subtitle_tx_for_struct),
            video_frames: Some(video_rx),
            audio_frames: Some(audio_rx),
            subtitle_packets: Some(subtitle_rx),
        }
    }

    /// 解封装循环（在独立线程中运行）
    ///
    /// 关键点：
    /// - send() 在通道满时阻塞，自然形成背压
    /// - 命令用 try_recv()（非阻塞）处理，保证尽快响应 Seek/Stop
    /// - 空包不等于出错：EOF 或瞬时读失败都稍候重试，线程保持存活
    fn demux_loop(
        demuxer: Arc<Demuxer>,
        command_rx: Receiver<RunnerCommand>,
        video_tx: Sender<Frame>,
        audio_tx: Sender<Frame>,
        subtitle_tx: Sender<Packet>,
    ) {
        info!("{} 🎬 解封装线程启动", log_ctx());

        let mut running = true;
        let mut packet_count: usize = 0;
        let mut frame_count: usize = 0;

        while running {
            // 优先处理所有命令（非阻塞）
            loop {
                match command_rx.try_recv() {
                    Ok(RunnerCommand::Seek(seconds)) => {
                        info!("{} ⏩ 收到 Seek 命令: {:.3}s", log_ctx(), seconds);
                        if let Err(e) = demuxer.seek(seconds) {
                            error!("{} ❌ Seek 失败: {}", log_ctx(), e);
                        }
                    }
                    Ok(RunnerCommand::Stop) => {
                        info!("{} ⏹ 收到停止命令", log_ctx());
                        running = false;
                        break;
                    }
                    Err(_) => break,
                }
            }
            if !running {
                break;
            }

            let packet = demuxer.read();
            if packet.is_empty() {
                // EOF：保持线程存活等待 Seek/Stop；瞬时读失败同样稍候重试
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            packet_count += 1;

            match demuxer.media_type_of(packet.stream_index()) {
                // 字幕流原始透传
                Some(MediaType::Subtitle) => {
                    if subtitle_tx.send(packet).is_err() {
                        error!("{} ❌ 发送字幕包失败，接收端已关闭", log_ctx());
                        break;
                    }
                }
                Some(media_type) => {
                    let frame = demuxer.decode(&packet);
                    if frame.is_empty() {
                        // 解码器缓冲中，继续喂包
                        continue;
                    }
                    frame_count += 1;

                    let send_result = match media_type {
                        MediaType::Video => video_tx.send(frame),
                        MediaType::Audio => audio_tx.send(frame),
                        MediaType::Subtitle => unreachable!(),
                    };
                    if send_result.is_err() {
                        error!("{} ❌ 发送解码帧失败，接收端已关闭", log_ctx());
                        break;
                    }
                }
                // 未选中/无解码器的流（数据流等），丢弃
                None => {}
            }
        }

        info!(
            "{} 🛑 解封装线程退出（共读取 {} 个包，产出 {} 帧）",
            log_ctx(),
            packet_count,
            frame_count
        );
        // 线程退出时发送端被 drop，接收端 recv() 返回 Err，消费线程随之退出
    }

    /// 发送 Seek 命令
    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.command_tx
            .send(RunnerCommand::Seek(seconds))
            .map_err(|e| DemuxError::Other(format!("发送 Seek 命令失败: {}", e)))
    }

    /// 停止线程：发送 Stop、drop 发送端、join
    pub fn stop(&mut self) {
        info!("{} 🛑 DemuxRunner::stop() called", log_ctx());
        let _ = self.command_tx.send(RunnerCommand::Stop);

        self.video_frame_tx.take();
        self.audio_frame_tx.take();
        self.subtitle_packet_tx.take();

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// 取出接收端（移交给消费线程）
    /// 调用后 DemuxRunner 不再持有 Receiver
    pub fn take_receivers(&mut self) -> (Receiver<Frame>, Receiver<Frame>, Receiver<Packet>) {
        (
            self.video_frames.take().expect("video_frames already taken"),
            self.audio_frames.take().expect("audio_frames already taken"),
            self.subtitle_packets
                .take()
                .expect("subtitle_packets already taken"),
        )
    }
}

impl Drop for DemuxRunner {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ DemuxRunner 被 drop 但未调用 stop()，正在尝试优雅停止", log_ctx());
            let _ = self.command_tx.send(RunnerCommand::Stop);

            self.video_frame_tx.take();
            self.audio_frame_tx.take();
            self.subtitle_packet_tx.take();

            if let Some(handle) = self.thread_handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_stops_promptly_on_command() {
        let demuxer = Arc::new(Demuxer::new());
        let mut runner = DemuxRunner::start(demuxer);
        // 未加载时 read() 立即返回空包，线程在空转等待中响应 Stop
        runner.stop();
        assert!(runner.thread_handle.is_none());
    }

    #[test]
    fn receivers_disconnect_after_stop() {
        let demuxer = Arc::new(Demuxer::new());
        let mut runner = DemuxRunner::start(demuxer);
        let (video_rx, audio_rx, subtitle_rx) = runner.take_receivers();
        runner.stop();
        assert!(video_rx.recv().is_err());
        assert!(audio_rx.recv().is_err());
        assert!(subtitle_rx.recv().is_err());
    }
}
