// 解封装引擎核心模块

pub mod codec;
pub mod demuxer;
pub mod hw_device;
pub mod io_device;
pub mod packet;
pub mod runner;
pub mod stream;

pub use demuxer::Demuxer;
pub use io_device::IoDevice;
pub use packet::{Frame, FrameData, Packet};
pub use runner::{DemuxRunner, RunnerCommand};
pub use stream::StreamInfo;
