//! 帧钩子
//!
//! 在 CAN 帧接收/发送时触发用户回调，用于录制、诊断等旁路处理。
//! 回调在 IO 线程上同步执行，必须非阻塞（推荐 `try_send` 转发到其他线程）。
//!
//! ```rust
//! use ranger_driver::hooks::{FrameCallback, HookManager};
//! use ranger_protocol::RangerFrame;
//! use crossbeam_channel::{Sender, bounded};
//! use std::sync::Arc;
//!
//! struct Forward(Sender<RangerFrame>);
//!
//! impl FrameCallback for Forward {
//!     fn on_frame_received(&self, frame: &RangerFrame) {
//!         let _ = self.0.try_send(*frame);
//!     }
//! }
//!
//! let (tx, rx) = bounded(16);
//! let mut hooks = HookManager::new();
//! hooks.add_callback(Arc::new(Forward(tx)));
//! hooks.trigger_all(&RangerFrame::new_standard(0x211, &[0; 8]));
//! assert!(rx.try_recv().is_ok());
//! ```

use ranger_protocol::RangerFrame;
use std::sync::Arc;

/// 帧回调
pub trait FrameCallback: Send + Sync {
    /// 收到一帧时调用（解析之前，包含无法解析的帧）
    fn on_frame_received(&self, frame: &RangerFrame);

    /// 一帧成功写到总线后调用，默认不处理
    fn on_frame_sent(&self, frame: &RangerFrame) {
        let _ = frame;
    }
}

/// 钩子管理器
///
/// 本身不做同步，由上下文以 `RwLock<HookManager>` 持有。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn FrameCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn FrameCallback>) {
        self.callbacks.push(callback);
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有接收回调（RX 路径）
    pub fn trigger_all(&self, frame: &RangerFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_received(frame);
        }
    }

    /// 触发所有发送回调（TX 路径，仅在发送成功后）
    pub fn trigger_all_sent(&self, frame: &RangerFrame) {
        for callback in self.callbacks.iter() {
            callback.on_frame_sent(frame);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
