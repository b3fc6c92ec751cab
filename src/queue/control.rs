// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::watch;

/// 运行级取消信号
///
/// 调度器停止接收新域名；进行中的域名在阶段之间检查该信号，
/// 完成当前阶段后以 ERROR 结束。
#[derive(Clone, Debug)]
pub struct RunControl {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Sender lives as long as any clone of self, so an error here cannot occur while awaited.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
