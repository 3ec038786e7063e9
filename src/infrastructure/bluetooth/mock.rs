//! In-memory transport for session tests

use crate::infrastructure::bluetooth::transport::{
    BleCentral, BleLink, NotificationCallback, TransportError,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Discover(Uuid),
    Connect(&'static str),
    Subscribe(Uuid),
    Write(Uuid, Vec<u8>),
    Disconnect,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    device: Option<&'static str>,
    scan_forever: bool,
    connect_delay: Option<Duration>,
    fail_connect: bool,
    fail_subscribe: bool,
    failing_writes: usize,
    callback: Option<NotificationCallback>,
}

/// Scripted BLE stack. Clones share state, so tests keep one to inspect calls.
#[derive(Clone, Default)]
pub struct MockBle {
    state: Arc<Mutex<MockState>>,
}

impl MockBle {
    pub fn with_device(name: &'static str) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().device = Some(name);
        mock
    }

    pub fn without_device() -> Self {
        Self::default()
    }

    pub fn scanning_forever() -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().scan_forever = true;
        mock
    }

    pub fn slow_connect(self, delay: Duration) -> Self {
        self.state.lock().unwrap().connect_delay = Some(delay);
        self
    }

    pub fn fail_connect(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    pub fn fail_subscribe(self) -> Self {
        self.state.lock().unwrap().fail_subscribe = true;
        self
    }

    /// Make the next `count` writes fail
    pub fn fail_writes(self, count: usize) -> Self {
        self.state.lock().unwrap().failing_writes = count;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(_, data) => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Deliver a notification through the subscribed callback
    pub fn notify(&self, payload: &[u8]) {
        let state = self.state.lock().unwrap();
        let callback = state.callback.as_ref().expect("not subscribed");
        callback(payload);
    }

    pub async fn wait_for_writes(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.writes().len() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {} writes",
                count
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl BleCentral for MockBle {
    type Device = &'static str;
    type Link = MockBle;

    async fn discover(
        &mut self,
        service: Uuid,
        _timeout: Option<Duration>,
    ) -> Result<Option<&'static str>, TransportError> {
        self.record(Call::Discover(service));
        let (device, forever) = {
            let state = self.state.lock().unwrap();
            (state.device, state.scan_forever)
        };
        if forever {
            futures::future::pending::<()>().await;
        }
        Ok(device)
    }

    async fn connect(
        &mut self,
        device: &'static str,
        _service: Uuid,
    ) -> Result<MockBle, TransportError> {
        self.record(Call::Connect(device));
        let delay = self.state.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.lock().unwrap().fail_connect {
            return Err(TransportError::Gatt("connect refused".to_string()));
        }
        Ok(self.clone())
    }
}

#[async_trait]
impl BleLink for MockBle {
    async fn subscribe(
        &mut self,
        characteristic: Uuid,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        self.record(Call::Subscribe(characteristic));
        let mut state = self.state.lock().unwrap();
        if state.fail_subscribe {
            return Err(TransportError::Gatt("subscribe refused".to_string()));
        }
        state.callback = Some(callback);
        Ok(())
    }

    async fn write_without_response(
        &mut self,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(TransportError::Gatt("write failed".to_string()));
        }
        state.calls.push(Call::Write(characteristic, data.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        self.state.lock().unwrap().callback = None;
        Ok(())
    }
}
