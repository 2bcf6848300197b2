//! Per-characteristic GATT write serialization.
//!
//! Most BLE stacks allow a single outstanding write per characteristic.  Each
//! characteristic gets its own async mutex; the mutex is held until the
//! adapter reports write-complete, so different characteristics proceed in
//! parallel while writes to the same one queue up in call order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

use super::adapter::BleAdapter;
use super::error::AdapterError;

pub struct WriteQueue {
    adapter: Arc<dyn BleAdapter>,
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl WriteQueue {
    pub fn new(adapter: Arc<dyn BleAdapter>) -> Self {
        Self {
            adapter,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, uuid: Uuid) -> Arc<Mutex<()>> {
        match self.locks.lock() {
            Ok(mut locks) => Arc::clone(locks.entry(uuid).or_default()),
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(uuid).or_default()),
        }
    }

    /// Writes one value and waits for write-complete.
    pub async fn write(&self, uuid: Uuid, value: &[u8]) -> Result<(), AdapterError> {
        let lock = self.lock_for(uuid);
        let _turn = lock.lock().await;
        trace!(%uuid, len = value.len(), "gatt write");
        self.adapter.write_characteristic(uuid, value).await
    }

    /// Writes a sequence of values back to back without letting other writes
    /// to the same characteristic in between.
    ///
    /// Stops at the first failure.
    pub async fn write_all<I, V>(&self, uuid: Uuid, values: I) -> Result<(), AdapterError>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        let lock = self.lock_for(uuid);
        let _turn = lock.lock().await;
        for value in values {
            let value = value.as_ref();
            trace!(%uuid, len = value.len(), "gatt write");
            self.adapter.write_characteristic(uuid, value).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use remote_core::ble::gatt::{KEYBOARD_UUID, MOUSE_UUID};

    use super::*;
    use crate::infrastructure::ble::testing::{FakeAdapter, FakeScript};

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_writes_to_one_characteristic_never_overlap() {
        // Arrange
        let (adapter, _events) = FakeAdapter::new(FakeScript {
            write_delay: Duration::from_millis(10),
            ..Default::default()
        });
        let queue = Arc::new(WriteQueue::new(adapter.clone()));

        // Act
        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.write(MOUSE_UUID, &[i]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Assert
        assert_eq!(adapter.max_in_flight(MOUSE_UUID), 1);
        assert_eq!(adapter.writes_to(MOUSE_UUID).len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_all_keeps_sequence_contiguous() {
        // Arrange
        let (adapter, _events) = FakeAdapter::new(FakeScript {
            write_delay: Duration::from_millis(5),
            ..Default::default()
        });
        let queue = Arc::new(WriteQueue::new(adapter.clone()));
        let q2 = Arc::clone(&queue);

        // Act
        let sequence = tokio::spawn(async move {
            q2.write_all(KEYBOARD_UUID, [[1u8], [2u8], [3u8]]).await
        });
        tokio::task::yield_now().await;
        queue.write(KEYBOARD_UUID, &[9]).await.unwrap();
        sequence.await.unwrap().unwrap();

        // Assert
        assert_eq!(
            adapter.writes_to(KEYBOARD_UUID),
            vec![vec![1], vec![2], vec![3], vec![9]]
        );
    }

    #[tokio::test]
    async fn test_write_all_stops_at_first_failure() {
        // Arrange
        let (adapter, _events) = FakeAdapter::new(FakeScript {
            fail_writes_to: Some(MOUSE_UUID),
            ..Default::default()
        });
        let queue = WriteQueue::new(adapter.clone());

        // Act
        let result = queue.write_all(MOUSE_UUID, [[1u8], [2u8]]).await;

        // Assert
        assert!(matches!(result, Err(AdapterError::Gatt(_))));
        assert!(adapter.writes_to(MOUSE_UUID).is_empty());
    }
}
