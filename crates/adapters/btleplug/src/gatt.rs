//! GATT connection to one downstream peripheral.

use btleplug::api::{Characteristic, Peripheral as _, Service, WriteType};
use btleplug::platform::Peripheral;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use bentech_app::ports::{GattConnection, Notifications};
use bentech_domain::error::LinkError;

use crate::error::BleError;

/// Find a characteristic by UUID in a discovered service.
fn find_characteristic(service: &Service, uuid: Uuid) -> Option<Characteristic> {
    service
        .characteristics
        .iter()
        .find(|c| c.uuid == uuid)
        .cloned()
}

/// An established connection whose services have been discovered.
#[derive(Debug, Clone)]
pub struct BtleplugConnection {
    peripheral: Peripheral,
}

impl BtleplugConnection {
    pub(crate) fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    async fn ensure_connected(&self) -> Result<(), LinkError> {
        let connected = self.peripheral.is_connected().await;
        if connected.map_err(BleError::from)? {
            Ok(())
        } else {
            Err(LinkError::NotConnected)
        }
    }
}

impl GattConnection for BtleplugConnection {
    type Service = Service;
    type Attribute = Characteristic;

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn service(&self, id: Uuid) -> Result<Option<Service>, LinkError> {
        self.ensure_connected().await?;
        let services = self.peripheral.services();
        Ok(services.into_iter().find(|s| s.uuid == id))
    }

    async fn attribute(
        &self,
        service: &Service,
        id: Uuid,
    ) -> Result<Option<Characteristic>, LinkError> {
        Ok(find_characteristic(service, id))
    }

    async fn write(&self, attribute: &Characteristic, value: &[u8]) -> Result<(), LinkError> {
        self.peripheral
            .write(attribute, value, WriteType::WithResponse)
            .await
            .map_err(BleError::from)?;
        Ok(())
    }

    async fn subscribe(&self, attribute: &Characteristic) -> Result<Notifications, LinkError> {
        // Take the stream before subscribing so nothing notified in between is lost.
        let stream = self
            .peripheral
            .notifications()
            .await
            .map_err(BleError::from)?;
        self.peripheral
            .subscribe(attribute)
            .await
            .map_err(BleError::from)?;

        let uuid = attribute.uuid;
        Ok(Notifications::new(stream.filter_map(move |notification| {
            (notification.uuid == uuid).then_some(notification.value)
        })))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(BleError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use btleplug::api::CharPropFlags;

    use super::*;
    use bentech_domain::profile::LID_CONTROLLER;

    fn characteristic(uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid: LID_CONTROLLER.service,
            properties: CharPropFlags::WRITE | CharPropFlags::NOTIFY,
            descriptors: BTreeSet::new(),
        }
    }

    #[test]
    fn should_find_characteristic_in_service() {
        let service = Service {
            uuid: LID_CONTROLLER.service,
            primary: true,
            characteristics: [LID_CONTROLLER.control]
                .into_iter()
                .map(characteristic)
                .collect(),
        };

        let found = find_characteristic(&service, LID_CONTROLLER.control).unwrap();
        assert_eq!(found.uuid, LID_CONTROLLER.control);
        let response = LID_CONTROLLER.response.unwrap();
        assert!(find_characteristic(&service, response).is_none());
    }
}
